//! Category scores and the diagnosis narrative.
//!
//! Every function here is pure and tolerates missing data: absent boolean
//! sub-answers never count as a positive signal, and absent numeric ratings
//! are left out of the reactivity average.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::derive::js_round;
use crate::responses::ResponseMap;

pub const LEADERSHIP_STEP: &str = "leadership_1";
pub const BOUNDARIES_STEP: &str = "leadership_2";
pub const ESSENTIALS_STEP: &str = "five_things";
pub const REACTIVITY_STEP: &str = "sensitivities";
pub const GOAL_STEP: &str = "goal";

/// Reactivity reported when no ratings were collected.
pub const REACTIVITY_BASELINE: u8 = 20;

/// Sub-answer id and the answer that counts as a positive signal.
type Condition = (&'static str, bool);

const LEADERSHIP_CONDITIONS: [Condition; 6] = [
    ("table_scraps", false),
    ("door_wait", true),
    ("raise_voice", false),
    ("leash_pull", false),
    ("approach_signal", true),
    ("playtime_signal", true),
];

const BOUNDARY_CONDITIONS: [Condition; 5] = [
    ("earn_treats", true),
    ("recall_repeat", false),
    ("furniture_invite", false),
    ("move_around", false),
    ("designated_spot", true),
];

const ESSENTIAL_ITEMS: usize = 5;

const LEADERSHIP_EVIDENCE: [(&str, bool, &str); 6] = [
    ("table_scraps", true, "fed scraps from the table"),
    ("door_wait", false, "rushes through doors first"),
    ("raise_voice", true, "raised-voice corrections"),
    ("leash_pull", true, "pulls on the leash"),
    ("approach_signal", false, "approaches without your signal"),
    ("playtime_signal", false, "no clear play cues"),
];

const BOUNDARY_EVIDENCE: [(&str, bool, &str); 5] = [
    ("recall_repeat", true, "needs repeated recalls"),
    ("earn_treats", false, "gets treats for free"),
    ("furniture_invite", true, "jumps on furniture uninvited"),
    ("move_around", true, "you step around them"),
    ("designated_spot", false, "no designated resting spot"),
];

const ESSENTIAL_EVIDENCE: [(&str, bool, &str); 5] = [
    ("sensory", false, "sensory stimulation"),
    ("walks", false, "regular walks"),
    ("training", false, "daily training"),
    ("diet", false, "diet review"),
    ("bonding", false, "bonding time"),
];

/// Human label of a sensitivity rating.
pub fn trigger_label(item_id: &str) -> &str {
    match item_id {
        "resource_guarding" => "resource guarding",
        "sound" => "sound sensitivity",
        "movement" => "movement reactivity",
        "touch" => "touch sensitivity",
        "food" => "food guarding",
        other => other,
    }
}

fn answered(answers: Option<&Map<String, Value>>, key: &str) -> Option<bool> {
    answers.and_then(|answers| answers.get(key)).and_then(Value::as_bool)
}

fn count_conditions(answers: Option<&Map<String, Value>>, conditions: &[Condition]) -> usize {
    conditions
        .iter()
        .filter(|(key, positive)| answered(answers, key) == Some(*positive))
        .count()
}

fn percentage(count: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    js_round(count as f64 / total as f64 * 100.0).clamp(0, 100) as u8
}

pub fn leadership_score(responses: &ResponseMap) -> u8 {
    let answers = responses.mapping(LEADERSHIP_STEP);
    percentage(
        count_conditions(answers, &LEADERSHIP_CONDITIONS),
        LEADERSHIP_CONDITIONS.len(),
    )
}

pub fn boundaries_score(responses: &ResponseMap) -> u8 {
    let answers = responses.mapping(BOUNDARIES_STEP);
    percentage(
        count_conditions(answers, &BOUNDARY_CONDITIONS),
        BOUNDARY_CONDITIONS.len(),
    )
}

pub fn essentials_score(responses: &ResponseMap) -> u8 {
    let covered = responses
        .mapping(ESSENTIALS_STEP)
        .map(|answers| {
            answers
                .values()
                .filter(|answer| answer.as_bool() == Some(true))
                .count()
        })
        .unwrap_or(0);
    percentage(covered.min(ESSENTIAL_ITEMS), ESSENTIAL_ITEMS)
}

/// Mean of the sensitivity ratings. Higher means more reactive.
pub fn reactivity_score(responses: &ResponseMap) -> u8 {
    let readings: Vec<f64> = responses
        .mapping(REACTIVITY_STEP)
        .map(|ratings| ratings.values().filter_map(Value::as_f64).collect())
        .unwrap_or_default();
    if readings.is_empty() {
        return REACTIVITY_BASELINE;
    }
    let mean = readings.iter().sum::<f64>() / readings.len() as f64;
    js_round(mean).clamp(0, 100) as u8
}

/// The four derived percentages. Recomputed from responses, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub leadership: u8,
    pub boundaries: u8,
    pub essentials: u8,
    pub reactivity: u8,
}

pub fn compute_scores(responses: &ResponseMap) -> CategoryScores {
    CategoryScores {
        leadership: leadership_score(responses),
        boundaries: boundaries_score(responses),
        essentials: essentials_score(responses),
        reactivity: reactivity_score(responses),
    }
}

impl CategoryScores {
    pub fn band(&self, category: Category) -> Band {
        category.band(self.score(category))
    }

    pub fn score(&self, category: Category) -> u8 {
        match category {
            Category::Leadership => self.leadership,
            Category::Boundaries => self.boundaries,
            Category::Essentials => self.essentials,
            Category::Reactivity => self.reactivity,
        }
    }

    /// Areas below their weak threshold, in display order.
    pub fn weak_areas(&self) -> Vec<WeakArea> {
        let mut weak = Vec::new();
        if self.leadership < 50 {
            weak.push(WeakArea::Leadership);
        }
        if self.boundaries < 50 {
            weak.push(WeakArea::Boundaries);
        }
        if self.essentials < 60 {
            weak.push(WeakArea::Essentials);
        }
        if self.reactivity > 50 {
            weak.push(WeakArea::Reactivity);
        }
        weak
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Leadership,
    Boundaries,
    Essentials,
    Reactivity,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Leadership,
        Category::Boundaries,
        Category::Essentials,
        Category::Reactivity,
    ];

    /// Reactivity reads the other way round: a high score is a bad sign.
    pub fn is_inverted(&self) -> bool {
        matches!(self, Category::Reactivity)
    }

    pub fn band(&self, score: u8) -> Band {
        if self.is_inverted() {
            Band::for_reactivity(score)
        } else {
            Band::for_strength(score)
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Leadership => "Leadership",
            Category::Boundaries => "Boundaries",
            Category::Essentials => "Essentials",
            Category::Reactivity => "Reactivity",
        }
    }
}

/// Qualitative reading of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Strong,
    Developing,
    NeedsWork,
    Low,
    Moderate,
    High,
}

impl Band {
    /// Leadership, boundaries and essentials: >=71 strong, 41..=70 developing.
    pub fn for_strength(score: u8) -> Self {
        if score >= 71 {
            Band::Strong
        } else if score >= 41 {
            Band::Developing
        } else {
            Band::NeedsWork
        }
    }

    /// Reactivity: <=30 low, 31..=60 moderate, above that high.
    pub fn for_reactivity(score: u8) -> Self {
        if score <= 30 {
            Band::Low
        } else if score <= 60 {
            Band::Moderate
        } else {
            Band::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Band::Strong => "strong",
            Band::Developing => "developing",
            Band::NeedsWork => "needs work",
            Band::Low => "low",
            Band::Moderate => "moderate",
            Band::High => "high",
        }
    }

    /// Whether the band should be shown as good news.
    pub fn is_favourable(&self) -> bool {
        matches!(self, Band::Strong | Band::Low)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeakArea {
    Leadership,
    Boundaries,
    Essentials,
    Reactivity,
}

impl WeakArea {
    pub fn label(&self) -> &'static str {
        match self {
            WeakArea::Leadership => "leadership structure",
            WeakArea::Boundaries => "boundary consistency",
            WeakArea::Essentials => "daily essentials",
            WeakArea::Reactivity => "trigger reactivity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeKind {
    StrongFoundation,
    WeakAreas,
}

/// Answers backing a named weak area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub area: WeakArea,
    pub details: Vec<String>,
}

/// Diagnosis text, split into a headline and a body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub kind: NarrativeKind,
    /// Every weak area, in display order.
    pub weak_areas: Vec<WeakArea>,
    /// The (at most two) areas named in the text.
    pub named_areas: Vec<WeakArea>,
    pub headline: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
}

impl Narrative {
    pub fn text(&self) -> String {
        format!("{} {}", self.headline, self.body)
    }
}

/// Label used when tying the narrative to the training goal.
pub fn goal_label(goal: Option<&str>) -> &'static str {
    match goal {
        Some("potty") => "potty training",
        Some("leash") => "leash behavior",
        Some("obedience") => "obedience",
        Some("behavior") => "behavior issues",
        _ => "training goals",
    }
}

fn flagged(answers: Option<&Map<String, Value>>, table: &[(&str, bool, &str)]) -> Vec<String> {
    table
        .iter()
        .filter(|(key, flagged_when, _)| answered(answers, key) == Some(*flagged_when))
        .map(|(_, _, label)| label.to_string())
        .collect()
}

fn evidence_for(area: WeakArea, responses: &ResponseMap) -> Vec<String> {
    match area {
        WeakArea::Leadership => flagged(responses.mapping(LEADERSHIP_STEP), &LEADERSHIP_EVIDENCE),
        WeakArea::Boundaries => flagged(responses.mapping(BOUNDARIES_STEP), &BOUNDARY_EVIDENCE),
        WeakArea::Essentials => flagged(responses.mapping(ESSENTIALS_STEP), &ESSENTIAL_EVIDENCE),
        WeakArea::Reactivity => responses
            .mapping(REACTIVITY_STEP)
            .map(|ratings| {
                ratings
                    .iter()
                    .filter(|(_, rating)| rating.as_f64().is_some_and(|reading| reading > 50.0))
                    .map(|(id, _)| trigger_label(id).to_string())
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Picks the narrative template from the weak areas and ties it to the goal.
pub fn narrative(
    name: &str,
    scores: &CategoryScores,
    goal: Option<&str>,
    responses: &ResponseMap,
) -> Narrative {
    let weak_areas = scores.weak_areas();
    let goal = goal_label(goal);

    if weak_areas.is_empty() {
        return Narrative {
            kind: NarrativeKind::StrongFoundation,
            weak_areas,
            named_areas: Vec::new(),
            headline: format!(
                "{name} has a solid foundation across leadership, boundaries, and daily care."
            ),
            body: format!(
                "Your {goal} goal is very achievable — we just need to channel this foundation into targeted exercises."
            ),
            evidence: Vec::new(),
        };
    }

    let named_areas: Vec<WeakArea> = weak_areas.iter().take(2).copied().collect();
    let labels: Vec<&str> = named_areas.iter().map(WeakArea::label).collect();
    let verb = if named_areas.len() == 1 { "needs" } else { "need" };
    let evidence = named_areas
        .iter()
        .map(|area| Evidence {
            area: *area,
            details: evidence_for(*area, responses),
        })
        .filter(|evidence| !evidence.details.is_empty())
        .collect();

    Narrative {
        kind: NarrativeKind::WeakAreas,
        weak_areas,
        headline: format!(
            "{name}'s assessment shows that {} {verb} attention.",
            labels.join(" and ")
        ),
        body: format!(
            "This is directly connected to your {goal} challenges. The good news: these are exactly the areas your plan targets first."
        ),
        named_areas,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn responses(value: Value) -> ResponseMap {
        ResponseMap::from_value(&value)
    }

    #[test]
    fn missing_steps_score_zero_except_reactivity() {
        let empty = ResponseMap::new();
        assert_eq!(leadership_score(&empty), 0);
        assert_eq!(boundaries_score(&empty), 0);
        assert_eq!(essentials_score(&empty), 0);
        assert_eq!(reactivity_score(&empty), 20);
    }

    #[test]
    fn missing_sub_answers_never_count() {
        let partial = responses(json!({
            "leadership_1": { "door_wait": true },
            "leadership_2": {}
        }));
        assert_eq!(leadership_score(&partial), 17);
        assert_eq!(boundaries_score(&partial), 0);
    }

    #[test]
    fn reactivity_averages_present_numbers_only() {
        let ratings = responses(json!({ "sensitivities": { "a": 100, "b": 0 } }));
        assert_eq!(reactivity_score(&ratings), 50);
        let with_gap = responses(json!({ "sensitivities": { "a": 90, "b": null, "c": 30 } }));
        assert_eq!(reactivity_score(&with_gap), 60);
        let empty = responses(json!({ "sensitivities": {} }));
        assert_eq!(reactivity_score(&empty), 20);
    }

    #[test]
    fn leadership_of_fifty_is_developing() {
        let half = responses(json!({
            "leadership_1": {
                "table_scraps": false,
                "door_wait": true,
                "raise_voice": false,
                "leash_pull": true,
                "approach_signal": false,
                "playtime_signal": false
            }
        }));
        let score = leadership_score(&half);
        assert_eq!(score, 50);
        assert_eq!(Category::Leadership.band(score), Band::Developing);
    }

    #[test]
    fn band_cut_points_belong_to_lower_band() {
        assert_eq!(Band::for_strength(71), Band::Strong);
        assert_eq!(Band::for_strength(70), Band::Developing);
        assert_eq!(Band::for_strength(41), Band::Developing);
        assert_eq!(Band::for_strength(40), Band::NeedsWork);
        assert_eq!(Band::for_reactivity(30), Band::Low);
        assert_eq!(Band::for_reactivity(31), Band::Moderate);
        assert_eq!(Band::for_reactivity(60), Band::Moderate);
        assert_eq!(Band::for_reactivity(61), Band::High);
    }

    #[test]
    fn narrative_names_at_most_two_areas() {
        let scores = CategoryScores {
            leadership: 20,
            boundaries: 40,
            essentials: 40,
            reactivity: 80,
        };
        let story = narrative("Buddy", &scores, Some("leash"), &ResponseMap::new());
        assert_eq!(story.kind, NarrativeKind::WeakAreas);
        assert_eq!(story.weak_areas.len(), 4);
        assert_eq!(
            story.named_areas,
            vec![WeakArea::Leadership, WeakArea::Boundaries]
        );
        assert!(
            story
                .headline
                .contains("leadership structure and boundary consistency need attention")
        );
        assert!(story.body.contains("leash behavior"));
        assert!(story.evidence.is_empty());
    }

    #[test]
    fn narrative_single_area_uses_singular_verb_and_evidence() {
        let answers = responses(json!({
            "sensitivities": { "sound": 90, "touch": 70, "food": 10 }
        }));
        let scores = CategoryScores {
            leadership: 100,
            boundaries: 100,
            essentials: 100,
            reactivity: 57,
        };
        let story = narrative("Rex", &scores, None, &answers);
        assert!(story.headline.ends_with("trigger reactivity needs attention."));
        assert!(story.body.contains("training goals"));
        assert_eq!(
            story.evidence[0].details,
            vec!["sound sensitivity", "touch sensitivity"]
        );
    }
}
