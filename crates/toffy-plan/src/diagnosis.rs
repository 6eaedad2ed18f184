//! The diagnosis screen: score cards, narrative and the extra framing text.

use serde::Serialize;
use serde_json::Value;

use toffy_flow::scoring::{Category, ESSENTIALS_STEP, GOAL_STEP, REACTIVITY_STEP, trigger_label};
use toffy_flow::{Band, CategoryScores, Narrative, ResponseMap, Subject, compute_scores, narrative};

pub const SEVERITY_STEP: &str = "severity";
pub const LIVING_STEP: &str = "living";

/// Severity assumed when the slider was never answered.
pub const DEFAULT_SEVERITY: f64 = 50.0;

const SEVERE_ABOVE: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub week: u8,
    pub title: &'static str,
    pub description: &'static str,
}

pub const MILESTONE_ROADMAP: [Milestone; 4] = [
    Milestone {
        week: 1,
        title: "Foundation",
        description: "Build the core habits and communication patterns",
    },
    Milestone {
        week: 2,
        title: "Reinforcement",
        description: "Strengthen consistency and address setbacks",
    },
    Milestone {
        week: 3,
        title: "Real-World",
        description: "Apply training in distracting environments",
    },
    Milestone {
        week: 4,
        title: "Independence",
        description: "Reliable behavior without constant guidance",
    },
];

fn issue_label(goal: Option<&str>) -> &'static str {
    match goal {
        Some("potty") => "house training issues",
        Some("leash") => "leash reactivity",
        Some("obedience") => "obedience gaps",
        Some("behavior") => "behavioral patterns",
        _ => "these behaviors",
    }
}

/// Why acting now matters, picked from the dog's age and the reported severity.
pub fn escalation_warning(name: &str, age: &str, severity: Option<f64>, goal: Option<&str>) -> String {
    let young = matches!(age, "puppy" | "young");
    let severe = severity.unwrap_or(DEFAULT_SEVERITY) > SEVERE_ABOVE;
    let issue = issue_label(goal);

    match (young, severe) {
        (true, true) => format!(
            "At {name}'s age, {issue} can become permanent habits within weeks if not addressed. The window for easiest correction is right now."
        ),
        (true, false) => format!(
            "Young dogs like {name} are in their prime learning window. Addressing {issue} now prevents them from becoming ingrained adult behaviors."
        ),
        (false, true) => format!(
            "With a severity level this high, {issue} typically escalate over time without structured intervention. Each week of delay makes correction harder."
        ),
        (false, false) => format!(
            "Left unaddressed, {issue} tend to gradually worsen. Starting now means faster results and less frustration for both you and {name}."
        ),
    }
}

const ESSENTIAL_GAPS: [(&str, &str); 5] = [
    ("sensory", "sensory stimulation"),
    ("walks", "regular walks"),
    ("training", "daily training"),
    ("diet", "diet review"),
    ("bonding", "bonding time"),
];

/// "Here's what you told us" bullets, in the order the topics were asked.
pub fn mirror_summary(responses: &ResponseMap) -> Vec<String> {
    let mut bullets = Vec::new();

    if let Some(living) = responses.text(LIVING_STEP) {
        bullets.push(
            match living {
                "house_yard" => "Lives in a house with a yard",
                "apt_balcony" => "Lives in an apartment with a balcony",
                "apt_no_outdoor" => "Lives in an apartment without outdoor space",
                _ => "Living situation noted",
            }
            .to_string(),
        );
    }

    if let Some(goal) = responses.text(GOAL_STEP) {
        bullets.push(
            match goal {
                "potty" => "Main goal: potty training",
                "leash" => "Main goal: leash manners",
                "obedience" => "Main goal: basic obedience",
                "behavior" => "Main goal: behavior issues",
                _ => "Training goal set",
            }
            .to_string(),
        );
    }

    let essentials = responses.mapping(ESSENTIALS_STEP);
    let covered = |key: &str| {
        essentials
            .and_then(|answers| answers.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let missing: Vec<&str> = ESSENTIAL_GAPS
        .iter()
        .filter(|(key, _)| !covered(key))
        .map(|(_, label)| *label)
        .collect();
    if missing.is_empty() {
        bullets.push("All 5 daily essentials covered".to_string());
    } else {
        let shown: Vec<&str> = missing.into_iter().take(3).collect();
        bullets.push(format!("Missing essentials: {}", shown.join(", ")));
    }

    if let Some(ratings) = responses
        .mapping(REACTIVITY_STEP)
        .filter(|ratings| !ratings.is_empty())
    {
        let reactive: Vec<&str> = ratings
            .iter()
            .filter(|(_, rating)| rating.as_f64().is_some_and(|reading| reading > 50.0))
            .map(|(id, _)| trigger_label(id))
            .collect();
        if reactive.is_empty() {
            bullets.push("Low reactivity across all areas".to_string());
        } else {
            bullets.push(format!("Sensitivities: {}", reactive.join(", ")));
        }
    }

    if let Some(severity) = responses.number(SEVERITY_STEP) {
        let level = if severity <= 30.0 {
            "mild"
        } else if severity <= 60.0 {
            "moderate"
        } else {
            "high"
        };
        bullets.push(format!("Issue severity: {level}"));
    }

    bullets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreCard {
    pub category: Category,
    pub label: &'static str,
    pub icon: &'static str,
    pub score: u8,
    pub band: Band,
    pub inverted: bool,
}

impl ScoreCard {
    fn new(category: Category, scores: &CategoryScores) -> Self {
        let icon = match category {
            Category::Leadership => "👑",
            Category::Boundaries => "🚧",
            Category::Essentials => "🎯",
            Category::Reactivity => "⚡",
        };
        Self {
            category,
            label: category.label(),
            icon,
            score: scores.score(category),
            band: scores.band(category),
            inverted: category.is_inverted(),
        }
    }
}

/// Everything the diagnosis screen shows, derived from the final responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisReport {
    pub name: String,
    pub scores: CategoryScores,
    pub cards: Vec<ScoreCard>,
    pub narrative: Narrative,
    pub escalation: String,
    pub mirror: Vec<String>,
    pub roadmap: Vec<Milestone>,
    pub has_sensitivity_data: bool,
}

impl DiagnosisReport {
    pub fn build(subject: &Subject, responses: &ResponseMap) -> Self {
        let name = subject.heading_name();
        let scores = compute_scores(responses);
        let goal = responses.text(GOAL_STEP);
        let story = narrative(&name, &scores, goal, responses);
        let escalation = escalation_warning(
            subject.display_name(),
            &subject.age,
            responses.number(SEVERITY_STEP),
            goal,
        );

        Self {
            cards: Category::ALL
                .iter()
                .map(|category| ScoreCard::new(*category, &scores))
                .collect(),
            narrative: story,
            escalation,
            mirror: mirror_summary(responses),
            roadmap: MILESTONE_ROADMAP.to_vec(),
            has_sensitivity_data: responses
                .mapping(REACTIVITY_STEP)
                .is_some_and(|ratings| !ratings.is_empty()),
            scores,
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escalation_covers_age_and_severity_matrix() {
        let young_severe = escalation_warning("Buddy", "puppy", Some(80.0), Some("potty"));
        assert!(young_severe.starts_with("At Buddy's age, house training issues"));

        let young_mild = escalation_warning("Buddy", "young", Some(60.0), None);
        assert!(young_mild.starts_with("Young dogs like Buddy"));
        assert!(young_mild.contains("these behaviors"));

        let adult_severe = escalation_warning("Buddy", "adult", Some(61.0), Some("leash"));
        assert!(adult_severe.starts_with("With a severity level this high, leash reactivity"));

        let adult_default = escalation_warning("Buddy", "senior", None, Some("behavior"));
        assert!(adult_default.starts_with("Left unaddressed, behavioral patterns"));
        assert!(adult_default.ends_with("you and Buddy."));
    }

    #[test]
    fn mirror_summary_lists_what_was_told() {
        let responses = ResponseMap::from_value(&json!({
            "living": "apt_balcony",
            "goal": "leash",
            "five_things": { "sensory": true, "walks": false, "training": true, "diet": false, "bonding": false },
            "sensitivities": { "resource_guarding": 80, "sound": 20, "food": 55 },
            "severity": 45
        }));
        assert_eq!(
            mirror_summary(&responses),
            vec![
                "Lives in an apartment with a balcony",
                "Main goal: leash manners",
                "Missing essentials: regular walks, diet review, bonding time",
                "Sensitivities: resource guarding, food guarding",
                "Issue severity: moderate",
            ]
        );
    }

    #[test]
    fn mirror_summary_for_a_calm_covered_dog() {
        let responses = ResponseMap::from_value(&json!({
            "five_things": { "sensory": true, "walks": true, "training": true, "diet": true, "bonding": true },
            "sensitivities": { "sound": 10 },
            "severity": 90
        }));
        assert_eq!(
            mirror_summary(&responses),
            vec![
                "All 5 daily essentials covered",
                "Low reactivity across all areas",
                "Issue severity: high",
            ]
        );
    }

    #[test]
    fn report_uses_heading_name_and_flags_sensitivity_data() {
        let report = DiagnosisReport::build(&Subject::default(), &ResponseMap::new());
        assert_eq!(report.name, "Your dog");
        assert!(!report.has_sensitivity_data);
        assert_eq!(report.cards.len(), 4);
        assert_eq!(report.cards[3].score, 20);
        assert_eq!(report.cards[3].band, Band::Low);
        assert!(report.cards[3].inverted);
        assert!(report.escalation.contains("your dog"));
        assert_eq!(report.roadmap.len(), 4);
    }
}
