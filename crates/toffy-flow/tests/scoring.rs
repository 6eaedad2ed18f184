use serde_json::json;

use toffy_flow::scoring::{Category, WeakArea};
use toffy_flow::{Band, NarrativeKind, ResponseMap, compute_scores, narrative};

fn fixture(name: &str) -> ResponseMap {
    let raw = match name {
        "full_marks" => include_str!("../tests/fixtures/full_marks.json"),
        "two_essentials" => include_str!("../tests/fixtures/two_essentials.json"),
        _ => panic!("unknown fixture {}", name),
    };
    serde_json::from_str(raw).expect("deserialize responses")
}

#[test]
fn full_marks_scores_and_strong_foundation() {
    let responses = fixture("full_marks");
    let scores = compute_scores(&responses);
    assert_eq!(
        (
            scores.leadership,
            scores.boundaries,
            scores.essentials,
            scores.reactivity
        ),
        (100, 100, 100, 10)
    );
    for category in Category::ALL {
        assert!(scores.band(category).is_favourable(), "{category:?}");
    }

    let story = narrative("Buddy", &scores, responses.text("goal"), &responses);
    assert_eq!(story.kind, NarrativeKind::StrongFoundation);
    assert!(story.weak_areas.is_empty());
    assert!(story.headline.starts_with("Buddy has a solid foundation"));
    assert!(story.body.contains("potty training"));
}

#[test]
fn two_essentials_names_essentials_among_first_weak_areas() {
    let responses = fixture("two_essentials");
    let scores = compute_scores(&responses);
    assert_eq!(
        (
            scores.leadership,
            scores.boundaries,
            scores.essentials,
            scores.reactivity
        ),
        (100, 100, 40, 10)
    );
    assert_eq!(scores.band(Category::Essentials), Band::NeedsWork);
    assert_eq!(scores.weak_areas(), vec![WeakArea::Essentials]);

    let story = narrative("Buddy", &scores, responses.text("goal"), &responses);
    assert_eq!(story.kind, NarrativeKind::WeakAreas);
    assert_eq!(story.named_areas, vec![WeakArea::Essentials]);
    assert!(story.headline.contains("daily essentials"));
    assert!(story.body.contains("potty training"));
    assert_eq!(
        story.evidence[0].details,
        vec!["sensory stimulation", "daily training", "bonding time"]
    );
}

#[test]
fn moderate_reactivity_stays_out_of_weak_areas() {
    let mut responses = fixture("two_essentials");
    responses.record(
        "sensitivities",
        json!({ "resource_guarding": 70, "sound": 80, "movement": 20, "touch": 10, "food": 5 }),
    );
    let scores = compute_scores(&responses);
    assert_eq!(scores.reactivity, 37);
    assert_eq!(scores.band(Category::Reactivity), Band::Moderate);

    let story = narrative("Buddy", &scores, responses.text("goal"), &responses);
    assert_eq!(story.named_areas, vec![WeakArea::Essentials]);
}

#[test]
fn scoring_never_fails_on_odd_shapes() {
    let responses = ResponseMap::from_value(&json!({
        "leadership_1": "yes",
        "leadership_2": [true, true],
        "five_things": { "walks": "true", "diet": 1 },
        "sensitivities": { "sound": "loud", "touch": 40 }
    }));
    let scores = compute_scores(&responses);
    assert_eq!(scores.leadership, 0);
    assert_eq!(scores.boundaries, 0);
    assert_eq!(scores.essentials, 0);
    assert_eq!(scores.reactivity, 40);
}
