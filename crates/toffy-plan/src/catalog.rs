use serde::{Deserialize, Serialize};
use thiserror::Error;

use toffy_flow::{Subject, substitute_name};

const BUILTIN_PROBLEMS: &str = include_str!("../data/problems.json");

/// Problem whose question set is served when the requested one is unknown.
pub const FALLBACK_PROBLEM: &str = "obedience";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse problem catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// Which aspect of the problem the answer informs, e.g. `frequency`.
    pub insight: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub emoji: String,
    pub label: String,
    pub sublabel: String,
    pub empathy: String,
    pub insight: String,
    pub questions: Vec<ProblemQuestion>,
}

impl Problem {
    pub fn insight_for(&self, subject: &Subject) -> String {
        substitute_name(&self.insight, subject)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemCatalog {
    pub problems: Vec<Problem>,
}

impl ProblemCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(BUILTIN_PROBLEMS)?)
    }

    pub fn find(&self, problem_id: &str) -> Option<&Problem> {
        self.problems.iter().find(|problem| problem.id == problem_id)
    }

    /// Follow-up questions for a problem, falling back to the obedience set.
    pub fn questions_for(&self, problem_id: &str) -> &[ProblemQuestion] {
        self.find(problem_id)
            .or_else(|| self.find(FALLBACK_PROBLEM))
            .map(|problem| problem.questions.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_six_problems_with_questions() {
        let catalog = ProblemCatalog::builtin().unwrap();
        let ids: Vec<&str> = catalog.problems.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["potty", "leash", "anxiety", "barking", "biting", "obedience"]
        );
        assert!(catalog.problems.iter().all(|p| !p.questions.is_empty()));
    }

    #[test]
    fn unknown_problem_falls_back_to_obedience() {
        let catalog = ProblemCatalog::builtin().unwrap();
        assert_eq!(
            catalog.questions_for("zoomies"),
            catalog.questions_for(FALLBACK_PROBLEM)
        );
    }

    #[test]
    fn insight_names_the_dog() {
        let catalog = ProblemCatalog::builtin().unwrap();
        let potty = catalog.find("potty").unwrap();
        assert!(potty.insight_for(&Subject::named("Buddy")).contains("Buddy's age"));
        assert!(potty.insight_for(&Subject::default()).contains("your dog's age"));
    }
}
