use serde::{Deserialize, Serialize};

const FALLBACK_NAME: &str = "your dog";

/// The dog being onboarded, collected before the chat starts.
///
/// Passed explicitly to the engine and to downstream screens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub breed: String,
    /// Age bucket: `puppy`, `young`, `adolescent`, `adult` or `senior`.
    #[serde(default)]
    pub age: String,
}

impl Subject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Name used inside sentences; "your dog" when unset.
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            FALLBACK_NAME
        } else {
            trimmed
        }
    }

    /// Name used at the start of a sentence; "Your dog" when unset.
    pub fn heading_name(&self) -> String {
        if self.name.trim().is_empty() {
            "Your dog".to_string()
        } else {
            self.display_name().to_string()
        }
    }

    pub fn is_young(&self) -> bool {
        matches!(self.age.as_str(), "puppy" | "young")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_when_name_missing() {
        let subject = Subject::default();
        assert_eq!(subject.display_name(), "your dog");
        assert_eq!(subject.heading_name(), "Your dog");
        assert_eq!(Subject::named("  Buddy ").display_name(), "Buddy");
    }
}
