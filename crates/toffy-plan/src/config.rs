//! Runtime configuration shared by the CLI and the JSON responders.
//!
//! Every field has a default, so an empty document (or no file at all) is a
//! valid configuration. `TOFFY_FLOW` and `TOFFY_INSTANT` override the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use toffy_flow::{FlowError, OnboardingFlow, Pacing};

use crate::plan::DEFAULT_TRIAL_DAYS;

pub const FLOW_ENV: &str = "TOFFY_FLOW";
pub const INSTANT_ENV: &str = "TOFFY_INSTANT";
/// Largest accepted `pacing_scale`; beyond this the chat is unusable anyway.
pub const MAX_PACING_SCALE: f64 = 100.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToffyConfig {
    /// Flow definition to load instead of the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_path: Option<PathBuf>,
    #[serde(default = "default_pacing_scale")]
    pub pacing_scale: f64,
    /// Skip every delay.
    #[serde(default)]
    pub instant: bool,
    #[serde(default = "default_trial_days")]
    pub trial_days: u8,
}

fn default_pacing_scale() -> f64 {
    1.0
}

fn default_trial_days() -> u8 {
    DEFAULT_TRIAL_DAYS
}

impl Default for ToffyConfig {
    fn default() -> Self {
        Self {
            flow_path: None,
            pacing_scale: default_pacing_scale(),
            instant: false,
            trial_days: default_trial_days(),
        }
    }
}

impl ToffyConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_PACING_SCALE).contains(&self.pacing_scale) {
            return Err(ConfigError::Invalid(format!(
                "pacing_scale must be between 0 and {MAX_PACING_SCALE}, got {}",
                self.pacing_scale
            )));
        }
        Ok(())
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Reads the optional file, then applies the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Applies overrides from `lookup`, which stands in for the environment.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(FLOW_ENV).filter(|value| !value.trim().is_empty()) {
            self.flow_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = lookup(INSTANT_ENV) {
            self.instant = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        self
    }

    pub fn pacing(&self) -> Pacing {
        if self.instant {
            Pacing::instant()
        } else {
            Pacing::scaled(self.pacing_scale)
        }
    }

    pub fn load_flow(&self) -> Result<OnboardingFlow, FlowError> {
        match &self.flow_path {
            Some(path) => OnboardingFlow::from_path(path),
            None => OnboardingFlow::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ToffyConfig::from_json_str("  ").unwrap();
        assert_eq!(config, ToffyConfig::default());
        assert_eq!(config.trial_days, 3);
        assert_eq!(config.pacing().typing, Duration::from_millis(800));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = ToffyConfig::from_json_str(r#"{ "pacing_scale": 0.25 }"#).unwrap();
        assert_eq!(config.pacing().typing, Duration::from_millis(200));
        assert!(!config.instant);
        assert!(config.load_flow().is_ok());
    }

    #[test]
    fn environment_overrides_file() {
        let config = ToffyConfig::default().with_env(|key| match key {
            FLOW_ENV => Some("/tmp/flow.json".to_string()),
            INSTANT_ENV => Some("TRUE".to_string()),
            _ => None,
        });
        assert_eq!(config.flow_path, Some(PathBuf::from("/tmp/flow.json")));
        assert!(config.instant);
        assert_eq!(config.pacing(), Pacing::instant());
    }

    #[test]
    fn bad_config_is_a_parse_error() {
        assert!(matches!(
            ToffyConfig::from_json_str("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn oversized_pacing_scale_is_rejected() {
        let err = ToffyConfig::from_json_str(r#"{ "pacing_scale": 1e20 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("pacing_scale"));
        assert!(matches!(
            ToffyConfig::from_json_str(r#"{ "pacing_scale": -1 }"#),
            Err(ConfigError::Invalid(_))
        ));
        let slowest = ToffyConfig::from_json_str(r#"{ "pacing_scale": 100 }"#).unwrap();
        assert_eq!(slowest.pacing().typing, Duration::from_secs(80));
    }
}
