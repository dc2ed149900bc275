use thiserror::Error;

use crate::model::module::DEFAULT_MASTERY_THRESHOLD;

pub const THRESHOLD_ENV: &str = "MASTERY_DEFAULT_THRESHOLD";
pub const LEARNER_ENV: &str = "MASTERY_LEARNER";

/// Engine-wide knobs that are not part of any lesson catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    default_mastery_threshold: f64,
    learner: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct EngineSettingsDraft {
    pub default_mastery_threshold: Option<f64>,
    pub learner: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("mastery threshold must be within (0, 1], got {0}")]
    InvalidThreshold(f64),
    #[error("could not parse {var}: {raw:?}")]
    InvalidEnv { var: &'static str, raw: String },
}

impl EngineSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `MASTERY_DEFAULT_THRESHOLD` and `MASTERY_LEARNER`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidEnv` if the threshold is not a number.
    pub fn from_env() -> Result<Self, SettingsError> {
        let default_mastery_threshold = match std::env::var(THRESHOLD_ENV) {
            Ok(raw) => Some(raw.trim().parse::<f64>().map_err(|_| SettingsError::InvalidEnv {
                var: THRESHOLD_ENV,
                raw: raw.clone(),
            })?),
            Err(_) => None,
        };
        Ok(Self {
            default_mastery_threshold,
            learner: std::env::var(LEARNER_ENV).ok(),
        })
    }

    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidThreshold` for thresholds outside (0, 1].
    pub fn validate(self) -> Result<EngineSettings, SettingsError> {
        let threshold = self
            .default_mastery_threshold
            .unwrap_or(DEFAULT_MASTERY_THRESHOLD);
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(SettingsError::InvalidThreshold(threshold));
        }

        let learner = self
            .learner
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty());

        Ok(EngineSettings {
            default_mastery_threshold: threshold,
            learner,
        })
    }
}

impl EngineSettings {
    #[must_use]
    pub fn default_mastery_threshold(&self) -> f64 {
        self.default_mastery_threshold
    }

    /// Namespace for this learner's storage keys, if any.
    #[must_use]
    pub fn learner(&self) -> Option<&str> {
        self.learner.as_deref()
    }

    #[must_use]
    pub fn with_learner(mut self, learner: impl Into<String>) -> Self {
        self.learner = Some(learner.into());
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_mastery_threshold: DEFAULT_MASTERY_THRESHOLD,
            learner: None,
        }
    }
}
