//! Fixed logical keys for the two progress stores.

pub const MODULE_PROGRESS_KEY: &str = "module_progress";
pub const REMEDIATION_KEY: &str = "remediation_state";

/// Storage keys for one learner.
///
/// Without a learner the bare keys are used; with one, each key gets a
/// `:<learner>` suffix so several accounts can share a substrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub module_progress: String,
    pub remediation: String,
}

impl StorageKeys {
    #[must_use]
    pub fn for_learner(learner: Option<&str>) -> Self {
        match learner {
            Some(learner) => Self {
                module_progress: format!("{MODULE_PROGRESS_KEY}:{learner}"),
                remediation: format!("{REMEDIATION_KEY}:{learner}"),
            },
            None => Self::default(),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            module_progress: MODULE_PROGRESS_KEY.to_owned(),
            remediation: REMEDIATION_KEY.to_owned(),
        }
    }
}
