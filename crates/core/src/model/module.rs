use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::ModuleId;

/// Threshold applied to quiz-typed modules whose descriptor carries none.
pub const DEFAULT_MASTERY_THRESHOLD: f64 = 0.8;

//
// ─── CATALOG DESCRIPTORS ───────────────────────────────────────────────────────
//

/// Interaction family of a module, as supplied by the lesson catalog.
///
/// Quiz and assessment modules are both scored and gated on mastery; reading
/// modules only need to be visited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleKind {
    Reading,
    Quiz {
        #[serde(default, rename = "masteryThreshold", skip_serializing_if = "Option::is_none")]
        mastery_threshold: Option<f64>,
    },
    Assessment {
        #[serde(default, rename = "masteryThreshold", skip_serializing_if = "Option::is_none")]
        mastery_threshold: Option<f64>,
    },
}

impl ModuleKind {
    /// True for quiz and assessment modules.
    #[must_use]
    pub fn is_quiz_typed(&self) -> bool {
        matches!(self, Self::Quiz { .. } | Self::Assessment { .. })
    }

    /// Threshold declared by the catalog, if any. Reading modules have none.
    #[must_use]
    pub fn mastery_threshold(&self) -> Option<f64> {
        match self {
            Self::Reading => None,
            Self::Quiz { mastery_threshold } | Self::Assessment { mastery_threshold } => {
                *mastery_threshold
            }
        }
    }
}

/// One entry of a lesson's ordered module list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    #[serde(flatten)]
    pub kind: ModuleKind,
}

impl ModuleDescriptor {
    #[must_use]
    pub fn reading(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            kind: ModuleKind::Reading,
        }
    }

    #[must_use]
    pub fn quiz(id: impl Into<ModuleId>, mastery_threshold: Option<f64>) -> Self {
        Self {
            id: id.into(),
            kind: ModuleKind::Quiz { mastery_threshold },
        }
    }

    #[must_use]
    pub fn assessment(id: impl Into<ModuleId>, mastery_threshold: Option<f64>) -> Self {
        Self {
            id: id.into(),
            kind: ModuleKind::Assessment { mastery_threshold },
        }
    }

    #[must_use]
    pub fn is_quiz_typed(&self) -> bool {
        self.kind.is_quiz_typed()
    }

    /// The catalog threshold, or `default` when the descriptor leaves it out.
    #[must_use]
    pub fn threshold_or(&self, default: f64) -> f64 {
        self.kind.mastery_threshold().unwrap_or(default)
    }
}

//
// ─── PROGRESS RECORDS ──────────────────────────────────────────────────────────
//

/// Completion state shared by module records and lesson views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// What the most recent attempt on a module produced.
///
/// Only scored attempts carry a score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleOutcome {
    Reading,
    Scored { score: f64 },
}

/// Per-module progress for one learner.
///
/// Records are only built through [`ModuleRecord::after_reading`] and
/// [`ModuleRecord::after_quiz`], which keep `mastery_achieved` false unless the
/// status is completed and never decrease `attempts`. Decoded records are
/// repaired to the same rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredModuleRecord")]
pub struct ModuleRecord {
    module_id: ModuleId,
    status: ProgressStatus,
    #[serde(flatten)]
    outcome: ModuleOutcome,
    attempts: u32,
    last_attempt_date: DateTime<Utc>,
    mastery_achieved: bool,
}

impl ModuleRecord {
    /// Next state after the learner finishes a reading module.
    ///
    /// Always completed and mastered; each call counts as another visit.
    #[must_use]
    pub fn after_reading(
        previous: Option<&ModuleRecord>,
        module_id: &ModuleId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            module_id: module_id.clone(),
            status: ProgressStatus::Completed,
            outcome: ModuleOutcome::Reading,
            attempts: next_attempt(previous),
            last_attempt_date: now,
            mastery_achieved: true,
        }
    }

    /// Next state after a scored quiz submission.
    ///
    /// `score` is a percentage (0-100) and `mastery_threshold` a fraction (0-1).
    /// A non-finite score has no JSON form and is recorded as 0.
    #[must_use]
    pub fn after_quiz(
        previous: Option<&ModuleRecord>,
        module_id: &ModuleId,
        score: f64,
        mastery_threshold: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let score = if score.is_finite() { score } else { 0.0 };
        let achieved = meets_threshold(score, mastery_threshold);
        Self {
            module_id: module_id.clone(),
            status: if achieved {
                ProgressStatus::Completed
            } else {
                ProgressStatus::InProgress
            },
            outcome: ModuleOutcome::Scored { score },
            attempts: next_attempt(previous),
            last_attempt_date: now,
            mastery_achieved: achieved,
        }
    }

    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn outcome(&self) -> ModuleOutcome {
        self.outcome
    }

    /// Score of the last scored attempt; `None` for reading modules.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match self.outcome {
            ModuleOutcome::Scored { score } => Some(score),
            ModuleOutcome::Reading => None,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn last_attempt_date(&self) -> DateTime<Utc> {
        self.last_attempt_date
    }

    #[must_use]
    pub fn mastery_achieved(&self) -> bool {
        self.mastery_achieved
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

/// Wire shape of [`ModuleRecord`], before the mastery rule is re-applied.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredModuleRecord {
    module_id: ModuleId,
    status: ProgressStatus,
    #[serde(flatten)]
    outcome: ModuleOutcome,
    attempts: u32,
    last_attempt_date: DateTime<Utc>,
    mastery_achieved: bool,
}

impl From<StoredModuleRecord> for ModuleRecord {
    fn from(stored: StoredModuleRecord) -> Self {
        Self {
            mastery_achieved: stored.mastery_achieved && stored.status.is_completed(),
            module_id: stored.module_id,
            status: stored.status,
            outcome: stored.outcome,
            attempts: stored.attempts,
            last_attempt_date: stored.last_attempt_date,
        }
    }
}

/// `score >= mastery_threshold * 100`, with no clamping of either side.
#[must_use]
pub fn meets_threshold(score: f64, mastery_threshold: f64) -> bool {
    score >= mastery_threshold * 100.0
}

fn next_attempt(previous: Option<&ModuleRecord>) -> u32 {
    previous.map_or(0, ModuleRecord::attempts).saturating_add(1)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
