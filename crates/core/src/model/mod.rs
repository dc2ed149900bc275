mod ids;
mod lesson;
mod module;
mod remediation;
mod settings;

pub use ids::{ConceptId, LessonId, ModuleId, QuestionId};
pub use lesson::{LessonProgressView, clears_gate};
pub use module::{
    DEFAULT_MASTERY_THRESHOLD, ModuleDescriptor, ModuleKind, ModuleOutcome, ModuleRecord,
    ProgressStatus, meets_threshold,
};
pub use remediation::{ConceptFailure, QuestionType, RemediationEntry};
pub use settings::{EngineSettings, EngineSettingsDraft, SettingsError};
