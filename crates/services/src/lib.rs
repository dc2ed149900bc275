#![forbid(unsafe_code)]

pub mod error;
pub mod persist;
pub mod progress_tracker;
pub mod progression;
pub mod remediation_registry;

pub use mastery_core::Clock;

pub use error::{EngineError, PersistError};
pub use progress_tracker::ModuleProgressTracker;
pub use progression::{AnswerEvent, AnswerOutcome, ProgressionEngine};
pub use remediation_registry::RemediationRegistry;
