use serde::Serialize;

use crate::model::ids::{LessonId, ModuleId};
use crate::model::module::{ModuleDescriptor, ModuleRecord, ProgressStatus};

/// Whether `module` no longer blocks the modules that follow it.
///
/// Every predecessor must be completed; quiz-typed predecessors must also be
/// mastered.
#[must_use]
pub fn clears_gate(module: &ModuleDescriptor, record: Option<&ModuleRecord>) -> bool {
    match record {
        Some(record) if record.is_completed() => {
            !module.is_quiz_typed() || record.mastery_achieved()
        }
        _ => false,
    }
}

/// Derived, non-persisted summary of a lesson for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressView {
    pub lesson_id: LessonId,
    pub overall_status: ProgressStatus,
    pub completed_modules: usize,
    pub total_modules: usize,
    pub mastered_quizzes: usize,
    pub total_quizzes: usize,
    /// Completed, and every quiz-typed module mastered.
    pub can_proceed: bool,
}

impl LessonProgressView {
    /// Compose per-module records against the lesson's ordered module list.
    ///
    /// An empty lesson counts as not started and never allows proceeding.
    pub fn derive<'a, F>(lesson_id: LessonId, modules: &[ModuleDescriptor], lookup: F) -> Self
    where
        F: Fn(&ModuleId) -> Option<&'a ModuleRecord>,
    {
        let mut completed_modules = 0;
        let mut mastered_quizzes = 0;
        let mut total_quizzes = 0;

        for module in modules {
            let record = lookup(&module.id);
            let completed = record.is_some_and(ModuleRecord::is_completed);
            if completed {
                completed_modules += 1;
            }
            if module.is_quiz_typed() {
                total_quizzes += 1;
                if record.is_some_and(ModuleRecord::mastery_achieved) {
                    mastered_quizzes += 1;
                }
            }
        }

        let total_modules = modules.len();
        let overall_status = if completed_modules == 0 {
            ProgressStatus::NotStarted
        } else if completed_modules < total_modules {
            ProgressStatus::InProgress
        } else {
            ProgressStatus::Completed
        };
        let can_proceed = overall_status.is_completed() && mastered_quizzes == total_quizzes;

        Self {
            lesson_id,
            overall_status,
            completed_modules,
            total_modules,
            mastered_quizzes,
            total_quizzes,
            can_proceed,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.overall_status.is_completed()
    }
}
