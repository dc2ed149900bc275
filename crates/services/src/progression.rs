use std::sync::Arc;

use mastery_core::Clock;
use mastery_core::model::{
    ConceptFailure, ConceptId, EngineSettings, LessonId, LessonProgressView, ModuleDescriptor,
    ModuleId, QuestionId, QuestionType,
};
use mastery_core::recommend::{NextModulePolicy, RecommendationContext, SequentialPolicy};
use storage::keys::StorageKeys;
use storage::repository::Storage;

use crate::error::EngineError;
use crate::progress_tracker::ModuleProgressTracker;
use crate::remediation_registry::RemediationRegistry;

//
// ─── ANSWER EVENTS ─────────────────────────────────────────────────────────────
//

/// One answered quiz question, as delivered by the quiz pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEvent {
    pub question_id: QuestionId,
    pub concept_id: ConceptId,
    pub question_type: QuestionType,
    pub lesson_id: LessonId,
    pub is_correct: bool,
    /// Follow-up question to present if this answer opens remediation.
    pub variant_question_id: Option<QuestionId>,
}

/// What [`ProgressionEngine::record_answer`] did with an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Wrong answer; the concept is now owed.
    FailureRegistered,
    /// Correct answer in a different format settled an owed concept.
    Remediated,
    /// Correct answer, but in the same format that was failed; still owed.
    SameFormat,
    /// Correct answer on a concept that was not owed.
    NoChange,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Owns one learner's progress tracker and remediation registry and answers
/// the questions the lesson flow asks of both.
pub struct ProgressionEngine {
    settings: EngineSettings,
    tracker: ModuleProgressTracker,
    registry: RemediationRegistry,
}

impl ProgressionEngine {
    /// Engine with no durable backing.
    #[must_use]
    pub fn in_memory(settings: EngineSettings, clock: Clock) -> Self {
        Self {
            settings,
            tracker: ModuleProgressTracker::new(clock),
            registry: RemediationRegistry::new(clock),
        }
    }

    /// Load both stores from `storage` under the learner's keys.
    pub async fn load(storage: &Storage, settings: EngineSettings, clock: Clock) -> Self {
        let keys = StorageKeys::for_learner(settings.learner());
        let tracker =
            ModuleProgressTracker::load(Arc::clone(&storage.kv), &keys.module_progress, clock)
                .await;
        let registry =
            RemediationRegistry::load(Arc::clone(&storage.kv), &keys.remediation, clock).await;
        tracing::info!(
            learner = settings.learner().unwrap_or("default"),
            modules = tracker.records().count(),
            owed_concepts = registry.pending_remediation().len(),
            "progression engine ready"
        );
        Self {
            settings,
            tracker,
            registry,
        }
    }

    /// Open (and migrate) a `SQLite` database and load from it.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Sqlite` if the database cannot be opened.
    pub async fn open_sqlite(
        database_url: &str,
        settings: EngineSettings,
        clock: Clock,
    ) -> Result<Self, EngineError> {
        let storage = Storage::sqlite(database_url).await?;
        Ok(Self::load(&storage, settings, clock).await)
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn tracker(&self) -> &ModuleProgressTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ModuleProgressTracker {
        &mut self.tracker
    }

    #[must_use]
    pub fn registry(&self) -> &RemediationRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RemediationRegistry {
        &mut self.registry
    }

    pub fn complete_reading(&mut self, module_id: &ModuleId) {
        self.tracker.complete_reading(module_id);
    }

    /// Record a quiz score against the module's catalog threshold, falling
    /// back to the configured default.
    pub fn submit_quiz(&mut self, module: &ModuleDescriptor, score: f64) -> bool {
        let threshold = module.threshold_or(self.settings.default_mastery_threshold());
        self.tracker.record_quiz_attempt(&module.id, score, threshold)
    }

    /// Apply one answered question to the remediation registry.
    ///
    /// A correct answer only settles an owed concept when its format differs
    /// from the format that was failed.
    pub fn record_answer(&mut self, event: AnswerEvent) -> AnswerOutcome {
        if !event.is_correct {
            self.registry.register_failure(ConceptFailure {
                question_id: event.question_id,
                concept_id: event.concept_id,
                question_type: event.question_type,
                lesson_id: event.lesson_id,
                variant_question_id: event.variant_question_id,
            });
            return AnswerOutcome::FailureRegistered;
        }

        let Some(entry) = self.registry.entry(&event.concept_id) else {
            return AnswerOutcome::NoChange;
        };
        if !entry.is_pending() {
            return AnswerOutcome::NoChange;
        }
        if entry.question_type() == &event.question_type {
            tracing::debug!(
                concept = %event.concept_id,
                question_type = %event.question_type,
                "correct answer in the failed format does not settle remediation"
            );
            return AnswerOutcome::SameFormat;
        }

        self.registry.mark_remediated(&event.concept_id);
        AnswerOutcome::Remediated
    }

    #[must_use]
    pub fn can_access_module(
        &self,
        module_id: &ModuleId,
        index: usize,
        modules: &[ModuleDescriptor],
    ) -> bool {
        self.tracker.can_access_module(module_id, index, modules)
    }

    #[must_use]
    pub fn first_blocking_module<'m>(
        &self,
        index: usize,
        modules: &'m [ModuleDescriptor],
    ) -> Option<&'m ModuleDescriptor> {
        self.tracker.first_blocking_module(index, modules)
    }

    #[must_use]
    pub fn lesson_progress(
        &self,
        lesson_id: &LessonId,
        modules: &[ModuleDescriptor],
    ) -> LessonProgressView {
        self.tracker.lesson_progress(lesson_id, modules)
    }

    /// Both gates at once: the lesson is mastered and no concept is owed.
    #[must_use]
    pub fn can_advance_lesson(&self, lesson_id: &LessonId, modules: &[ModuleDescriptor]) -> bool {
        self.lesson_progress(lesson_id, modules).can_proceed && self.registry.can_proceed()
    }

    /// Ask `policy` for the next module, keeping only accessible answers.
    ///
    /// Falls back to [`SequentialPolicy`] when the policy defers, names a
    /// module outside the lesson, or names one that is still gated.
    #[must_use]
    pub fn recommend_next(
        &self,
        policy: &dyn NextModulePolicy,
        lesson_id: &LessonId,
        modules: &[ModuleDescriptor],
    ) -> Option<ModuleId> {
        let context = RecommendationContext {
            lesson_id,
            modules,
            records: modules
                .iter()
                .map(|module| self.tracker.module_progress(&module.id))
                .collect(),
            pending_concepts: self
                .registry
                .pending_remediation()
                .into_iter()
                .map(|entry| entry.concept_id())
                .collect(),
        };

        if let Some(choice) = policy.next_module(&context) {
            match modules.iter().position(|module| module.id == choice) {
                Some(index) if self.can_access_module(&choice, index, modules) => {
                    return Some(choice);
                }
                Some(_) => {
                    tracing::debug!(module = %choice, "recommended module is gated; falling back");
                }
                None => {
                    tracing::warn!(module = %choice, lesson = %lesson_id, "recommended module is not in lesson");
                }
            }
        }
        SequentialPolicy.next_module(&context)
    }

    /// Erase both stores.
    pub fn clear_all(&mut self) {
        self.tracker.clear_all();
        self.registry.clear();
    }

    /// Wait for both stores' queued writes to be attempted.
    pub async fn flush(&self) {
        self.tracker.flush().await;
        self.registry.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastery_core::time::fixed_now;

    fn engine() -> ProgressionEngine {
        ProgressionEngine::in_memory(EngineSettings::default(), Clock::fixed(fixed_now()))
    }

    fn answer(question: &str, question_type: &str, is_correct: bool) -> AnswerEvent {
        AnswerEvent {
            question_id: QuestionId::new(question),
            concept_id: ConceptId::new("concept-budget"),
            question_type: QuestionType::from(question_type),
            lesson_id: LessonId::new("lesson-1"),
            is_correct,
            variant_question_id: None,
        }
    }

    fn lesson() -> Vec<ModuleDescriptor> {
        vec![
            ModuleDescriptor::reading("reading-1"),
            ModuleDescriptor::quiz("quiz-1", None),
        ]
    }

    #[test]
    fn submit_quiz_uses_default_threshold() {
        let mut engine = engine();
        let quiz = ModuleDescriptor::quiz("quiz-1", None);
        assert!(!engine.submit_quiz(&quiz, 79.0));
        assert!(engine.submit_quiz(&quiz, 80.0));

        let strict = ModuleDescriptor::assessment("final", Some(0.95));
        assert!(!engine.submit_quiz(&strict, 90.0));
    }

    #[test]
    fn same_format_answer_does_not_settle() {
        let mut engine = engine();
        assert_eq!(
            engine.record_answer(answer("q1", "mcq", false)),
            AnswerOutcome::FailureRegistered
        );
        assert_eq!(
            engine.record_answer(answer("q1", "mcq", true)),
            AnswerOutcome::SameFormat
        );
        assert!(!engine.registry().can_proceed());

        assert_eq!(
            engine.record_answer(answer("q7", "true_false", true)),
            AnswerOutcome::Remediated
        );
        assert!(engine.registry().can_proceed());
        assert_eq!(
            engine.record_answer(answer("q8", "slider", true)),
            AnswerOutcome::NoChange
        );
    }

    #[test]
    fn lesson_advance_needs_both_gates() {
        let mut engine = engine();
        let modules = lesson();
        let lesson_id = LessonId::new("lesson-1");

        engine.complete_reading(&ModuleId::new("reading-1"));
        engine.record_answer(answer("q1", "mcq", false));
        engine.submit_quiz(&modules[1], 90.0);

        assert!(engine.lesson_progress(&lesson_id, &modules).can_proceed);
        assert!(!engine.can_advance_lesson(&lesson_id, &modules));

        engine.record_answer(answer("q2", "fill_blank", true));
        assert!(engine.can_advance_lesson(&lesson_id, &modules));
    }

    fn jump_to_quiz(_: &RecommendationContext<'_>) -> Option<ModuleId> {
        Some(ModuleId::new("quiz-1"))
    }

    fn revisit_reading(_: &RecommendationContext<'_>) -> Option<ModuleId> {
        Some(ModuleId::new("reading-1"))
    }

    #[test]
    fn gated_recommendation_falls_back_to_sequence() {
        let engine = engine();
        let modules = lesson();
        let lesson_id = LessonId::new("lesson-1");
        let next = engine.recommend_next(&jump_to_quiz, &lesson_id, &modules);
        assert_eq!(next, Some(ModuleId::new("reading-1")));
    }

    #[test]
    fn accessible_recommendation_is_kept() {
        let mut engine = engine();
        let modules = lesson();
        let lesson_id = LessonId::new("lesson-1");
        engine.complete_reading(&ModuleId::new("reading-1"));

        assert_eq!(
            engine.recommend_next(&revisit_reading, &lesson_id, &modules),
            Some(ModuleId::new("reading-1"))
        );
        assert_eq!(
            engine.recommend_next(&SequentialPolicy, &lesson_id, &modules),
            Some(ModuleId::new("quiz-1"))
        );
    }

    #[test]
    fn clear_all_resets_both_stores() {
        let mut engine = engine();
        engine.complete_reading(&ModuleId::new("reading-1"));
        engine.record_answer(answer("q1", "mcq", false));
        engine.clear_all();

        assert_eq!(engine.tracker().records().count(), 0);
        assert!(engine.registry().can_proceed());
    }
}
