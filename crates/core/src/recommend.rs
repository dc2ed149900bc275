//! Seam for the lesson recommender.
//!
//! The progression engine asks a [`NextModulePolicy`] which module to show next
//! but does not own any recommendation model. Policies see a read-only snapshot
//! of the lesson and the learner's state.

use crate::model::{ConceptId, LessonId, ModuleDescriptor, ModuleId, ModuleRecord, clears_gate};

/// Read-only view handed to a recommendation policy.
#[derive(Debug, Clone)]
pub struct RecommendationContext<'a> {
    pub lesson_id: &'a LessonId,
    pub modules: &'a [ModuleDescriptor],
    /// Learner records aligned index-for-index with `modules`.
    pub records: Vec<Option<&'a ModuleRecord>>,
    /// Concepts the learner still owes a remediation answer on.
    pub pending_concepts: Vec<&'a ConceptId>,
}

impl RecommendationContext<'_> {
    /// Index of the first module that still blocks its successors.
    #[must_use]
    pub fn frontier(&self) -> Option<usize> {
        self.modules
            .iter()
            .zip(&self.records)
            .position(|(module, record)| !clears_gate(module, *record))
    }
}

pub trait NextModulePolicy {
    /// Pick the module to present next, or `None` to defer to the caller.
    fn next_module(&self, context: &RecommendationContext<'_>) -> Option<ModuleId>;
}

impl<F> NextModulePolicy for F
where
    F: Fn(&RecommendationContext<'_>) -> Option<ModuleId>,
{
    fn next_module(&self, context: &RecommendationContext<'_>) -> Option<ModuleId> {
        self(context)
    }
}

/// Walks the lesson in catalog order and returns the first module not yet cleared.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialPolicy;

impl NextModulePolicy for SequentialPolicy {
    fn next_module(&self, context: &RecommendationContext<'_>) -> Option<ModuleId> {
        context
            .frontier()
            .map(|index| context.modules[index].id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn sequential_policy_returns_first_uncleared_module() {
        let lesson = LessonId::new("lesson-1");
        let modules = vec![
            ModuleDescriptor::reading("reading-1"),
            ModuleDescriptor::quiz("quiz-1", None),
            ModuleDescriptor::reading("reading-2"),
        ];
        let read = ModuleRecord::after_reading(None, &ModuleId::new("reading-1"), fixed_now());
        let failed =
            ModuleRecord::after_quiz(None, &ModuleId::new("quiz-1"), 50.0, 0.8, fixed_now());
        let context = RecommendationContext {
            lesson_id: &lesson,
            modules: &modules,
            records: vec![Some(&read), Some(&failed), None],
            pending_concepts: Vec::new(),
        };

        assert_eq!(context.frontier(), Some(1));
        assert_eq!(
            SequentialPolicy.next_module(&context),
            Some(ModuleId::new("quiz-1"))
        );
    }

    fn always_only(_: &RecommendationContext<'_>) -> Option<ModuleId> {
        Some(ModuleId::new("only"))
    }

    #[test]
    fn functions_act_as_policies() {
        let lesson = LessonId::new("lesson-1");
        let modules = vec![ModuleDescriptor::reading("only")];
        let context = RecommendationContext {
            lesson_id: &lesson,
            modules: &modules,
            records: vec![None],
            pending_concepts: Vec::new(),
        };
        assert_eq!(always_only.next_module(&context), Some(ModuleId::new("only")));
    }
}
