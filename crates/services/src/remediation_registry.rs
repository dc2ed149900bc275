use std::sync::Arc;

use mastery_core::Clock;
use mastery_core::model::{ConceptFailure, ConceptId, LessonId, RemediationEntry};
use storage::keys::REMEDIATION_KEY;
use storage::repository::KvStore;

use crate::persist::{Persister, load_snapshot};

/// Audit target for failure and remediation events.
pub const AUDIT_TARGET: &str = "remediation_audit";

/// Concepts a learner currently owes a format-varied correct answer on.
///
/// Holds at most one entry per concept. A repeated failure overwrites the
/// existing entry; no failure history is kept here (see [`AUDIT_TARGET`]).
pub struct RemediationRegistry {
    clock: Clock,
    entries: Vec<RemediationEntry>,
    can_proceed: bool,
    persister: Persister,
}

impl RemediationRegistry {
    /// An empty registry that keeps state in memory only.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            entries: Vec::new(),
            can_proceed: true,
            persister: Persister::detached(REMEDIATION_KEY),
        }
    }

    /// Load the registry stored under `key`, then write behind to the same key.
    ///
    /// A missing, unreadable or corrupt value yields an empty registry.
    pub async fn load(kv: Arc<dyn KvStore>, key: &str, clock: Clock) -> Self {
        let stored: Vec<RemediationEntry> = load_snapshot(kv.as_ref(), key).await;
        let entries = dedupe_by_concept(stored);
        tracing::debug!(key, entries = entries.len(), "remediation registry loaded");
        let can_proceed = global_gate(&entries);
        Self {
            clock,
            entries,
            can_proceed,
            persister: Persister::spawn(kv, key),
        }
    }

    /// Open or renew the remediation obligation for the failed concept.
    pub fn register_failure(&mut self, failure: ConceptFailure) {
        let now = self.clock.now();
        tracing::info!(
            target: AUDIT_TARGET,
            concept = %failure.concept_id,
            question = %failure.question_id,
            question_type = %failure.question_type,
            lesson = %failure.lesson_id,
            "concept failure registered"
        );

        match self
            .entries
            .iter_mut()
            .find(|entry| entry.concept_id() == &failure.concept_id)
        {
            Some(entry) => entry.refresh(failure, now),
            None => self.entries.push(RemediationEntry::open(failure, now)),
        }
        self.commit();
    }

    /// Settle the obligation for `concept_id`.
    ///
    /// Unknown concepts are ignored; returns whether an entry was found.
    pub fn mark_remediated(&mut self, concept_id: &ConceptId) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.concept_id() == concept_id)
        else {
            return false;
        };
        entry.settle();
        tracing::info!(target: AUDIT_TARGET, concept = %concept_id, "concept remediated");
        self.commit();
        true
    }

    #[must_use]
    pub fn needs_remediation(&self, concept_id: &ConceptId) -> bool {
        self.entry(concept_id).is_some_and(RemediationEntry::is_pending)
    }

    #[must_use]
    pub fn entry(&self, concept_id: &ConceptId) -> Option<&RemediationEntry> {
        self.entries
            .iter()
            .find(|entry| entry.concept_id() == concept_id)
    }

    #[must_use]
    pub fn entries(&self) -> &[RemediationEntry] {
        &self.entries
    }

    /// Outstanding obligations raised in `lesson_id`.
    #[must_use]
    pub fn remediation_for_lesson(&self, lesson_id: &LessonId) -> Vec<&RemediationEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.is_pending() && entry.lesson_id() == lesson_id)
            .collect()
    }

    /// Every outstanding obligation, in first-failure order.
    #[must_use]
    pub fn pending_remediation(&self) -> Vec<&RemediationEntry> {
        self.entries.iter().filter(|entry| entry.is_pending()).collect()
    }

    /// Engine-wide gate: no concept is still owed.
    #[must_use]
    pub fn can_proceed(&self) -> bool {
        self.can_proceed
    }

    /// Drop every entry and erase the durable copy.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.can_proceed = true;
        self.persister.erase();
        tracing::debug!(key = self.persister.key(), "remediation registry cleared");
    }

    /// Replace local state with a snapshot from elsewhere (e.g. remote sync).
    ///
    /// Later entries win if the snapshot repeats a concept.
    pub fn replace_snapshot(&mut self, entries: impl IntoIterator<Item = RemediationEntry>) {
        self.entries = dedupe_by_concept(entries);
        self.commit();
    }

    /// Wait for every write queued so far to be attempted.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    /// Count of durable writes that failed and were dropped.
    #[must_use]
    pub fn failed_writes(&self) -> u64 {
        self.persister.failed_writes()
    }

    fn commit(&mut self) {
        self.can_proceed = global_gate(&self.entries);
        self.persister.save(&self.entries);
    }
}

fn global_gate(entries: &[RemediationEntry]) -> bool {
    entries.iter().all(|entry| !entry.is_pending())
}

fn dedupe_by_concept(entries: impl IntoIterator<Item = RemediationEntry>) -> Vec<RemediationEntry> {
    let mut unique: Vec<RemediationEntry> = Vec::new();
    for entry in entries {
        match unique
            .iter_mut()
            .find(|existing| existing.concept_id() == entry.concept_id())
        {
            Some(existing) => *existing = entry,
            None => unique.push(entry),
        }
    }
    unique
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use mastery_core::model::{QuestionId, QuestionType};
    use mastery_core::time::fixed_now;

    fn registry() -> RemediationRegistry {
        RemediationRegistry::new(Clock::fixed(fixed_now()))
    }

    fn concept(raw: &str) -> ConceptId {
        ConceptId::new(raw)
    }

    #[test]
    fn failure_opens_an_obligation_and_closes_the_gate() {
        let mut registry = registry();
        assert!(registry.can_proceed());

        registry.register_failure(ConceptFailure::new("q1", "concept-budget", "mcq", "lesson-1"));

        assert!(registry.needs_remediation(&concept("concept-budget")));
        assert!(!registry.can_proceed());
    }

    #[test]
    fn repeated_failure_keeps_a_single_entry() {
        let mut registry = registry();
        registry.register_failure(
            ConceptFailure::new("q1", "concept-budget", "mcq", "lesson-1").with_variant("variant-1"),
        );
        registry.register_failure(ConceptFailure::new(
            "q2",
            "concept-budget",
            "true_false",
            "lesson-1",
        ));

        assert_eq!(registry.entries().len(), 1);
        let entry = registry.entry(&concept("concept-budget")).unwrap();
        assert_eq!(entry.question_id(), &QuestionId::new("q2"));
        assert_eq!(entry.question_type(), &QuestionType::TrueFalse);
        assert_eq!(entry.variant_question_id(), Some(&QuestionId::new("variant-1")));
    }

    #[test]
    fn mark_remediated_reopens_the_gate() {
        let mut registry = registry();
        registry.register_failure(ConceptFailure::new("q1", "c1", "mcq", "lesson-1"));

        assert!(registry.mark_remediated(&concept("c1")));
        assert!(!registry.needs_remediation(&concept("c1")));
        assert!(registry.can_proceed());

        let entry = registry.entry(&concept("c1")).unwrap();
        assert!(entry.remediation_complete());
        assert!(!entry.requires_remediation());
    }

    #[test]
    fn mark_remediated_on_unknown_concept_is_a_no_op() {
        let mut registry = registry();
        assert!(!registry.mark_remediated(&concept("ghost")));
        assert!(registry.entries().is_empty());
        assert!(registry.can_proceed());
    }

    #[test]
    fn gate_stays_closed_while_any_concept_is_owed() {
        let mut registry = registry();
        registry.register_failure(ConceptFailure::new("q1", "c1", "mcq", "lesson-1"));
        registry.register_failure(ConceptFailure::new("q2", "c2", "slider", "lesson-2"));

        registry.mark_remediated(&concept("c1"));
        assert!(!registry.can_proceed());

        registry.mark_remediated(&concept("c2"));
        assert!(registry.can_proceed());
    }

    #[test]
    fn failure_after_settling_reopens_the_concept() {
        let mut registry = registry();
        registry.register_failure(ConceptFailure::new("q1", "c1", "mcq", "lesson-1"));
        registry.mark_remediated(&concept("c1"));
        registry.register_failure(ConceptFailure::new("q3", "c1", "matching", "lesson-1"));

        assert!(registry.needs_remediation(&concept("c1")));
        assert!(!registry.can_proceed());
        assert_eq!(registry.entries().len(), 1);
    }

    #[test]
    fn lesson_and_pending_views_filter_entries() {
        let mut registry = registry();
        registry.register_failure(ConceptFailure::new("q1", "c1", "mcq", "lesson-1"));
        registry.register_failure(ConceptFailure::new("q2", "c2", "mcq", "lesson-1"));
        registry.register_failure(ConceptFailure::new("q3", "c3", "mcq", "lesson-2"));
        registry.mark_remediated(&concept("c2"));

        let lesson_one: Vec<_> = registry
            .remediation_for_lesson(&LessonId::new("lesson-1"))
            .into_iter()
            .map(|entry| entry.concept_id().as_str())
            .collect();
        assert_eq!(lesson_one, vec!["c1"]);

        let pending: Vec<_> = registry
            .pending_remediation()
            .into_iter()
            .map(|entry| entry.concept_id().as_str())
            .collect();
        assert_eq!(pending, vec!["c1", "c3"]);
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry = registry();
        registry.register_failure(ConceptFailure::new("q1", "c1", "mcq", "lesson-1"));
        registry.clear();

        assert!(registry.entries().is_empty());
        assert!(registry.can_proceed());
    }

    #[test]
    fn replace_snapshot_dedupes_and_recomputes_gate() {
        let mut registry = registry();
        let first = RemediationEntry::open(
            ConceptFailure::new("q1", "c1", "mcq", "lesson-1"),
            fixed_now(),
        );
        let mut settled = RemediationEntry::open(
            ConceptFailure::new("q2", "c1", "slider", "lesson-1"),
            fixed_now(),
        );
        settled.settle();

        registry.replace_snapshot([first, settled]);

        assert_eq!(registry.entries().len(), 1);
        assert!(registry.can_proceed());
    }
}
