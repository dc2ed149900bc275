use std::collections::BTreeMap;
use std::sync::Arc;

use mastery_core::Clock;
use mastery_core::model::{
    LessonId, LessonProgressView, ModuleDescriptor, ModuleId, ModuleRecord, clears_gate,
};
use storage::keys::MODULE_PROGRESS_KEY;
use storage::repository::KvStore;

use crate::persist::{Persister, load_snapshot};

/// Authoritative per-module completion and mastery state for one learner.
///
/// Mutations take effect in memory before they return; the durable copy is
/// written behind by a [`Persister`] and may lag or be lost on a failed write.
pub struct ModuleProgressTracker {
    clock: Clock,
    records: BTreeMap<ModuleId, ModuleRecord>,
    persister: Persister,
}

impl ModuleProgressTracker {
    /// An empty tracker that keeps state in memory only.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            records: BTreeMap::new(),
            persister: Persister::detached(MODULE_PROGRESS_KEY),
        }
    }

    /// Load the tracker stored under `key`, then write behind to the same key.
    ///
    /// A missing, unreadable or corrupt value yields an empty tracker.
    pub async fn load(kv: Arc<dyn KvStore>, key: &str, clock: Clock) -> Self {
        let records: BTreeMap<ModuleId, ModuleRecord> = load_snapshot(kv.as_ref(), key).await;
        tracing::debug!(key, modules = records.len(), "module progress loaded");
        Self {
            clock,
            records,
            persister: Persister::spawn(kv, key),
        }
    }

    //
    // ─── MUTATIONS ─────────────────────────────────────────────────────────────
    //

    /// Mark a reading module as completed and mastered.
    ///
    /// Every call counts as a visit and bumps `attempts`.
    pub fn complete_reading(&mut self, module_id: &ModuleId) {
        let record =
            ModuleRecord::after_reading(self.records.get(module_id), module_id, self.clock.now());
        tracing::debug!(module = %module_id, attempts = record.attempts(), "reading completed");
        self.commit(record);
    }

    /// Record a quiz submission and report whether it reached mastery.
    ///
    /// `score` is a percentage and `mastery_threshold` a fraction; mastery is
    /// `score >= mastery_threshold * 100`. The result is returned before the
    /// durable write has happened.
    pub fn record_quiz_attempt(
        &mut self,
        module_id: &ModuleId,
        score: f64,
        mastery_threshold: f64,
    ) -> bool {
        let record = ModuleRecord::after_quiz(
            self.records.get(module_id),
            module_id,
            score,
            mastery_threshold,
            self.clock.now(),
        );
        let achieved = record.mastery_achieved();
        tracing::debug!(
            module = %module_id,
            score,
            mastery_threshold,
            achieved,
            attempts = record.attempts(),
            "quiz attempt recorded"
        );
        self.commit(record);
        achieved
    }

    /// Forget a module entirely; it behaves as never attempted afterwards.
    pub fn reset_module(&mut self, module_id: &ModuleId) {
        if self.records.remove(module_id).is_some() {
            tracing::debug!(module = %module_id, "module progress reset");
            self.persister.save(&self.records);
        }
    }

    /// Drop every record and erase the durable copy.
    pub fn clear_all(&mut self) {
        self.records.clear();
        self.persister.erase();
        tracing::debug!(key = self.persister.key(), "module progress cleared");
    }

    /// Replace local state with a snapshot from elsewhere (e.g. remote sync).
    ///
    /// The snapshot wins outright; nothing is merged.
    pub fn replace_snapshot(&mut self, records: impl IntoIterator<Item = ModuleRecord>) {
        self.records = records
            .into_iter()
            .map(|record| (record.module_id().clone(), record))
            .collect();
        self.persister.save(&self.records);
    }

    fn commit(&mut self, record: ModuleRecord) {
        self.records.insert(record.module_id().clone(), record);
        self.persister.save(&self.records);
    }

    //
    // ─── QUERIES ───────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn module_progress(&self, module_id: &ModuleId) -> Option<&ModuleRecord> {
        self.records.get(module_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.values()
    }

    /// Whether the module at `index` of `modules` may be opened.
    ///
    /// Index 0 is always open. Otherwise every earlier module must be
    /// completed, and quiz-typed ones mastered.
    #[must_use]
    pub fn can_access_module(
        &self,
        module_id: &ModuleId,
        index: usize,
        modules: &[ModuleDescriptor],
    ) -> bool {
        let allowed = self.first_blocking_module(index, modules).is_none();
        tracing::trace!(module = %module_id, index, allowed, "module access checked");
        allowed
    }

    /// The earliest module before `index` that still blocks access, scanning
    /// from the start of the lesson.
    #[must_use]
    pub fn first_blocking_module<'m>(
        &self,
        index: usize,
        modules: &'m [ModuleDescriptor],
    ) -> Option<&'m ModuleDescriptor> {
        modules
            .iter()
            .take(index)
            .find(|module| !clears_gate(module, self.records.get(&module.id)))
    }

    /// True when the lesson has modules and all of them are completed.
    #[must_use]
    pub fn is_lesson_complete(&self, modules: &[ModuleDescriptor]) -> bool {
        !modules.is_empty()
            && modules.iter().all(|module| {
                self.records
                    .get(&module.id)
                    .is_some_and(ModuleRecord::is_completed)
            })
    }

    #[must_use]
    pub fn lesson_progress(
        &self,
        lesson_id: &LessonId,
        modules: &[ModuleDescriptor],
    ) -> LessonProgressView {
        LessonProgressView::derive(lesson_id.clone(), modules, |id| self.records.get(id))
    }

    //
    // ─── DURABILITY ────────────────────────────────────────────────────────────
    //

    /// Wait for every write queued so far to be attempted.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    /// Count of durable writes that failed and were dropped.
    #[must_use]
    pub fn failed_writes(&self) -> u64 {
        self.persister.failed_writes()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
