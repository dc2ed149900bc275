//! Write-behind persistence shared by the progress stores.
//!
//! Store mutations update memory first and then hand a full JSON snapshot to a
//! [`Persister`]. A single writer task per store drains the queue in order, so
//! the last enqueued snapshot is the one that ends up durable. Write failures
//! are logged and counted, never retried, and never roll back memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use storage::repository::KvStore;
use tokio::sync::{mpsc, oneshot};

use crate::error::PersistError;

enum WriteOp {
    Set(Vec<u8>),
    Remove,
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer for one storage key.
pub struct Persister {
    key: String,
    tx: Option<mpsc::UnboundedSender<WriteOp>>,
    failed: Arc<AtomicU64>,
}

impl Persister {
    /// Start a writer task for `key` on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let failed = Arc::new(AtomicU64::new(0));
        tokio::spawn(run_writer(kv, key.clone(), rx, Arc::clone(&failed)));
        Self {
            key,
            tx: Some(tx),
            failed,
        }
    }

    /// A persister that drops every write; for purely in-memory stores.
    #[must_use]
    pub fn detached(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tx: None,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Queue a full snapshot of the store. Returns immediately.
    pub fn save<T: Serialize + ?Sized>(&self, snapshot: &T) {
        if self.tx.is_none() {
            return;
        }
        match serde_json::to_vec(snapshot) {
            Ok(bytes) => self.enqueue(WriteOp::Set(bytes)),
            Err(err) => self.record_failure(&PersistError::Encode(err)),
        }
    }

    /// Queue deletion of the store's key. Returns immediately.
    pub fn erase(&self) {
        self.enqueue(WriteOp::Remove);
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(WriteOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Writes and encodes that failed since this persister was created.
    #[must_use]
    pub fn failed_writes(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn enqueue(&self, op: WriteOp) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(op).is_err() {
            self.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key = %self.key, "persistence writer is gone; write dropped");
        }
    }

    fn record_failure(&self, err: &PersistError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(key = %self.key, error = %err, "persistence write skipped");
    }
}

async fn run_writer(
    kv: Arc<dyn KvStore>,
    key: String,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
    failed: Arc<AtomicU64>,
) {
    while let Some(op) = rx.recv().await {
        let result = match op {
            WriteOp::Set(bytes) => kv.set(&key, bytes).await,
            WriteOp::Remove => kv.remove(&key).await,
            WriteOp::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        if let Err(err) = result {
            failed.fetch_add(1, Ordering::Relaxed);
            let err = PersistError::from(err);
            tracing::warn!(key = %key, error = %err, "persistence write failed; keeping in-memory state");
        }
    }
    tracing::debug!(key = %key, "persistence writer stopped");
}

/// Read and decode the snapshot stored under `key`.
///
/// Missing, unreadable and undecodable values all yield `T::default()`; the
/// latter two are logged.
pub async fn load_snapshot<T>(kv: &dyn KvStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match read_snapshot(kv, key).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => T::default(),
        Err(err) => {
            tracing::warn!(key, error = %err, "could not load stored progress; starting empty");
            T::default()
        }
    }
}

async fn read_snapshot<T: DeserializeOwned>(
    kv: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, PersistError> {
    let Some(bytes) = kv.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(PersistError::Decode)
}
