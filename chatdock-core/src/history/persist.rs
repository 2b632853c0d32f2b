//! Debounced persistence of the session collection
//!
//! Every mutation hands the persister a fresh snapshot. The persister
//! aborts the timer of the previous snapshot and starts a new one, so a
//! burst of mutations collapses into a single write once the store has
//! been quiet for the configured delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::storage::KeyValueStore;
use super::types::ChatSession;

/// Storage keys used by the session store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Key of the serialized session array
    pub sessions: String,
    /// Key of the active session id
    pub active: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            sessions: crate::config::DEFAULT_SESSIONS_KEY.to_string(),
            active: crate::config::DEFAULT_ACTIVE_KEY.to_string(),
        }
    }
}

/// Point-in-time copy of everything that gets written
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub sessions: Vec<ChatSession>,
    pub active_id: String,
}

/// Schedules and performs snapshot writes
pub struct Persister {
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    delay: Duration,
    enabled: bool,
    next_seq: u64,
    /// Sequence number of the newest snapshot written so far
    written: Arc<Mutex<u64>>,
    pending: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("storage", &self.storage.name())
            .field("keys", &self.keys)
            .field("delay", &self.delay)
            .field("enabled", &self.enabled)
            .field("next_seq", &self.next_seq)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Persister {
    /// Create a persister writing to `storage` after `delay` of quiet
    pub fn new(storage: Arc<dyn KeyValueStore>, keys: StorageKeys, delay: Duration) -> Self {
        Self {
            storage,
            keys,
            delay,
            enabled: true,
            next_seq: 0,
            written: Arc::new(Mutex::new(0)),
            pending: None,
        }
    }

    /// Stop writing for the rest of the run
    pub fn disable(&mut self) {
        self.cancel();
        self.enabled = false;
    }

    /// Whether snapshots still reach storage
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a scheduled write has not fired yet
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Storage backend
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    /// Storage keys
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Drop the pending write, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }

    /// Replace any pending write with `snapshot`, written after the delay.
    ///
    /// Outside a tokio runtime there is nothing to run the timer on; the
    /// change stays in memory until the next `flush`.
    pub fn schedule(&mut self, snapshot: Snapshot) {
        if !self.enabled {
            debug!("Persistence disabled, keeping changes in memory");
            return;
        }

        if self.cancel() {
            debug!("Rescheduled pending persist");
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime to persist chat history on, waiting for flush");
            return;
        };

        self.next_seq += 1;
        let seq = self.next_seq;
        let delay = self.delay;
        let storage = Arc::clone(&self.storage);
        let keys = self.keys.clone();
        let written = Arc::clone(&self.written);

        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // The write runs in its own task so aborting the timer from here
            // on cannot interrupt it halfway.
            let write = tokio::spawn(async move {
                if let Err(e) = write_snapshot(&*storage, &keys, &written, seq, &snapshot).await
                {
                    warn!("Failed to save chat history: {}", e);
                }
            });
            let _ = write.await;
        }));
    }

    /// Cancel the pending write and write `snapshot` now
    pub async fn flush(&mut self, snapshot: Snapshot) -> crate::Result<()> {
        self.cancel();
        if !self.enabled {
            return Ok(());
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        write_snapshot(&*self.storage, &self.keys, &self.written, seq, &snapshot).await
    }
}

/// Write both keys unless a newer snapshot already reached storage
async fn write_snapshot(
    storage: &dyn KeyValueStore,
    keys: &StorageKeys,
    written: &Mutex<u64>,
    seq: u64,
    snapshot: &Snapshot,
) -> crate::Result<()> {
    let mut last = written.lock().await;
    if *last > seq {
        debug!(seq, newest = *last, "Skipping stale snapshot");
        return Ok(());
    }

    let payload = serde_json::to_string(&snapshot.sessions)?;
    storage.set(&keys.sessions, &payload).await?;
    storage.set(&keys.active, &snapshot.active_id).await?;
    *last = seq;

    debug!(
        seq,
        sessions = snapshot.sessions.len(),
        backend = storage.name(),
        "Saved chat history"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::storage::MemoryStore;

    fn snapshot(active: &str) -> Snapshot {
        Snapshot {
            sessions: Vec::new(),
            active_id: active.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_writes_after_delay() {
        let storage = Arc::new(MemoryStore::new());
        let mut persister = Persister::new(
            storage.clone(),
            StorageKeys::default(),
            Duration::from_millis(1000),
        );

        persister.schedule(snapshot("chat-a"));
        assert!(persister.is_pending());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(storage.get("current-chat-id").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(
            storage.get("current-chat-id").await.unwrap().as_deref(),
            Some("chat-a")
        );
        assert_eq!(
            storage.get("chat-history").await.unwrap().as_deref(),
            Some("[]")
        );
        assert!(!persister.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_keeps_only_latest() {
        let storage = Arc::new(MemoryStore::new());
        let mut persister = Persister::new(
            storage.clone(),
            StorageKeys::default(),
            Duration::from_millis(1000),
        );

        persister.schedule(snapshot("chat-a"));
        tokio::time::sleep(Duration::from_millis(800)).await;
        persister.schedule(snapshot("chat-b"));
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(storage.get("current-chat-id").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(
            storage.get("current-chat-id").await.unwrap().as_deref(),
            Some("chat-b")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_cancels_pending() {
        let storage = Arc::new(MemoryStore::new());
        let mut persister = Persister::new(
            storage.clone(),
            StorageKeys::default(),
            Duration::from_millis(1000),
        );

        persister.schedule(snapshot("chat-a"));
        persister.flush(snapshot("chat-b")).await.unwrap();
        assert!(!persister.is_pending());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(
            storage.get("current-chat-id").await.unwrap().as_deref(),
            Some("chat-b")
        );
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_skipped() {
        let storage = MemoryStore::new();
        let keys = StorageKeys::default();
        let written = Mutex::new(0);

        write_snapshot(&storage, &keys, &written, 2, &snapshot("new"))
            .await
            .unwrap();
        write_snapshot(&storage, &keys, &written, 1, &snapshot("old"))
            .await
            .unwrap();

        assert_eq!(
            storage.get("current-chat-id").await.unwrap().as_deref(),
            Some("new")
        );
    }

    #[test]
    fn test_schedule_without_runtime_defers_to_flush() {
        let storage = Arc::new(MemoryStore::new());
        let mut persister = Persister::new(
            storage.clone(),
            StorageKeys::default(),
            Duration::from_millis(10),
        );

        persister.schedule(snapshot("chat-a"));
        assert!(!persister.is_pending());
        assert!(storage.is_empty());

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime
            .block_on(persister.flush(snapshot("chat-a")))
            .unwrap();
        assert_eq!(
            runtime
                .block_on(storage.get("current-chat-id"))
                .unwrap()
                .as_deref(),
            Some("chat-a")
        );
    }

    #[tokio::test]
    async fn test_disabled_persister_never_writes() {
        let storage = Arc::new(MemoryStore::new());
        let mut persister =
            Persister::new(storage.clone(), StorageKeys::default(), Duration::ZERO);

        persister.disable();
        persister.schedule(snapshot("chat-a"));
        persister.flush(snapshot("chat-a")).await.unwrap();

        assert!(!persister.is_pending());
        assert!(storage.is_empty());
    }
}
