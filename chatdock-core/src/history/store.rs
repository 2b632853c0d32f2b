//! Session store: the chat history state container
//!
//! Holds the ordered session collection (newest first), the active
//! session pointer and the visible message list. Every mutation goes
//! through `&mut self`, so there is exactly one writer; durability is
//! delegated to the debounced [`Persister`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::persist::{Persister, Snapshot, StorageKeys};
use super::storage::KeyValueStore;
use super::types::{
    first_user_message, validate_messages, ChatSession, Message, SessionId, UNTITLED_SESSION,
};
use crate::config::HistoryConfig;
use crate::utils::truncate_with_ellipsis;

/// Active id used before any session has been created
pub const DEFAULT_SESSION_ID: &str = "default";

/// Tunables of the session store
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub keys: StorageKeys,
    pub debounce: Duration,
    pub title_max_chars: usize,
    pub preview_max_chars: usize,
    pub ellipsis_only_when_truncated: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&HistoryConfig::default())
    }
}

impl From<&HistoryConfig> for StoreSettings {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            keys: StorageKeys {
                sessions: config.sessions_key.clone(),
                active: config.active_key.clone(),
            },
            debounce: config.debounce(),
            title_max_chars: config.title_max_chars,
            preview_max_chars: config.preview_max_chars,
            ellipsis_only_when_truncated: config.ellipsis_only_when_truncated,
        }
    }
}

/// Title and preview for a message list, taken from the first user message
pub fn summarize(messages: &[Message], settings: &StoreSettings) -> (String, String) {
    match first_user_message(messages) {
        Some(message) => (
            truncate_with_ellipsis(
                &message.content,
                settings.title_max_chars,
                settings.ellipsis_only_when_truncated,
            ),
            truncate_with_ellipsis(
                &message.content,
                settings.preview_max_chars,
                settings.ellipsis_only_when_truncated,
            ),
        ),
        None => (UNTITLED_SESSION.to_string(), String::new()),
    }
}

/// Owned chat history state with debounced persistence
#[derive(Debug)]
pub struct SessionStore {
    sessions: Vec<ChatSession>,
    active_id: SessionId,
    messages: Vec<Message>,
    settings: StoreSettings,
    persister: Persister,
}

impl SessionStore {
    /// Create an empty store without touching storage
    pub fn new(storage: Arc<dyn KeyValueStore>, settings: StoreSettings) -> Self {
        let persister = Persister::new(storage, settings.keys.clone(), settings.debounce);
        Self {
            sessions: Vec::new(),
            active_id: DEFAULT_SESSION_ID.to_string(),
            messages: Vec::new(),
            settings,
            persister,
        }
    }

    /// Create a store and load persisted history into it
    pub async fn open(storage: Arc<dyn KeyValueStore>, settings: StoreSettings) -> Self {
        let mut store = Self::new(storage, settings);
        store.load().await;
        store
    }

    /// Replace in-memory state with what storage holds.
    ///
    /// Never fails: an unreadable backend switches the store to
    /// in-memory-only mode, a malformed payload loads as empty history.
    pub async fn load(&mut self) {
        self.persister.cancel();
        self.sessions.clear();
        self.messages.clear();
        self.active_id = DEFAULT_SESSION_ID.to_string();

        let storage = Arc::clone(self.persister.storage());
        let keys = self.persister.keys().clone();

        match storage.get(&keys.sessions).await {
            Ok(Some(raw)) => self.sessions = decode_sessions(&raw),
            Ok(None) => debug!("No saved chat history"),
            Err(e) => {
                warn!(
                    "Failed to load chat history, continuing in memory only: {}",
                    e
                );
                self.persister.disable();
                return;
            }
        }

        match storage.get(&keys.active).await {
            Ok(Some(id)) if !id.trim().is_empty() => self.active_id = id.trim().to_string(),
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "Failed to load current chat id, continuing in memory only: {}",
                    e
                );
                self.persister.disable();
            }
        }

        if let Some(messages) = self.find(&self.active_id).map(|s| s.messages.clone()) {
            self.messages = messages;
        }

        info!(
            sessions = self.sessions.len(),
            active = %self.active_id,
            backend = storage.name(),
            "Loaded chat history"
        );
    }

    /// Start a fresh, unsaved session and make it active
    pub fn create_session(&mut self) -> SessionId {
        let mut id = new_session_id();
        while self.find(&id).is_some() || id == self.active_id {
            id = new_session_id();
        }

        debug!(session = %id, "Created chat session");
        self.active_id = id.clone();
        self.messages.clear();
        self.persist();
        id
    }

    /// Make a stored session active. Unknown ids leave everything unchanged.
    pub fn select_session(&mut self, id: &str) -> bool {
        let Some(messages) = self.find(id).map(|s| s.messages.clone()) else {
            debug!(session = id, "Ignoring selection of unknown chat session");
            return false;
        };

        self.messages = messages;
        self.active_id = id.to_string();
        self.persist();
        true
    }

    /// Replace the active session's messages.
    ///
    /// A non-empty list is upserted into the collection with a fresh
    /// title, preview and timestamp; new sessions go to the front.
    pub fn append_messages(&mut self, messages: Vec<Message>) -> crate::Result<()> {
        validate_messages(&messages)?;
        self.messages = messages;

        if self.messages.is_empty() {
            return Ok(());
        }

        let (title, preview) = summarize(&self.messages, &self.settings);
        let session = ChatSession {
            id: self.active_id.clone(),
            title,
            preview,
            timestamp: Utc::now(),
            messages: self.messages.clone(),
        };

        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => self.sessions.insert(0, session),
        }

        self.persist();
        Ok(())
    }

    /// Remove a session. Deleting the active one starts a new session.
    pub fn delete_session(&mut self, id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        let removed = self.sessions.len() != before;

        if self.active_id == id {
            self.create_session();
        } else if removed {
            self.persist();
        }

        if removed {
            debug!(session = id, "Deleted chat session");
        }
        removed
    }

    /// Schedule a debounced write of the current state
    pub fn persist(&mut self) {
        let snapshot = self.snapshot();
        self.persister.schedule(snapshot);
    }

    /// Cancel any pending write and write the current state now
    pub async fn flush(&mut self) -> crate::Result<()> {
        let snapshot = self.snapshot();
        let result = self.persister.flush(snapshot).await;
        if let Err(e) = &result {
            warn!("Failed to save chat history: {}", e);
        }
        result
    }

    /// Flush and tear the store down
    pub async fn shutdown(mut self) -> crate::Result<()> {
        self.flush().await
    }

    /// All sessions, newest first
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Look up a session by id
    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.find(id)
    }

    /// Like [`session`](Self::session), but an unknown id is an error
    pub fn require_session(&self, id: &str) -> crate::Result<&ChatSession> {
        self.find(id)
            .ok_or_else(|| crate::Error::NotFound(format!("chat session {}", id)))
    }

    /// Id of the active session
    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// The active session, if it has been saved
    pub fn active_session(&self) -> Option<&ChatSession> {
        self.find(&self.active_id)
    }

    /// Visible messages of the active session
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether changes still reach durable storage
    pub fn is_durable(&self) -> bool {
        self.persister.is_enabled()
    }

    /// Whether a debounced write is waiting to fire
    pub fn has_pending_persist(&self) -> bool {
        self.persister.is_pending()
    }

    fn find(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            sessions: self.sessions.clone(),
            active_id: self.active_id.clone(),
        }
    }
}

fn new_session_id() -> SessionId {
    format!("chat-{}", Uuid::new_v4().simple())
}

/// Parse a persisted session array, discarding anything malformed
fn decode_sessions(raw: &str) -> Vec<ChatSession> {
    let parsed: Vec<ChatSession> = match serde_json::from_str(raw) {
        Ok(sessions) => sessions,
        Err(e) => {
            warn!("Discarding unreadable chat history: {}", e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    parsed
        .into_iter()
        .filter(|session| {
            if !seen.insert(session.id.clone()) {
                warn!(session = %session.id, "Dropping duplicate chat session");
                return false;
            }
            if let Err(e) = validate_messages(&session.messages) {
                warn!(session = %session.id, "Dropping chat session: {}", e);
                return false;
            }
            true
        })
        .collect()
}
