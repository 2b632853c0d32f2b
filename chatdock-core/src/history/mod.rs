//! Chat history management
//!
//! Sessions live in a [`SessionStore`] that loads from and saves to a
//! [`KeyValueStore`] as two blobs: the JSON session array and the active
//! session id.

pub mod persist;
pub mod storage;
pub mod store;
pub mod types;

pub use persist::{Persister, Snapshot, StorageKeys};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{summarize, SessionStore, StoreSettings, DEFAULT_SESSION_ID};
pub use types::{ChatSession, FileAttachment, Message, MessageKind, Sender, SessionId};
