//! Chat history data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Session identifier
pub type SessionId = String;

/// Title used while a session has no user message
pub const UNTITLED_SESSION: &str = "New Chat";

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Bot => write!(f, "bot"),
        }
    }
}

/// How the widget renders a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Text,
    /// Bot message offering the onboarding shortcuts
    ActionButtons,
}

/// Reference to a file attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl FileAttachment {
    /// Create an attachment reference with a fresh id
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            id: format!("file-{}", Uuid::new_v4().simple()),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            url: None,
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within its session
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<FileAttachment>>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", sender, Uuid::new_v4().simple()),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            kind: None,
            attachments: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    /// Create a bot message
    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Sender::Bot, content)
    }

    /// Set the render kind
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Attach file references; an empty list is stored as absent
    pub fn with_attachments(mut self, attachments: Vec<FileAttachment>) -> Self {
        self.attachments = if attachments.is_empty() {
            None
        } else {
            Some(attachments)
        };
        self
    }

    /// Number of attached files
    pub fn attachment_count(&self) -> usize {
        self.attachments.as_ref().map_or(0, Vec::len)
    }
}

/// A conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub title: String,
    pub preview: String,
    /// Last update time
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// First message written by the user, if any
pub fn first_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().find(|m| m.sender == Sender::User)
}

/// Check that message ids are unique and timestamps never go backwards
pub fn validate_messages(messages: &[Message]) -> crate::Result<()> {
    let mut seen = HashSet::with_capacity(messages.len());
    for message in messages {
        if !seen.insert(message.id.as_str()) {
            return Err(crate::Error::Validation(format!(
                "duplicate message id: {}",
                message.id
            )));
        }
    }

    if let Some(pair) = messages
        .windows(2)
        .find(|pair| pair[1].timestamp < pair[0].timestamp)
    {
        return Err(crate::Error::Validation(format!(
            "message {} is older than the message before it",
            pair[1].id
        )));
    }

    Ok(())
}
