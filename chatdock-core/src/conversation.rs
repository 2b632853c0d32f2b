//! Conversation shaping around the session store
//!
//! The widget seeds fresh conversations with a greeting, turns input box
//! submissions into user messages and answers with a placeholder bot
//! reply until a real backend is wired in.

use crate::config::HistoryConfig;
use crate::history::{FileAttachment, Message, MessageKind, Sender};

/// Content used when a message carries attachments but no text
pub const ATTACHMENT_ONLY_CONTENT: &str = "📎 File attachment";

/// Messages a fresh conversation starts with
pub fn greeting_messages(config: &HistoryConfig) -> Vec<Message> {
    if !config.seed_greeting || config.greeting.trim().is_empty() {
        return Vec::new();
    }
    vec![Message::bot(config.greeting.clone()).with_kind(MessageKind::Text)]
}

/// Turn input box contents into a user message.
///
/// Blank text without attachments is ignored.
pub fn compose_user_message(content: &str, attachments: Vec<FileAttachment>) -> Option<Message> {
    let content = content.trim();
    if content.is_empty() && attachments.is_empty() {
        return None;
    }

    let content = if content.is_empty() {
        ATTACHMENT_ONLY_CONTENT
    } else {
        content
    };
    Some(Message::user(content).with_attachments(attachments))
}

/// Placeholder bot answer to a user message
pub fn canned_reply(user_message: &Message) -> Message {
    let shared = match user_message.attachment_count() {
        0 => String::new(),
        n => format!("I can see you've shared {} file(s). ", n),
    };
    Message::bot(format!(
        "Thanks for your message! {}How can I help you further?",
        shared
    ))
}

/// Next message list after the user sends `content`.
///
/// Seeds the greeting when the conversation is empty, then appends the
/// user message and the bot reply. Returns `None` when there is nothing
/// to send.
pub fn next_turn(
    current: &[Message],
    content: &str,
    attachments: Vec<FileAttachment>,
    config: &HistoryConfig,
) -> Option<Vec<Message>> {
    let mut user_message = compose_user_message(content, attachments)?;

    let mut messages = if current.is_empty() {
        greeting_messages(config)
    } else {
        current.to_vec()
    };
    // The new turn must not sort before what is already there.
    if let Some(last) = messages.last() {
        user_message.timestamp = user_message.timestamp.max(last.timestamp);
    }
    let mut reply = canned_reply(&user_message);
    reply.timestamp = reply.timestamp.max(user_message.timestamp);

    messages.push(user_message);
    messages.push(reply);
    Some(messages)
}

/// One-line transcript rendering of a message
pub fn transcript_line(message: &Message) -> String {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Bot => "bot",
    };
    let mut line = format!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M"),
        who,
        message.content
    );
    if let Some(attachments) = &message.attachments {
        let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
        line.push_str(&format!(" ({})", names.join(", ")));
    }
    line
}
