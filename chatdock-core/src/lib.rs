//! Core types and services for chatdock
//!
//! This crate provides the chat session history store used by the
//! dashboard chat widget: the message/session data model, key-value
//! storage backends, debounced persistence and the helpers that shape
//! a conversation around them.

pub mod config;
pub mod conversation;
pub mod error;
pub mod history;
pub mod logging;
pub mod utils;

pub use error::{Error, Result};
