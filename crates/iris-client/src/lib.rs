//! Thin client for the Iris HTTP service plus the interactive terminal chat.

pub mod api;
pub mod chat;
pub mod error;

pub use api::{ApiClient, Health, TextReply};
pub use chat::{Command, run_chat};
pub use error::ClientError;
