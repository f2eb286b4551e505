//! Slack delivery channel.
//!
//! Text content is posted with `chat.postMessage`; CSV exports and
//! screenshots go through the external upload flow
//! (`files.getUploadURLExternal`, a raw upload, then
//! `files.completeUploadExternal`) with the message as the comment.

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use channel::{SlackChannel, SlackFactory, format_message};
pub use client::{PostedMessage, SlackClient};
pub use config::{SlackRecipientConfig, SlackSettings};
pub use error::SlackError;
