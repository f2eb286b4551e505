//! Email delivery channel.
//!
//! Report content becomes one message per recipient, addressed to every
//! address in the recipient's `target`. The default backend speaks SMTP
//! through `lettre`; any [`EmailBackend`] can stand in for it.

pub mod backend;
pub mod channel;
pub mod config;
pub mod message;
pub mod smtp;

pub use backend::{EmailAttachment, EmailBackend, EmailMessage, EmailResult};
pub use channel::{EmailChannel, EmailFactory};
pub use config::{EmailRecipientConfig, EmailSettings};
pub use message::{ComposedEmail, compose};
pub use smtp::SmtpBackend;
