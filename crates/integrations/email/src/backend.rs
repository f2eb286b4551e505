use async_trait::async_trait;
use herald_channel::ChannelError;
use lettre::message::Mailbox;

/// A file attached to an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    /// MIME type, e.g. `text/csv`.
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

/// A fully composed email, ready for a backend to send.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Sender address.
    pub from: Mailbox,
    /// Every recipient of the message; all go on the `To` header.
    pub to: Vec<Mailbox>,
    /// Email subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Optional HTML alternative of the body.
    pub html_body: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

/// Result of a successful email send operation.
#[derive(Debug, Clone)]
pub struct EmailResult {
    /// Server-assigned message identifier (if available).
    pub message_id: Option<String>,
    /// Human-readable status (e.g. `"sent"`, `"queued"`).
    pub status: String,
}

/// Trait for pluggable email delivery backends.
///
/// Implementations handle the actual transport of messages while the
/// [`EmailChannel`](crate::channel::EmailChannel) composes them from report
/// content.
#[async_trait]
pub trait EmailBackend: Send + Sync + std::fmt::Debug {
    /// Send an email message through this backend. Must not retry.
    async fn send(&self, message: &EmailMessage) -> Result<EmailResult, ChannelError>;

    /// Return the backend name (e.g. `"smtp"`).
    fn backend_name(&self) -> &'static str;
}
