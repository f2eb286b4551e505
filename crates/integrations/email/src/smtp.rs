use async_trait::async_trait;
use herald_channel::ChannelError;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error, info};

use crate::backend::{EmailBackend, EmailMessage, EmailResult};
use crate::config::EmailSettings;

/// Reply codes meaning the server refused our credentials.
const AUTH_REJECTED: &[&str] = &["530", "534", "535"];

/// SMTP email delivery backend using `lettre`.
pub struct SmtpBackend {
    settings: EmailSettings,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpBackend")
            .field("settings", &self.settings)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl SmtpBackend {
    /// Create a new `SmtpBackend` from the process-wide SMTP settings.
    pub fn new(settings: EmailSettings) -> Result<Self, ChannelError> {
        let transport = build_transport(&settings)?;
        Ok(Self {
            settings,
            transport,
        })
    }

    /// Create a `SmtpBackend` with a pre-built transport.
    pub fn with_transport(
        settings: EmailSettings,
        transport: AsyncSmtpTransport<Tokio1Executor>,
    ) -> Self {
        Self {
            settings,
            transport,
        }
    }
}

#[async_trait]
impl EmailBackend for SmtpBackend {
    async fn send(&self, message: &EmailMessage) -> Result<EmailResult, ChannelError> {
        debug!(
            recipients = message.to.len(),
            attachments = message.attachments.len(),
            subject = %message.subject,
            "building SMTP message"
        );
        let lettre_message = build_message(message)?;

        info!(host = %self.settings.smtp_host, subject = %message.subject, "sending email via SMTP");
        let response = self.transport.send(lettre_message).await.map_err(|e| {
            error!(error = %e, "SMTP send failed");
            map_smtp_error(e)
        })?;

        let message_id = response.message().next().map(str::to_owned);
        info!(recipients = message.to.len(), "email sent successfully via SMTP");
        Ok(EmailResult {
            message_id,
            status: "sent".to_owned(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "smtp"
    }
}

/// Build a `lettre::Message` from the composed [`EmailMessage`].
///
/// The body is plain text, or a plain/HTML alternative when an HTML body is
/// present; attachments turn the whole message into `multipart/mixed`.
fn build_message(msg: &EmailMessage) -> Result<Message, ChannelError> {
    if msg.to.is_empty() {
        return Err(ChannelError::Configuration(
            "email has no recipients".to_owned(),
        ));
    }

    let mut builder = Message::builder()
        .from(msg.from.clone())
        .subject(&msg.subject);
    for mailbox in &msg.to {
        builder = builder.to(mailbox.clone());
    }

    let build_error = |e: lettre::error::Error| {
        ChannelError::Encoding(format!("failed to build email: {e}"))
    };

    if msg.attachments.is_empty() {
        return match &msg.html_body {
            Some(html) => builder
                .multipart(MultiPart::alternative_plain_html(
                    msg.body.clone(),
                    html.clone(),
                ))
                .map_err(build_error),
            None => builder
                .singlepart(SinglePart::plain(msg.body.clone()))
                .map_err(build_error),
        };
    }

    let mut mixed = match &msg.html_body {
        Some(html) => MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
            msg.body.clone(),
            html.clone(),
        )),
        None => MultiPart::mixed().singlepart(SinglePart::plain(msg.body.clone())),
    };
    for attachment in &msg.attachments {
        let content_type = ContentType::parse(attachment.content_type).map_err(|e| {
            ChannelError::Encoding(format!(
                "invalid content type '{}': {e}",
                attachment.content_type
            ))
        })?;
        mixed = mixed.singlepart(
            Attachment::new(attachment.filename.clone())
                .body(attachment.data.clone(), content_type),
        );
    }
    builder.multipart(mixed).map_err(build_error)
}

/// Build an async SMTP transport from the given settings.
fn build_transport(
    settings: &EmailSettings,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, ChannelError> {
    let builder = if settings.tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
            .map_err(|e| ChannelError::Configuration(format!("SMTP TLS relay error: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host)
    };

    let builder = builder.port(settings.smtp_port);

    let builder = if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
        builder.credentials(Credentials::new(user.clone(), pass.clone()))
    } else {
        builder
    };

    Ok(builder.build())
}

/// Map a lettre SMTP error to the matching [`ChannelError`] variant.
///
/// Transient (4xx) replies are retryable transfer failures. Permanent (5xx)
/// replies are authentication failures for the auth codes and configuration
/// problems otherwise (unknown mailbox, relay denied). Anything without a
/// reply code happened below SMTP and counts as a connection failure.
fn map_smtp_error(error: lettre::transport::smtp::Error) -> ChannelError {
    if error.is_transient() {
        return ChannelError::transfer("smtp", error);
    }
    if error.is_permanent() {
        let rejected_auth = error
            .status()
            .is_some_and(|code| AUTH_REJECTED.contains(&code.to_string().as_str()));
        if rejected_auth {
            return ChannelError::authentication("smtp", error);
        }
        return ChannelError::Configuration(format!("permanent SMTP error: {error}"));
    }
    ChannelError::connection("smtp", error)
}
