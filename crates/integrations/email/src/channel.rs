use std::sync::Arc;

use herald_channel::{
    Channel, ChannelError, ChannelFactory, CsvExportSettings, CsvReencoder, DynChannel,
    FilenameBuilder, SendReceipt,
};
use herald_core::{NotificationContent, Recipient, RecipientId, RecipientType};
use lettre::message::Mailbox;
use tracing::{debug, info, instrument};

use crate::backend::{EmailBackend, EmailMessage};
use crate::config::{EmailRecipientConfig, EmailSettings, REQUIRED_KEYS};
use crate::message::compose;
use crate::smtp::SmtpBackend;

/// Sends report content to one recipient's list of addresses.
pub struct EmailChannel {
    recipient: RecipientId,
    from: Mailbox,
    to: Vec<Mailbox>,
    subject_prefix: String,
    reencoder: CsvReencoder,
    filenames: FilenameBuilder,
    backend: Arc<dyn EmailBackend>,
}

impl Channel for EmailChannel {
    fn recipient_type(&self) -> RecipientType {
        RecipientType::Email
    }

    #[instrument(
        skip(self, content),
        fields(
            recipient = %self.recipient,
            channel = "email",
            backend = self.backend.backend_name(),
        )
    )]
    async fn send(&self, content: &NotificationContent) -> Result<SendReceipt, ChannelError> {
        let composed = compose(content, &self.reencoder, &self.filenames)?;
        debug!(
            attachments = composed.attachments.len(),
            "composed email"
        );

        let message = EmailMessage {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: format!("{}{}", self.subject_prefix, content.name),
            body: composed.body,
            html_body: Some(composed.html_body),
            attachments: composed.attachments,
        };
        let result = self.backend.send(&message).await?;
        info!(
            recipients = self.to.len(),
            message_id = result.message_id.as_deref().unwrap_or("-"),
            "delivered by email"
        );
        Ok(SendReceipt::new(
            self.to.iter().map(|m| m.email.to_string()).collect(),
        ))
    }
}

/// Builds [`EmailChannel`]s that share one backend.
pub struct EmailFactory {
    backend: Arc<dyn EmailBackend>,
    from: Mailbox,
    subject_prefix: String,
    csv: CsvExportSettings,
    filenames: FilenameBuilder,
}

impl EmailFactory {
    /// Factory sending through SMTP with the given settings.
    pub fn smtp(
        settings: &EmailSettings,
        csv: CsvExportSettings,
        filenames: FilenameBuilder,
    ) -> Result<Self, ChannelError> {
        let backend = SmtpBackend::new(settings.clone())?;
        Self::with_backend(Arc::new(backend), settings, csv, filenames)
    }

    /// Factory sending through any [`EmailBackend`].
    pub fn with_backend(
        backend: Arc<dyn EmailBackend>,
        settings: &EmailSettings,
        csv: CsvExportSettings,
        filenames: FilenameBuilder,
    ) -> Result<Self, ChannelError> {
        let from = settings.from_address.parse::<Mailbox>().map_err(|e| {
            ChannelError::Configuration(format!(
                "invalid from address '{}': {e}",
                settings.from_address
            ))
        })?;
        Ok(Self {
            backend,
            from,
            subject_prefix: settings.subject_prefix.clone(),
            csv,
            filenames,
        })
    }
}

impl ChannelFactory for EmailFactory {
    fn recipient_type(&self) -> RecipientType {
        RecipientType::Email
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn build(&self, recipient: &Recipient) -> Result<Box<dyn DynChannel>, ChannelError> {
        let parsed = EmailRecipientConfig::from_config(&recipient.config)?;
        let reencoder = CsvReencoder::for_recipient(&self.csv, None)?;
        debug!(recipient = %recipient.id, addresses = parsed.to.len(), "built email channel");
        Ok(Box::new(EmailChannel {
            recipient: recipient.id.clone(),
            from: self.from.clone(),
            to: parsed.to,
            subject_prefix: self.subject_prefix.clone(),
            reencoder,
            filenames: self.filenames.clone(),
            backend: Arc::clone(&self.backend),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use herald_core::{FailureKind, RecipientConfig};

    use super::*;
    use crate::backend::EmailResult;

    /// Backend that records messages instead of sending them.
    #[derive(Debug, Default)]
    struct RecordingBackend {
        sent: Mutex<Vec<EmailMessage>>,
        fail_with_rate_limit: bool,
    }

    impl RecordingBackend {
        fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailBackend for RecordingBackend {
        async fn send(&self, message: &EmailMessage) -> Result<EmailResult, ChannelError> {
            if self.fail_with_rate_limit {
                return Err(ChannelError::RateLimited);
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(EmailResult {
                message_id: Some("id-1".to_owned()),
                status: "sent".to_owned(),
            })
        }

        fn backend_name(&self) -> &'static str {
            "recording"
        }
    }

    fn factory(backend: Arc<RecordingBackend>) -> EmailFactory {
        let settings = EmailSettings::new("smtp.example.com", "Reports <reports@example.com>");
        EmailFactory::with_backend(
            backend,
            &settings,
            CsvExportSettings::default(),
            FilenameBuilder::new(),
        )
        .unwrap()
    }

    fn recipient(target: &str) -> Recipient {
        Recipient::new(
            "finance-mail",
            RecipientType::Email,
            RecipientConfig::new().with("target", target),
        )
    }

    #[tokio::test]
    async fn sends_one_message_to_all_addresses() {
        let backend = Arc::new(RecordingBackend::default());
        let channel = factory(Arc::clone(&backend))
            .build(&recipient("a@example.com; b@example.com"))
            .unwrap();
        let content = NotificationContent::new("Daily")
            .with_csv(b"x;y\n1;2\n".to_vec())
            .with_description("Daily totals");

        let receipt = channel.send(&content).await.unwrap();

        assert_eq!(receipt.artifacts, ["a@example.com", "b@example.com"]);
        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "[Report] Daily");
        assert_eq!(sent[0].to.len(), 2);
        assert_eq!(sent[0].from.email.to_string(), "reports@example.com");
        assert_eq!(sent[0].attachments[0].filename, "Daily.csv");
        assert_eq!(sent[0].body, "Daily totals");
        assert!(sent[0].html_body.is_some());
    }

    #[test]
    fn missing_target_fails_at_build() {
        let backend = Arc::new(RecordingBackend::default());
        let err = factory(backend)
            .build(&Recipient::new(
                "nobody",
                RecipientType::Email,
                RecipientConfig::new(),
            ))
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::MissingKeys(ref k) if k == &["target"]));
    }

    #[test]
    fn invalid_from_address_is_rejected() {
        let settings = EmailSettings::new("smtp.example.com", "not an address");
        let err = EmailFactory::with_backend(
            Arc::new(RecordingBackend::default()),
            &settings,
            CsvExportSettings::default(),
            FilenameBuilder::new(),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), FailureKind::Configuration);
    }

    #[tokio::test]
    async fn empty_content_is_never_sent() {
        let backend = Arc::new(RecordingBackend::default());
        let channel = factory(Arc::clone(&backend))
            .build(&recipient("a@example.com"))
            .unwrap();

        let err = channel.send(&NotificationContent::new("Empty")).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Encoding);
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn backend_errors_pass_through() {
        let backend = Arc::new(RecordingBackend {
            fail_with_rate_limit: true,
            ..RecordingBackend::default()
        });
        let channel = factory(backend).build(&recipient("a@example.com")).unwrap();

        let err = channel
            .send(&NotificationContent::new("Daily").with_text("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::RateLimited));
        assert!(err.is_retryable());
    }
}
