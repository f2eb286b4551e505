use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use herald_channel::{ChannelError, ChannelRegistry, NotificationError, SendReceipt, error_chain};
use herald_core::{
    DeliveryFailure, DeliveryOutcome, DeliveryReceipt, NotificationContent, Recipient,
    RecipientError, RecipientId, RecipientRecord, RecipientType,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Default number of recipients delivered at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Delivers content to recipients through the registered channels.
///
/// Every failure becomes a [`DeliveryOutcome::Failed`] value; dispatch never
/// returns an error and never retries.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use herald_channel::ChannelRegistry;
/// use herald_core::{NotificationContent, Recipient, RecipientConfig, RecipientType, FailureKind};
/// use herald_dispatcher::NotificationDispatcher;
///
/// let dispatcher = NotificationDispatcher::new(Arc::new(ChannelRegistry::new()));
/// let recipient = Recipient::new("ops", RecipientType::Email, RecipientConfig::new());
/// let content = NotificationContent::new("Daily").with_text("hi");
///
/// let outcome = futures::executor::block_on(dispatcher.dispatch(&recipient, &content));
/// assert_eq!(outcome.failure().unwrap().kind, FailureKind::Configuration);
/// ```
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Arc<ChannelRegistry>,
    max_concurrent: usize,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self {
            registry,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Limit how many recipients [`dispatch_all`](Self::dispatch_all)
    /// delivers at once. Zero is treated as one.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Deliver content to one recipient.
    ///
    /// Validates the content, builds the recipient's channel and sends
    /// exactly once.
    #[instrument(
        skip_all,
        fields(
            recipient = %recipient.id,
            channel = %recipient.recipient_type,
            content = %content.name,
        )
    )]
    pub async fn dispatch(
        &self,
        recipient: &Recipient,
        content: &NotificationContent,
    ) -> DeliveryOutcome {
        match self.try_dispatch(recipient, content).await {
            Ok(receipt) => {
                info!(artifacts = receipt.artifacts.len(), "delivered");
                DeliveryOutcome::Delivered(DeliveryReceipt {
                    recipient: recipient.id.clone(),
                    channel: recipient.recipient_type,
                    artifacts: receipt.artifacts,
                })
            }
            Err(err) => failed_outcome(&NotificationError::new(
                recipient.id.clone(),
                Some(recipient.recipient_type),
                err,
            )),
        }
    }

    async fn try_dispatch(
        &self,
        recipient: &Recipient,
        content: &NotificationContent,
    ) -> Result<SendReceipt, ChannelError> {
        content.validate()?;
        let channel = self.registry.resolve(recipient)?;
        channel.send(content).await
    }

    /// Parse a persisted recipient record, then dispatch.
    ///
    /// A record that cannot be parsed is reported as a configuration
    /// failure for that recipient only.
    pub async fn dispatch_record(
        &self,
        record: &RecipientRecord,
        content: &NotificationContent,
    ) -> DeliveryOutcome {
        match record.parse() {
            Ok(recipient) => self.dispatch(&recipient, content).await,
            Err(err) => failed_outcome(&record_error(record, err)),
        }
    }

    /// Deliver content to every recipient.
    ///
    /// Recipients are independent: one failure never affects another.
    /// Deliveries run concurrently; outcomes come back in input order.
    pub async fn dispatch_all(
        &self,
        recipients: &[Recipient],
        content: &NotificationContent,
    ) -> RunSummary {
        let outcomes: Vec<DeliveryOutcome> = stream::iter(recipients)
            .map(|recipient| self.dispatch(recipient, content))
            .buffered(self.max_concurrent)
            .collect()
            .await;
        RunSummary::from_outcomes(outcomes)
    }

    /// [`dispatch_all`](Self::dispatch_all) for persisted records.
    pub async fn dispatch_records(
        &self,
        records: &[RecipientRecord],
        content: &NotificationContent,
    ) -> RunSummary {
        let outcomes: Vec<DeliveryOutcome> = stream::iter(records)
            .map(|record| self.dispatch_record(record, content))
            .buffered(self.max_concurrent)
            .collect()
            .await;
        RunSummary::from_outcomes(outcomes)
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("channels", &self.registry.list())
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

/// Turn an error into a failed outcome, logging it once.
///
/// Exposed for callers that wrap dispatches with their own limits, such as a
/// timeout.
pub fn failed_outcome(error: &NotificationError) -> DeliveryOutcome {
    let kind = error.kind();
    let message = error_chain(&error.source);
    warn!(
        recipient = %error.recipient,
        channel = error.channel.map_or("unknown", RecipientType::as_str),
        kind = kind.code(),
        retryable = error.is_retryable(),
        error = %message,
        "delivery failed"
    );
    DeliveryOutcome::Failed(DeliveryFailure {
        recipient: error.recipient.clone(),
        channel: error.channel,
        kind,
        message,
        retryable: error.is_retryable(),
    })
}

/// The channel is known when only the configuration blob is bad.
fn record_error(record: &RecipientRecord, err: RecipientError) -> NotificationError {
    let channel = record.type_tag.parse::<RecipientType>().ok();
    NotificationError::new(RecipientId::from(record.id.as_str()), channel, err.into())
}

/// Outcomes of one report run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub delivered: usize,
    pub failed: usize,
    /// Failures the scheduler may retry.
    pub retryable_failures: usize,
    /// One outcome per recipient, in input order.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: Vec<DeliveryOutcome>) -> Self {
        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        let retryable_failures = outcomes.iter().filter(|o| o.is_retryable()).count();
        Self {
            delivered,
            failed: outcomes.len() - delivered,
            retryable_failures,
            outcomes,
        }
    }

    pub fn all_delivered(&self) -> bool {
        self.failed == 0
    }
}
