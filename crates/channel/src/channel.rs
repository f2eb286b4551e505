use async_trait::async_trait;
use herald_core::{NotificationContent, RecipientType};

use crate::error::ChannelError;

/// What a channel reports after a successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Remote paths written, or message identifiers returned by the service.
    pub artifacts: Vec<String>,
}

impl SendReceipt {
    pub fn new(artifacts: Vec<String>) -> Self {
        Self { artifacts }
    }
}

/// Strongly-typed delivery channel with native `async fn`.
///
/// A channel is bound to exactly one recipient; the recipient's settings are
/// validated when the channel is built, so `send` only sees content.
///
/// This trait is **not** object-safe. Every `Channel` automatically
/// implements [`DynChannel`], which the dispatcher uses behind a `Box`.
pub trait Channel: Send + Sync {
    /// The recipient type this channel delivers to.
    fn recipient_type(&self) -> RecipientType;

    /// Deliver the content once. Implementations must not retry.
    fn send(
        &self,
        content: &NotificationContent,
    ) -> impl std::future::Future<Output = Result<SendReceipt, ChannelError>> + Send;
}

/// Object-safe channel trait for use behind `Box<dyn DynChannel>`.
///
/// Implement [`Channel`] instead and rely on the blanket implementation.
#[async_trait]
pub trait DynChannel: Send + Sync {
    fn recipient_type(&self) -> RecipientType;

    async fn send(&self, content: &NotificationContent) -> Result<SendReceipt, ChannelError>;
}

#[async_trait]
impl<T: Channel + Sync> DynChannel for T {
    fn recipient_type(&self) -> RecipientType {
        Channel::recipient_type(self)
    }

    async fn send(&self, content: &NotificationContent) -> Result<SendReceipt, ChannelError> {
        Channel::send(self, content).await
    }
}
