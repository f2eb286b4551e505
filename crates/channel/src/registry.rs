use std::collections::BTreeMap;
use std::sync::Arc;

use herald_core::{Recipient, RecipientType};

use crate::channel::DynChannel;
use crate::error::ChannelError;

/// Builds a channel for one recipient of a given type.
///
/// Factories hold the process-wide settings for their channel (SMTP relay,
/// chat token, CSV export settings) and combine them with the recipient's
/// own keys in [`build`](Self::build).
pub trait ChannelFactory: Send + Sync {
    /// The recipient type this factory serves.
    fn recipient_type(&self) -> RecipientType;

    /// Recipient keys that must be present and non-blank.
    fn required_keys(&self) -> &'static [&'static str];

    /// Recipient keys that are understood but may be omitted.
    fn optional_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Validate the recipient's settings and construct a channel for it.
    ///
    /// Must not perform network I/O.
    fn build(&self, recipient: &Recipient) -> Result<Box<dyn DynChannel>, ChannelError>;

    /// Set when channels from this factory cannot deliver in this build.
    fn unavailable_reason(&self) -> Option<String> {
        None
    }
}

/// Maps recipient types to the factories that build their channels.
///
/// Built once at startup and shared read-only afterwards.
pub struct ChannelRegistry {
    factories: BTreeMap<RecipientType, Arc<dyn ChannelFactory>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory under its own recipient type, replacing any
    /// previous factory for that type.
    pub fn register(&mut self, factory: Arc<dyn ChannelFactory>) {
        self.factories.insert(factory.recipient_type(), factory);
    }

    /// Look up the factory for a recipient type.
    pub fn get(&self, recipient_type: RecipientType) -> Option<Arc<dyn ChannelFactory>> {
        self.factories.get(&recipient_type).cloned()
    }

    pub fn contains(&self, recipient_type: RecipientType) -> bool {
        self.factories.contains_key(&recipient_type)
    }

    /// Build the channel for a recipient.
    pub fn resolve(&self, recipient: &Recipient) -> Result<Box<dyn DynChannel>, ChannelError> {
        let factory = self
            .factories
            .get(&recipient.recipient_type)
            .ok_or_else(|| {
                ChannelError::UnknownChannelType(recipient.recipient_type.as_str().to_owned())
            })?;
        factory.build(recipient)
    }

    /// Registered recipient types in a stable order.
    pub fn list(&self) -> Vec<RecipientType> {
        self.factories.keys().copied().collect()
    }

    pub fn factories(&self) -> impl Iterator<Item = &Arc<dyn ChannelFactory>> {
        self.factories.values()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
