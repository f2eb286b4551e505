use std::error::Error as StdError;
use std::fmt::Write as _;
use std::time::Duration;

use herald_core::{ContentError, FailureKind, RecipientError, RecipientId, RecipientType};
use thiserror::Error;

/// Boxed underlying cause carried by transport errors.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur while resolving, configuring or running a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// No channel is registered for the recipient's type tag.
    #[error("no channel registered for recipient type '{0}'")]
    UnknownChannelType(String),

    /// Required configuration keys are absent or blank.
    #[error("missing required configuration keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    /// Configuration is present but unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Content bytes could not be decoded or re-encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The content has nothing this channel can deliver.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// The remote host could not be reached.
    #[error("connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The remote host rejected the credentials.
    #[error("authentication rejected: {context}")]
    Authentication {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The session was established but writing or sending failed.
    #[error("transfer failed: {context}")]
    Transfer {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The remote service asked us to slow down.
    #[error("rate limited")]
    RateLimited,

    /// The remote side did not respond within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl ChannelError {
    pub fn connection(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn authentication(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Authentication {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn transfer(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transfer {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    /// Transfer failure with no underlying error value, e.g. a remote API
    /// that answered with an error code.
    pub fn transfer_msg(context: impl Into<String>) -> Self {
        Self::Transfer {
            context: context.into(),
            source: None,
        }
    }

    /// Classify the error for callers.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnknownChannelType(_) | Self::MissingKeys(_) | Self::Configuration(_) => {
                FailureKind::Configuration
            }
            Self::Encoding(_) | Self::InvalidContent(_) => FailureKind::Encoding,
            Self::Connection { .. }
            | Self::Authentication { .. }
            | Self::Transfer { .. }
            | Self::RateLimited
            | Self::Timeout(_) => FailureKind::Transport,
        }
    }

    /// Returns `true` if the error is transient and the dispatch may succeed
    /// on retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Transport
    }
}

impl From<RecipientError> for ChannelError {
    fn from(err: RecipientError) -> Self {
        match err {
            RecipientError::UnknownType(tag) => Self::UnknownChannelType(tag),
            RecipientError::InvalidConfig(msg) => Self::Configuration(msg),
        }
    }
}

impl From<ContentError> for ChannelError {
    fn from(err: ContentError) -> Self {
        Self::InvalidContent(err.to_string())
    }
}

/// A channel error tagged with the recipient it happened for.
#[derive(Debug, Error)]
#[error("delivery to '{recipient}' via {} failed", channel_label(.channel))]
pub struct NotificationError {
    pub recipient: RecipientId,
    pub channel: Option<RecipientType>,
    #[source]
    pub source: ChannelError,
}

impl NotificationError {
    pub fn new(
        recipient: RecipientId,
        channel: Option<RecipientType>,
        source: ChannelError,
    ) -> Self {
        Self {
            recipient,
            channel,
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.source.kind()
    }

    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

fn channel_label(channel: &Option<RecipientType>) -> &'static str {
    channel.map_or("unknown channel", RecipientType::as_str)
}

/// Render an error followed by each of its causes, separated by `": "`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, ": {cause}");
        source = cause.source();
    }
    out
}
