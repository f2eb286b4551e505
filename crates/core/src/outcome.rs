use serde::{Deserialize, Serialize};

use crate::recipient::RecipientType;
use crate::types::RecipientId;

/// Result of one dispatch, handed back to the scheduler as a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The channel accepted every payload.
    Delivered(DeliveryReceipt),
    /// Delivery failed; see the failure for classification.
    Failed(DeliveryFailure),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    /// Whether the scheduler may retry the whole dispatch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed(failure) if failure.retryable)
    }

    pub fn recipient(&self) -> &RecipientId {
        match self {
            Self::Delivered(receipt) => &receipt.recipient,
            Self::Failed(failure) => &failure.recipient,
        }
    }

    pub fn failure(&self) -> Option<&DeliveryFailure> {
        match self {
            Self::Delivered(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// Proof of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub recipient: RecipientId,
    pub channel: RecipientType,
    /// Remote paths or message identifiers produced by the channel.
    pub artifacts: Vec<String>,
}

/// Classified delivery failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub recipient: RecipientId,
    /// `None` when the recipient's type could not be determined.
    pub channel: Option<RecipientType>,
    pub kind: FailureKind,
    /// Human-readable message including the underlying cause.
    pub message: String,
    pub retryable: bool,
}

/// Failure taxonomy reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing or invalid recipient configuration, or no channel for the
    /// recipient type. Permanent.
    Configuration,
    /// Content could not be decoded or re-encoded. Permanent.
    Encoding,
    /// Connection, authentication or transfer failure. Possibly transient.
    Transport,
}

impl FailureKind {
    /// Short upper-case code for logs and dashboards.
    pub fn code(self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION",
            Self::Encoding => "ENCODING",
            Self::Transport => "TRANSPORT",
        }
    }
}
