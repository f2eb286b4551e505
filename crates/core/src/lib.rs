//! Core types shared by the Herald report delivery crates: the content being
//! delivered, the recipients it goes to and the outcome of each delivery.

pub mod content;
pub mod outcome;
pub mod recipient;
pub mod table;
pub mod types;

pub use content::{ContentError, NotificationContent, PayloadKind, PrimaryPayload};
pub use outcome::{DeliveryFailure, DeliveryOutcome, DeliveryReceipt, FailureKind};
pub use recipient::{Recipient, RecipientConfig, RecipientError, RecipientRecord, RecipientType};
pub use table::EmbeddedTable;
pub use types::RecipientId;
