//! Herald notification dispatcher.
//!
//! [`NotificationDispatcher`] takes rendered report content and a recipient,
//! builds the recipient's channel from the [`ChannelRegistry`] and reports a
//! classified [`DeliveryOutcome`]. [`HeraldConfig`] holds the process-wide
//! settings and [`standard_registry`] wires every built-in channel from it.
//!
//! [`ChannelRegistry`]: herald_channel::ChannelRegistry
//! [`DeliveryOutcome`]: herald_core::DeliveryOutcome

pub mod config;
pub mod dispatcher;
pub mod registry;

pub use config::{ConfigError, DispatchConfig, FilenameConfig, HeraldConfig};
pub use dispatcher::{DEFAULT_MAX_CONCURRENT, NotificationDispatcher, RunSummary, failed_outcome};
pub use registry::standard_registry;
