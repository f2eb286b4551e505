//! Channel abstraction for Herald: the [`Channel`] trait and its
//! object-safe [`DynChannel`] twin, the [`ChannelRegistry`] of factories,
//! and the helpers shared by the file-transfer channels (CSV re-encoding,
//! file naming, upload planning).

pub mod channel;
pub mod config;
pub mod error;
pub mod filename;
pub mod memory;
pub mod reencode;
pub mod registry;
pub mod transfer;

pub use channel::{Channel, DynChannel, SendReceipt};
pub use config::{ConfigReader, ensure_trailing_slash, split_targets};
pub use error::{BoxError, ChannelError, NotificationError, error_chain};
pub use filename::{
    Clock, DEFAULT_TIMESTAMP_FORMAT, FORBIDDEN_FILENAME_CHARS, FilenameBuilder, FixedClock,
    LocalClock, sanitize_filename,
};
pub use memory::{MemoryConnector, MemorySession};
pub use reencode::{CsvExportSettings, CsvReencoder, TAB_DELIMITER};
pub use registry::{ChannelFactory, ChannelRegistry};
pub use transfer::{
    Connector, RemoteFile, TransferSession, UploadPlan, deliver, plan_uploads, transfer,
};
