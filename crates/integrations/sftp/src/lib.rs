//! SFTP delivery channel.
//!
//! Each dispatch opens one SSH session with password authentication, writes
//! every planned file into the recipient's `route` directory and
//! disconnects. libssh2 calls are blocking and run on tokio's blocking pool.

pub mod channel;
pub mod config;
pub mod connector;
pub mod error;

pub use channel::{SftpChannel, SftpFactory};
pub use config::{SftpRecipientConfig, SftpSettings, SftpTarget};
pub use connector::{Ssh2Connector, Ssh2Session};
pub use error::SftpError;
