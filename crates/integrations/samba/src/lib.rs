//! SMB/CIFS delivery channel.
//!
//! Files are written into `folder` on the share named by `route`, on the
//! host given by `target`. The libsmbclient transport is behind the
//! `smbclient` feature; without it Samba recipients fail with a
//! configuration error.

pub mod channel;
pub mod config;
pub mod connector;
pub mod error;

pub use channel::{SambaChannel, SambaFactory};
pub use config::{DEFAULT_SMB_PORT, SambaRecipientConfig, SambaSettings, SambaTarget};
pub use connector::{SmbConnector, SmbSession};
pub use error::SambaError;
