use std::time::Duration;

use herald_channel::{ChannelError, ConfigReader, ensure_trailing_slash};
use herald_core::RecipientConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Recipient keys the SFTP channel requires.
pub const REQUIRED_KEYS: &[&str] = &["username", "password", "target", "port", "route"];

/// Recipient keys the SFTP channel understands but does not require.
pub const OPTIONAL_KEYS: &[&str] = &["timestamp", "divider"];

/// Process-wide SFTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SftpSettings {
    /// Budget for the TCP connect and for each blocking SSH call.
    pub connect_timeout_seconds: u64,
}

impl Default for SftpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 30,
        }
    }
}

impl SftpSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds.max(1))
    }
}

/// Where and as whom to upload.
#[derive(Clone)]
pub struct SftpTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Remote directory, always ending with `/`.
    pub directory: String,
}

impl std::fmt::Debug for SftpTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("directory", &self.directory)
            .finish()
    }
}

/// Validated settings of one SFTP recipient.
#[derive(Debug, Clone)]
pub struct SftpRecipientConfig {
    pub target: SftpTarget,
    pub timestamp: bool,
    pub divider: Option<String>,
}

impl SftpRecipientConfig {
    /// Read and validate the recipient keys, reporting every missing key at
    /// once.
    pub fn from_config(config: &RecipientConfig) -> Result<Self, ChannelError> {
        let mut reader = ConfigReader::new(config);
        let username = reader.required("username");
        let password = reader.required_secret("password");
        let host = reader.required("target");
        let port = reader.port("port", None);
        let route = reader.required("route");
        let timestamp = reader.flag("timestamp");
        let divider = reader.optional("divider");
        reader.finish()?;

        Ok(Self {
            target: SftpTarget {
                host,
                port,
                username,
                password,
                directory: ensure_trailing_slash(&route),
            },
            timestamp,
            divider,
        })
    }
}
