use herald_channel::{ChannelError, ConfigReader};
use herald_core::RecipientConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// NetBIOS session service port.
pub const DEFAULT_SMB_PORT: u16 = 139;

/// Recipient keys the Samba channel requires.
pub const REQUIRED_KEYS: &[&str] = &["username", "password", "server", "folder", "route", "target"];

/// Recipient keys the Samba channel understands but does not require.
pub const OPTIONAL_KEYS: &[&str] = &["timestamp", "divider", "port", "domain"];

/// Process-wide SMB settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SambaSettings {
    /// Workgroup used when a recipient has no `domain`.
    pub workgroup: String,
}

impl Default for SambaSettings {
    fn default() -> Self {
        Self {
            workgroup: "WORKGROUP".to_owned(),
        }
    }
}

/// Share location and credentials of one recipient.
#[derive(Clone)]
pub struct SambaTarget {
    /// Host name or address to connect to (`target`).
    pub host: String,
    pub port: u16,
    /// NetBIOS name of the file server (`server`).
    pub server: String,
    /// Share name without slashes (`route`).
    pub share: String,
    /// Directory inside the share, without a leading `/` and ending with `/`
    /// unless it is the share root (`folder`).
    pub folder: String,
    pub username: String,
    pub password: SecretString,
    pub domain: Option<String>,
}

impl SambaTarget {
    /// UNC-style location of a file written into the share.
    pub fn unc_path(&self, path: &str) -> String {
        format!("//{}/{}/{}", self.server, self.share, path)
    }
}

impl std::fmt::Debug for SambaTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SambaTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("server", &self.server)
            .field("share", &self.share)
            .field("folder", &self.folder)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Validated settings of one Samba recipient.
#[derive(Debug, Clone)]
pub struct SambaRecipientConfig {
    pub target: SambaTarget,
    pub timestamp: bool,
    pub divider: Option<String>,
}

impl SambaRecipientConfig {
    pub fn from_config(config: &RecipientConfig) -> Result<Self, ChannelError> {
        let mut reader = ConfigReader::new(config);
        let username = reader.required("username");
        let password = reader.required_secret("password");
        let server = reader.required("server");
        let folder = reader.required("folder");
        let route = reader.required("route");
        let host = reader.required("target");
        let port = reader.port("port", Some(DEFAULT_SMB_PORT));
        let timestamp = reader.flag("timestamp");
        let divider = reader.optional("divider");
        let domain = reader.optional("domain");
        reader.finish()?;

        let share = route.trim_matches('/').to_owned();
        if share.is_empty() || share.contains('/') {
            return Err(ChannelError::Configuration(format!(
                "'route' must name a single share, got '{route}'"
            )));
        }

        Ok(Self {
            target: SambaTarget {
                host,
                port,
                server,
                share,
                folder: normalize_folder(&folder),
                username,
                password,
                domain,
            },
            timestamp,
            divider,
        })
    }
}

fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}
