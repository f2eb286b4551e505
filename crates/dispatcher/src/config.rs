use std::path::{Path, PathBuf};
use std::time::Duration;

use herald_channel::{CsvExportSettings, DEFAULT_TIMESTAMP_FORMAT, FilenameBuilder};
use herald_email::EmailSettings;
use herald_samba::SambaSettings;
use herald_sftp::SftpSettings;
use herald_slack::SlackSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or applying the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A section parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level Herald configuration, loaded from a TOML file.
///
/// Every section is optional; an empty file yields the defaults.
///
/// # Examples
///
/// ```
/// use herald_dispatcher::HeraldConfig;
///
/// let config = HeraldConfig::from_toml_str(
///     r#"
///     [csv_export]
///     delimiter = ","
///
///     [slack]
///     token = "xoxb-example"
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.csv_export.delimiter, ",");
/// assert_eq!(config.dispatch.timeout_seconds, 300);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    /// How the rendering stage writes CSV exports.
    #[serde(default)]
    pub csv_export: CsvExportSettings,
    /// File naming.
    #[serde(default)]
    pub filenames: FilenameConfig,
    /// Dispatch limits applied by the caller.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub sftp: SftpSettings,
    #[serde(default)]
    pub samba: SambaSettings,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub slack: SlackSettings,
}

/// File naming configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameConfig {
    /// `strftime` format of the timestamp appended to file names.
    pub timestamp_format: String,
}

impl Default for FilenameConfig {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_owned(),
        }
    }
}

/// Limits for one report run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Budget for a single recipient's dispatch.
    pub timeout_seconds: u64,
    /// Maximum number of recipients delivered at the same time.
    pub max_concurrent: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
            max_concurrent: 8,
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl HeraldConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// File name builder using the configured timestamp format.
    pub fn filename_builder(&self) -> Result<FilenameBuilder, ConfigError> {
        FilenameBuilder::new()
            .with_timestamp_format(&self.filenames.timestamp_format)
            .map_err(|e| ConfigError::Invalid(format!("[filenames] {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = HeraldConfig::from_toml_str("").unwrap();
        assert_eq!(config.csv_export, CsvExportSettings::default());
        assert_eq!(config.filenames.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
        assert_eq!(config.dispatch.timeout(), Duration::from_secs(300));
        assert_eq!(config.dispatch.max_concurrent, 8);
        assert_eq!(config.sftp.connect_timeout_seconds, 30);
        assert_eq!(config.samba.workgroup, "WORKGROUP");
        assert_eq!(config.email.smtp_port, 587);
        assert!(!config.slack.has_token());
    }

    #[test]
    fn full_file() {
        let toml = r#"
            [csv_export]
            encoding = "latin1"
            delimiter = "Tab"
            escape_formulas = false

            [filenames]
            timestamp_format = "%Y%m%d"

            [dispatch]
            timeout_seconds = 60
            max_concurrent = 2

            [sftp]
            connect_timeout_seconds = 5

            [samba]
            workgroup = "CORP"

            [email]
            smtp_host = "mail.example.com"
            smtp_port = 2525
            tls = false
            from_address = "reports@example.com"
            subject_prefix = ""

            [slack]
            token = "xoxb-1"
            api_base_url = "http://localhost:9000/api"
        "#;
        let config = HeraldConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.csv_export.encoding, "latin1");
        assert!(!config.csv_export.escape_formulas);
        assert_eq!(config.dispatch.max_concurrent, 2);
        assert_eq!(config.sftp.connect_timeout_seconds, 5);
        assert_eq!(config.samba.workgroup, "CORP");
        assert_eq!(config.email.smtp_host, "mail.example.com");
        assert!(!config.email.tls);
        assert_eq!(config.email.subject_for("Daily"), "Daily");
        assert_eq!(config.slack.api_base_url, "http://localhost:9000/api");
        assert!(config.filename_builder().is_ok());
    }

    #[test]
    fn invalid_timestamp_format_is_rejected() {
        let config = HeraldConfig::from_toml_str("[filenames]\ntimestamp_format = \"%Y/%m\"")
            .unwrap();
        let err = config.filename_builder().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.starts_with("[filenames]")));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = HeraldConfig::load_or_default("/nonexistent/herald.toml").unwrap();
        assert_eq!(config.dispatch.timeout_seconds, 300);

        let err = HeraldConfig::load("/nonexistent/herald.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = std::env::temp_dir().join(format!("herald-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[dispatch]\ntimeout_seconds = \"soon\"").unwrap();
        let err = HeraldConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
