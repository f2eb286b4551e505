use herald_channel::{ChannelError, ConfigReader, split_targets};
use herald_core::RecipientConfig;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

/// Recipient keys the email channel requires.
pub const REQUIRED_KEYS: &[&str] = &["target"];

pub const DEFAULT_SUBJECT_PREFIX: &str = "[Report] ";

/// Process-wide SMTP settings.
///
/// # Examples
///
/// ```
/// use herald_email::EmailSettings;
///
/// let settings = EmailSettings::new("smtp.example.com", "reports@example.com")
///     .with_credentials("mailer", "secret");
/// assert_eq!(settings.smtp_port, 587);
/// assert!(settings.tls);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// SMTP server hostname.
    pub smtp_host: String,

    /// SMTP server port. Defaults to 587 (STARTTLS submission port).
    pub smtp_port: u16,

    /// Optional SMTP username for authentication.
    pub username: Option<String>,

    /// Optional SMTP password for authentication.
    pub password: Option<String>,

    /// Whether to use STARTTLS. Defaults to `true`.
    pub tls: bool,

    /// The `From` address used in outgoing emails.
    pub from_address: String,

    /// Prepended to the report name to form the subject.
    pub subject_prefix: String,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tls", &self.tls)
            .field("from_address", &self.from_address)
            .field("subject_prefix", &self.subject_prefix)
            .finish()
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_owned(),
            smtp_port: 587,
            username: None,
            password: None,
            tls: true,
            from_address: "herald@localhost".to_owned(),
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_owned(),
        }
    }
}

impl EmailSettings {
    pub fn new(smtp_host: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            smtp_host: smtp_host.into(),
            from_address: from_address.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.smtp_port = port;
        self
    }

    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    /// Subject line for a report.
    pub fn subject_for(&self, name: &str) -> String {
        format!("{}{name}", self.subject_prefix)
    }
}

/// Validated settings of one email recipient.
#[derive(Debug, Clone)]
pub struct EmailRecipientConfig {
    pub to: Vec<Mailbox>,
}

impl EmailRecipientConfig {
    /// Split `target` on `,` or `;` and parse every address.
    pub fn from_config(config: &RecipientConfig) -> Result<Self, ChannelError> {
        let mut reader = ConfigReader::new(config);
        let target = reader.required("target");
        reader.finish()?;

        let addresses = split_targets(&target);
        if addresses.is_empty() {
            return Err(ChannelError::MissingKeys(vec!["target".to_owned()]));
        }
        let to = addresses
            .iter()
            .map(|address| {
                address.parse::<Mailbox>().map_err(|e| {
                    ChannelError::Configuration(format!("invalid email address '{address}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_have_sensible_values() {
        let settings = EmailSettings::default();
        assert_eq!(settings.smtp_port, 587);
        assert!(settings.tls);
        assert_eq!(settings.subject_for("Daily"), "[Report] Daily");
    }

    #[test]
    fn builders() {
        let settings = EmailSettings::new("smtp.example.com", "reports@example.com")
            .with_port(2525)
            .with_tls(false)
            .with_subject_prefix("");
        assert_eq!(settings.smtp_port, 2525);
        assert!(!settings.tls);
        assert_eq!(settings.subject_for("Daily"), "Daily");
    }

    #[test]
    fn partial_settings_use_defaults() {
        let settings: EmailSettings =
            serde_json::from_str(r#"{"smtp_host":"mail.internal"}"#).unwrap();
        assert_eq!(settings.smtp_host, "mail.internal");
        assert_eq!(settings.smtp_port, 587);
        assert_eq!(settings.subject_prefix, DEFAULT_SUBJECT_PREFIX);
    }

    #[test]
    fn debug_redacts_password() {
        let settings = EmailSettings::default().with_credentials("mailer", "hunter2");
        let debug = format!("{settings:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn splits_recipients() {
        let config = RecipientConfig::new()
            .with("target", "a@example.com; b@example.com,c@example.com");
        let parsed = EmailRecipientConfig::from_config(&config).unwrap();
        assert_eq!(parsed.to.len(), 3);
        assert_eq!(parsed.to[1].email.to_string(), "b@example.com");
    }

    #[test]
    fn missing_or_empty_target() {
        let err = EmailRecipientConfig::from_config(&RecipientConfig::new()).unwrap_err();
        assert!(matches!(err, ChannelError::MissingKeys(_)));

        let config = RecipientConfig::new().with("target", " ; ,");
        let err = EmailRecipientConfig::from_config(&config).unwrap_err();
        assert!(matches!(err, ChannelError::MissingKeys(_)));
    }

    #[test]
    fn invalid_address_is_configuration_error() {
        let config = RecipientConfig::new().with("target", "ok@example.com, not-an-email");
        let err = EmailRecipientConfig::from_config(&config).unwrap_err();
        assert!(matches!(err, ChannelError::Configuration(ref m) if m.contains("not-an-email")));
    }
}
