use herald_core::RecipientConfig;
use secrecy::SecretString;

use crate::error::ChannelError;

/// Reads typed settings out of a [`RecipientConfig`], collecting every
/// missing or malformed key so a recipient is rejected with one complete
/// error instead of one key at a time.
///
/// ```
/// use herald_channel::ConfigReader;
/// use herald_core::RecipientConfig;
///
/// let config = RecipientConfig::new().with("target", "files.example.com");
/// let mut reader = ConfigReader::new(&config);
/// let target = reader.required("target");
/// let _route = reader.required("route");
/// let err = reader.finish().unwrap_err();
/// assert_eq!(target, "files.example.com");
/// assert_eq!(err.to_string(), "missing required configuration keys: route");
/// ```
#[derive(Debug)]
pub struct ConfigReader<'a> {
    config: &'a RecipientConfig,
    missing: Vec<String>,
    invalid: Vec<String>,
}

impl<'a> ConfigReader<'a> {
    pub fn new(config: &'a RecipientConfig) -> Self {
        Self {
            config,
            missing: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// A non-blank value. Records the key as missing otherwise and returns
    /// an empty string that must not be used once `finish` fails.
    pub fn required(&mut self, key: &str) -> String {
        if let Some(value) = self.config.non_blank(key) {
            value.to_owned()
        } else {
            self.missing.push(key.to_owned());
            String::new()
        }
    }

    /// Like [`required`](Self::required), wrapped so it never shows up in logs.
    pub fn required_secret(&mut self, key: &str) -> SecretString {
        SecretString::new(self.required(key))
    }

    pub fn optional(&self, key: &str) -> Option<String> {
        self.config.non_blank(key).map(str::to_owned)
    }

    /// A boolean flag. Absent or blank means `false`.
    pub fn flag(&mut self, key: &str) -> bool {
        let config = self.config;
        match config.non_blank(key) {
            None => false,
            Some(value) => parse_flag(value).unwrap_or_else(|| {
                self.invalid
                    .push(format!("'{key}' must be a boolean, got '{value}'"));
                false
            }),
        }
    }

    /// A TCP port. Falls back to `default` when the key is absent; with no
    /// default the key is required.
    pub fn port(&mut self, key: &str, default: Option<u16>) -> u16 {
        let config = self.config;
        match (config.non_blank(key), default) {
            (Some(value), _) => match value.trim().parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => {
                    self.invalid
                        .push(format!("'{key}' must be a port number, got '{value}'"));
                    0
                }
            },
            (None, Some(port)) => port,
            (None, None) => {
                self.missing.push(key.to_owned());
                0
            }
        }
    }

    /// Fail with every missing key, or with every malformed value.
    pub fn finish(self) -> Result<(), ChannelError> {
        if !self.missing.is_empty() {
            return Err(ChannelError::MissingKeys(self.missing));
        }
        if !self.invalid.is_empty() {
            return Err(ChannelError::Configuration(self.invalid.join("; ")));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a recipient list on `,` or `;`, trimming entries and dropping
/// empty ones.
pub fn split_targets(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Append `/` to a remote directory unless it already ends with one.
pub fn ensure_trailing_slash(directory: &str) -> String {
    if directory.ends_with('/') {
        directory.to_owned()
    } else {
        format!("{directory}/")
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> RecipientConfig {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn collects_all_missing_keys() {
        let cfg = config(&[("username", "svc"), ("route", "  ")]);
        let mut reader = ConfigReader::new(&cfg);
        reader.required("username");
        reader.required("route");
        reader.required("target");
        let err = reader.finish().unwrap_err();
        assert!(
            matches!(err, ChannelError::MissingKeys(ref keys) if keys == &["route", "target"])
        );
    }

    #[test]
    fn secrets_are_read() {
        let cfg = config(&[("password", "hunter2")]);
        let mut reader = ConfigReader::new(&cfg);
        let secret = reader.required_secret("password");
        reader.finish().unwrap();
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn port_with_and_without_default() {
        let cfg = config(&[("port", "2222")]);
        let mut reader = ConfigReader::new(&cfg);
        assert_eq!(reader.port("port", None), 2222);
        reader.finish().unwrap();

        let empty = RecipientConfig::new();
        let mut reader = ConfigReader::new(&empty);
        assert_eq!(reader.port("port", Some(139)), 139);
        reader.finish().unwrap();

        let mut reader = ConfigReader::new(&empty);
        reader.port("port", None);
        assert!(matches!(reader.finish(), Err(ChannelError::MissingKeys(_))));
    }

    #[test]
    fn malformed_port_is_configuration_error() {
        let cfg = config(&[("port", "ssh")]);
        let mut reader = ConfigReader::new(&cfg);
        reader.port("port", None);
        let err = reader.finish().unwrap_err();
        assert!(matches!(err, ChannelError::Configuration(ref m) if m.contains("'port'")));
    }

    #[test]
    fn missing_keys_win_over_invalid_values() {
        let cfg = config(&[("port", "0")]);
        let mut reader = ConfigReader::new(&cfg);
        reader.port("port", None);
        reader.required("target");
        assert!(matches!(reader.finish(), Err(ChannelError::MissingKeys(_))));
    }

    #[test]
    fn flags() {
        let cfg = config(&[("timestamp", "True"), ("other", "0"), ("bad", "maybe")]);
        let mut reader = ConfigReader::new(&cfg);
        assert!(reader.flag("timestamp"));
        assert!(!reader.flag("other"));
        assert!(!reader.flag("absent"));
        reader.flag("bad");
        assert!(matches!(reader.finish(), Err(ChannelError::Configuration(_))));
    }

    #[test]
    fn optional_skips_blank() {
        let cfg = config(&[("divider", ""), ("domain", "CORP")]);
        let reader = ConfigReader::new(&cfg);
        assert_eq!(reader.optional("divider"), None);
        assert_eq!(reader.optional("domain").as_deref(), Some("CORP"));
    }

    #[test]
    fn splits_targets_on_both_separators() {
        assert_eq!(
            split_targets("a@example.com, b@example.com;c@example.com;;"),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
        assert!(split_targets(" ; ").is_empty());
    }

    #[test]
    fn trailing_slash() {
        assert_eq!(ensure_trailing_slash("/upload"), "/upload/");
        assert_eq!(ensure_trailing_slash("/upload/"), "/upload/");
    }
}
