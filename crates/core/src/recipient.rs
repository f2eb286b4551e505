use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::RecipientId;

/// Errors raised while turning stored recipient data into a [`Recipient`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecipientError {
    /// The type tag does not name any known channel.
    #[error("unknown recipient type '{0}'")]
    UnknownType(String),

    /// The configuration blob is not a flat JSON object.
    #[error("invalid recipient configuration: {0}")]
    InvalidConfig(String),
}

/// The delivery channel a recipient asks for.
///
/// This is a closed set: every variant must be handled wherever channels are
/// registered, so adding one is a compile-time decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecipientType {
    /// SMTP email.
    Email,
    /// Slack chat message.
    Slack,
    /// SMB/CIFS file share.
    Samba,
    /// SFTP upload over SSH.
    Sftp,
}

impl RecipientType {
    /// Every recipient type, in declaration order.
    pub const ALL: [RecipientType; 4] = [Self::Email, Self::Slack, Self::Samba, Self::Sftp];

    /// Canonical tag as stored alongside recipient records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Slack => "Slack",
            Self::Samba => "Samba",
            Self::Sftp => "Sftp",
        }
    }
}

impl fmt::Display for RecipientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipientType {
    type Err = RecipientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "slack" | "chat" => Ok(Self::Slack),
            "samba" | "smb" => Ok(Self::Samba),
            "sftp" => Ok(Self::Sftp),
            _ => Err(RecipientError::UnknownType(s.to_owned())),
        }
    }
}

impl TryFrom<String> for RecipientType {
    type Error = RecipientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecipientType> for String {
    fn from(value: RecipientType) -> Self {
        value.as_str().to_owned()
    }
}

/// Flat key/value configuration of one recipient.
///
/// Stored recipient blobs are JSON objects whose values may be strings,
/// numbers or booleans; all of them are kept as strings here. `null` values
/// are treated as absent keys.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "BTreeMap<String, String>")]
pub struct RecipientConfig(BTreeMap<String, String>);

impl RecipientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored JSON configuration blob.
    ///
    /// ```
    /// use herald_core::RecipientConfig;
    ///
    /// let config = RecipientConfig::from_json(r#"{"target": "10.0.0.5", "port": 22}"#).unwrap();
    /// assert_eq!(config.get("port"), Some("22"));
    /// ```
    pub fn from_json(json: &str) -> Result<Self, RecipientError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| RecipientError::InvalidConfig(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Build from an already-parsed JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, RecipientError> {
        match value {
            Value::Object(map) => Self::try_from(map),
            Value::Null => Ok(Self::new()),
            other => Err(RecipientError::InvalidConfig(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Set a key, returning the updated configuration.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Return the value of `key` unless it is absent or blank.
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Map<String, Value>> for RecipientConfig {
    type Error = RecipientError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(RecipientError::InvalidConfig(format!(
                        "key '{key}' holds {}, expected a scalar",
                        json_type_name(&other)
                    )));
                }
            };
            entries.insert(key, value);
        }
        Ok(Self(entries))
    }
}

impl From<RecipientConfig> for BTreeMap<String, String> {
    fn from(value: RecipientConfig) -> Self {
        value.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RecipientConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for RecipientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if is_secret_key(key) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ["password", "secret", "token"]
        .iter()
        .any(|needle| key.contains(needle))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One configured destination for report output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Identity used in logs and outcomes.
    pub id: RecipientId,
    /// Channel the recipient is delivered through.
    #[serde(rename = "type")]
    pub recipient_type: RecipientType,
    /// Channel-specific settings.
    #[serde(default)]
    pub config: RecipientConfig,
}

impl Recipient {
    pub fn new(
        id: impl Into<RecipientId>,
        recipient_type: RecipientType,
        config: RecipientConfig,
    ) -> Self {
        Self {
            id: id.into(),
            recipient_type,
            config,
        }
    }
}

/// A recipient as persisted by the report store: an untyped tag and a
/// configuration that is either a JSON object or JSON text.
///
/// Parsing is deferred so that one malformed record can be reported as a
/// failed delivery instead of aborting a whole report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default, alias = "recipient_config_json")]
    pub config: Value,
}

impl RecipientRecord {
    pub fn new(id: impl Into<String>, type_tag: impl Into<String>, config: Value) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            config,
        }
    }

    /// Validate the tag and configuration, producing a typed [`Recipient`].
    pub fn parse(&self) -> Result<Recipient, RecipientError> {
        let recipient_type: RecipientType = self.type_tag.parse()?;
        let config = match &self.config {
            Value::String(text) => RecipientConfig::from_json(text)?,
            other => RecipientConfig::from_value(other.clone())?,
        };
        Ok(Recipient::new(self.id.as_str(), recipient_type, config))
    }
}
