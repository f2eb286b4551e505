use std::time::Duration;

use herald_channel::{ChannelError, ConfigReader, split_targets};
use herald_core::RecipientConfig;
use serde::{Deserialize, Serialize};

/// Recipient keys the chat channel requires.
pub const REQUIRED_KEYS: &[&str] = &["target"];

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// Process-wide Slack settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackSettings {
    /// Bot OAuth token used to authenticate API requests.
    pub token: String,

    /// Base URL for the Slack Web API. Override this for testing against a
    /// mock server.
    pub api_base_url: String,

    /// Per-request timeout.
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for SlackSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackSettings")
            .field("token", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            timeout_seconds: 30,
        }
    }
}

impl SlackSettings {
    /// Create settings with the given token.
    ///
    /// Uses the default Slack API base URL (`https://slack.com/api`).
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Override the API base URL (useful for testing).
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

/// Validated settings of one chat recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackRecipientConfig {
    /// Channel names or IDs, in the order given.
    pub channels: Vec<String>,
}

impl SlackRecipientConfig {
    pub fn from_config(config: &RecipientConfig) -> Result<Self, ChannelError> {
        let mut reader = ConfigReader::new(config);
        let target = reader.required("target");
        reader.finish()?;

        let channels = split_targets(&target);
        if channels.is_empty() {
            return Err(ChannelError::MissingKeys(vec!["target".to_owned()]));
        }
        Ok(Self { channels })
    }
}
