use herald_channel::ChannelError;
use reqwest::StatusCode;
use thiserror::Error;

/// API error codes meaning the token is not accepted.
const AUTH_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
    "missing_scope",
];

/// API error codes meaning the recipient points at an unusable channel.
const CHANNEL_ERRORS: &[&str] = &[
    "channel_not_found",
    "not_in_channel",
    "is_archived",
    "invalid_channel",
];

/// Errors specific to the Slack channel.
///
/// These are internal errors that get converted into [`ChannelError`] at the
/// crate boundary.
#[derive(Debug, Error)]
pub enum SlackError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP request to {method} failed")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{method} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        status: StatusCode,
        body: String,
    },

    /// The Slack API returned an error response (`ok: false`).
    #[error("{method} failed: {code}")]
    Api { method: &'static str, code: String },

    /// A successful response lacked a field the upload flow needs.
    #[error("{method} response has no '{field}'")]
    MissingField {
        method: &'static str,
        field: &'static str,
    },

    /// HTTP 429 (Too Many Requests).
    #[error("rate limited by Slack")]
    RateLimited,
}

impl SlackError {
    fn class(&self) -> Class {
        match self {
            Self::RateLimited => Class::RateLimited,
            Self::Http { source, .. } if source.is_connect() || source.is_timeout() => {
                Class::Connection
            }
            Self::Http { .. } | Self::MissingField { .. } => Class::Transfer,
            Self::Status { status, .. } => {
                if matches!(*status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                    Class::Authentication
                } else if status.is_client_error() {
                    Class::Configuration
                } else {
                    Class::Transfer
                }
            }
            Self::Api { code, .. } => {
                if code == "ratelimited" {
                    Class::RateLimited
                } else if AUTH_ERRORS.contains(&code.as_str()) {
                    Class::Authentication
                } else if CHANNEL_ERRORS.contains(&code.as_str()) {
                    Class::Configuration
                } else {
                    Class::Transfer
                }
            }
        }
    }
}

enum Class {
    RateLimited,
    Connection,
    Authentication,
    Configuration,
    Transfer,
}

impl From<SlackError> for ChannelError {
    fn from(err: SlackError) -> Self {
        match err.class() {
            Class::RateLimited => ChannelError::RateLimited,
            Class::Connection => ChannelError::connection("slack", err),
            Class::Authentication => ChannelError::authentication("slack", err),
            Class::Configuration => ChannelError::Configuration(err.to_string()),
            Class::Transfer => ChannelError::transfer("slack", err),
        }
    }
}
