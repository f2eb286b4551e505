use std::error::Error as StdError;
use std::io;

use herald_channel::{BoxError, ChannelError};
use thiserror::Error;

/// Errors specific to the Samba channel.
#[derive(Debug, Error)]
pub enum SambaError {
    /// The crate was built without the `smbclient` feature.
    #[error("SMB transport is not compiled in; rebuild herald-samba with the `smbclient` feature")]
    Unsupported,

    #[error("cannot open SMB client for {url}")]
    Client {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot open {path} on share {share}")]
    Open {
        share: String,
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot write {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl From<SambaError> for ChannelError {
    fn from(err: SambaError) -> Self {
        let denied = matches!(
            &err,
            SambaError::Open { source, .. } if is_access_denied(source.as_ref())
        );
        match err {
            SambaError::Unsupported => ChannelError::Configuration(err.to_string()),
            SambaError::Client { .. } => ChannelError::connection("smb", err),
            SambaError::Open { .. } if denied => ChannelError::authentication("smb", err),
            SambaError::Open { .. } | SambaError::Write { .. } => ChannelError::transfer("smb", err),
        }
    }
}

/// Whether any error in the chain says the server refused access.
fn is_access_denied(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::PermissionDenied {
                return true;
            }
        }
        let message = cause.to_string().to_ascii_lowercase();
        if message.contains("permission denied") || message.contains("access denied") {
            return true;
        }
        current = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use herald_core::FailureKind;

    use super::*;

    #[test]
    fn unsupported_is_configuration() {
        let err: ChannelError = SambaError::Unsupported.into();
        assert_eq!(err.kind(), FailureKind::Configuration);
        assert!(!err.is_retryable());
    }

    #[test]
    fn client_failure_is_connection() {
        let err: ChannelError = SambaError::Client {
            url: "smb://10.0.0.5:139".into(),
            source: "connection refused".into(),
        }
        .into();
        assert!(matches!(err, ChannelError::Connection { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn denied_open_is_authentication() {
        let err: ChannelError = SambaError::Open {
            share: "finance".into(),
            path: "/reports/Daily.csv".into(),
            source: Box::new(io::Error::from(io::ErrorKind::PermissionDenied)),
        }
        .into();
        assert!(matches!(err, ChannelError::Authentication { .. }));
    }

    #[test]
    fn other_open_failures_are_transfer() {
        let err: ChannelError = SambaError::Open {
            share: "finance".into(),
            path: "/missing/Daily.csv".into(),
            source: Box::new(io::Error::from(io::ErrorKind::NotFound)),
        }
        .into();
        assert!(matches!(err, ChannelError::Transfer { .. }));
        assert!(herald_channel::error_chain(&err).contains("/missing/Daily.csv"));
    }
}
