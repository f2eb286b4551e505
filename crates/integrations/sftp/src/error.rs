use std::io;
use std::time::Duration;

use herald_channel::ChannelError;
use ssh2::ErrorCode;
use thiserror::Error;

/// libssh2 `LIBSSH2_ERROR_TIMEOUT`.
const SESSION_TIMEOUT: i32 = -9;
/// libssh2 `LIBSSH2_ERROR_AUTHENTICATION_FAILED`.
const SESSION_AUTH_FAILED: i32 = -18;
/// SFTP status `SSH_FX_PERMISSION_DENIED`.
const SFTP_PERMISSION_DENIED: i32 = 3;

/// Errors specific to the SFTP channel.
///
/// Converted into [`ChannelError`] at the crate boundary; the underlying
/// transport error stays reachable through `source()`.
#[derive(Debug, Error)]
pub enum SftpError {
    #[error("cannot resolve {host}:{port}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("cannot connect to {address}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("SSH handshake with {address} failed")]
    Handshake {
        address: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("login as '{username}' rejected")]
    Auth {
        username: String,
        #[source]
        source: Option<ssh2::Error>,
    },

    #[error("cannot create remote file {path}")]
    Create {
        path: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("cannot write remote file {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot finish remote file {path}")]
    Close {
        path: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("SSH session error")]
    Session(#[source] ssh2::Error),

    #[error("SSH call timed out")]
    Timeout(Duration),
}

impl From<SftpError> for ChannelError {
    fn from(err: SftpError) -> Self {
        match err {
            SftpError::Timeout(after) => ChannelError::Timeout(after),
            SftpError::Resolve { .. } | SftpError::Connect { .. } | SftpError::Handshake { .. } => {
                ChannelError::connection("sftp", err)
            }
            SftpError::Auth { .. } => ChannelError::authentication("sftp", err),
            SftpError::Create { .. }
            | SftpError::Write { .. }
            | SftpError::Close { .. }
            | SftpError::Session(_) => ChannelError::transfer("sftp", err),
        }
    }
}

/// Turn a libssh2 error raised while creating a file into the most specific
/// variant.
pub(crate) fn classify_create(path: &str, source: ssh2::Error, timeout: Duration) -> SftpError {
    match source.code() {
        ErrorCode::Session(SESSION_TIMEOUT) => SftpError::Timeout(timeout),
        _ => SftpError::Create {
            path: path.to_owned(),
            source,
        },
    }
}

/// Turn a libssh2 error raised during login into the most specific variant.
pub(crate) fn classify_login(username: &str, source: ssh2::Error, timeout: Duration) -> SftpError {
    match source.code() {
        ErrorCode::Session(SESSION_TIMEOUT) => SftpError::Timeout(timeout),
        ErrorCode::Session(SESSION_AUTH_FAILED) | ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => {
            SftpError::Auth {
                username: username.to_owned(),
                source: Some(source),
            }
        }
        _ => SftpError::Session(source),
    }
}

#[cfg(test)]
mod tests {
    use herald_core::FailureKind;

    use super::*;

    #[test]
    fn connect_maps_to_connection() {
        let err: ChannelError = SftpError::Connect {
            address: "sftp.example.com:22".into(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        }
        .into();
        assert!(matches!(err, ChannelError::Connection { .. }));
        assert!(err.is_retryable());
        assert_eq!(
            herald_channel::error_chain(&err),
            "connection failed: sftp: cannot connect to sftp.example.com:22: refused"
        );
    }

    #[test]
    fn login_rejection_maps_to_authentication() {
        let err: ChannelError = SftpError::Auth {
            username: "svc".into(),
            source: None,
        }
        .into();
        assert!(matches!(err, ChannelError::Authentication { .. }));
        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[test]
    fn libssh2_codes_are_classified() {
        let timeout = Duration::from_secs(5);
        let auth = ssh2::Error::new(ErrorCode::Session(SESSION_AUTH_FAILED), "denied");
        assert!(matches!(
            classify_login("svc", auth, timeout),
            SftpError::Auth { .. }
        ));

        let slow = ssh2::Error::new(ErrorCode::Session(SESSION_TIMEOUT), "timed out");
        assert!(matches!(
            classify_create("/upload/a.csv", slow, timeout),
            SftpError::Timeout(_)
        ));

        let missing = ssh2::Error::new(ErrorCode::SFTP(2), "no such file");
        assert!(matches!(
            classify_create("/nope/a.csv", missing, timeout),
            SftpError::Create { .. }
        ));
    }

    #[test]
    fn write_failure_maps_to_transfer() {
        let err: ChannelError = SftpError::Write {
            path: "/upload/a.csv".into(),
            source: io::Error::other("broken pipe"),
        }
        .into();
        assert!(matches!(err, ChannelError::Transfer { .. }));
        assert!(herald_channel::error_chain(&err).contains("/upload/a.csv"));
    }

    #[test]
    fn rejected_close_maps_to_transfer() {
        let err: ChannelError = SftpError::Close {
            path: "/upload/a.csv".into(),
            source: ssh2::Error::new(ErrorCode::SFTP(4), "failure"),
        }
        .into();
        assert!(matches!(err, ChannelError::Transfer { .. }));
        assert!(err.is_retryable());
        let chain = herald_channel::error_chain(&err);
        assert!(chain.starts_with("transfer failed: sftp: cannot finish remote file /upload/a.csv"));
        assert!(chain.contains("failure"));
    }
}
