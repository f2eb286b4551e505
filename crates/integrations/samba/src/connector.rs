use herald_channel::{ChannelError, Connector, RemoteFile, TransferSession};

use crate::config::{SambaSettings, SambaTarget};
#[cfg(not(feature = "smbclient"))]
use crate::error::SambaError;

/// Opens SMB sessions through libsmbclient.
///
/// Without the `smbclient` feature every connect fails with a configuration
/// error, so Samba recipients are reported instead of silently skipped.
#[derive(Debug, Clone)]
pub struct SmbConnector {
    #[cfg_attr(not(feature = "smbclient"), allow(dead_code))]
    workgroup: String,
}

impl SmbConnector {
    pub fn new(settings: &SambaSettings) -> Self {
        Self {
            workgroup: settings.workgroup.clone(),
        }
    }
}

#[cfg(feature = "smbclient")]
mod imp {
    use std::io::Write;

    use pavao::{SmbClient, SmbCredentials, SmbOpenOptions, SmbOptions};
    use secrecy::ExposeSecret;
    use tracing::debug;

    use super::{ChannelError, Connector, RemoteFile, SambaTarget, SmbConnector, TransferSession};
    use crate::error::SambaError;

    /// An SMB client bound to one share.
    pub struct SmbSession {
        client: SmbClient,
        share: String,
    }

    impl Connector for SmbConnector {
        type Target = SambaTarget;
        type Session = SmbSession;

        fn connect(&self, target: &SambaTarget) -> Result<SmbSession, ChannelError> {
            let url = format!("smb://{}:{}", target.host, target.port);
            let share = format!("/{}", target.share);
            let workgroup = target.domain.as_deref().unwrap_or(self.workgroup.as_str());
            let credentials = SmbCredentials::default()
                .server(url.as_str())
                .share(share.as_str())
                .username(target.username.as_str())
                .password(target.password.expose_secret().as_str())
                .workgroup(workgroup);
            let client = SmbClient::new(credentials, SmbOptions::default().one_share_per_server(true))
                .map_err(|source| SambaError::Client {
                    url: url.clone(),
                    source: Box::new(source),
                })?;
            debug!(%url, share = %target.share, server = %target.server, "smb client ready");
            Ok(SmbSession {
                client,
                share: target.share.clone(),
            })
        }
    }

    impl TransferSession for SmbSession {
        fn upload(&mut self, file: &RemoteFile) -> Result<(), ChannelError> {
            let path = format!("/{}", file.path.trim_start_matches('/'));
            let options = SmbOpenOptions::default().create(true).write(true).truncate(true);
            let mut remote = self
                .client
                .open_with(path.as_str(), options)
                .map_err(|source| SambaError::Open {
                    share: self.share.clone(),
                    path: path.clone(),
                    source: Box::new(source),
                })?;
            remote
                .write_all(&file.contents)
                .map_err(|source| SambaError::Write { path, source })?;
            Ok(())
        }

        fn close(self) -> Result<(), ChannelError> {
            drop(self.client);
            Ok(())
        }
    }
}

#[cfg(not(feature = "smbclient"))]
mod imp {
    use std::convert::Infallible;

    use super::{
        ChannelError, Connector, RemoteFile, SambaError, SambaTarget, SmbConnector,
        TransferSession,
    };

    /// Placeholder session; cannot be constructed without `smbclient`.
    pub struct SmbSession {
        never: Infallible,
    }

    impl Connector for SmbConnector {
        type Target = SambaTarget;
        type Session = SmbSession;

        fn connect(&self, _target: &SambaTarget) -> Result<SmbSession, ChannelError> {
            Err(SambaError::Unsupported.into())
        }

        fn unavailable_reason(&self) -> Option<String> {
            Some(SambaError::Unsupported.to_string())
        }
    }

    impl TransferSession for SmbSession {
        fn upload(&mut self, _file: &RemoteFile) -> Result<(), ChannelError> {
            match self.never {}
        }

        fn close(self) -> Result<(), ChannelError> {
            match self.never {}
        }
    }
}

pub use imp::SmbSession;
