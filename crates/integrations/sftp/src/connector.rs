use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use herald_channel::{ChannelError, Connector, RemoteFile, TransferSession};
use secrecy::ExposeSecret;
use ssh2::{Session, Sftp};
use tracing::debug;

use crate::config::{SftpSettings, SftpTarget};
use crate::error::{SftpError, classify_create, classify_login};

/// Opens SFTP sessions with libssh2 using password authentication.
#[derive(Debug, Clone)]
pub struct Ssh2Connector {
    timeout: Duration,
}

impl Ssh2Connector {
    pub fn new(settings: &SftpSettings) -> Self {
        Self {
            timeout: settings.connect_timeout(),
        }
    }

    fn resolve(target: &SftpTarget) -> Result<SocketAddr, SftpError> {
        let resolve_error = |source: io::Error| SftpError::Resolve {
            host: target.host.clone(),
            port: target.port,
            source,
        };
        (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(&resolve_error)?
            .next()
            .ok_or_else(|| resolve_error(io::Error::new(io::ErrorKind::NotFound, "no address")))
    }

    fn open(&self, target: &SftpTarget) -> Result<Ssh2Session, SftpError> {
        let address = format!("{}:{}", target.host, target.port);
        let socket = Self::resolve(target)?;
        let tcp = TcpStream::connect_timeout(&socket, self.timeout).map_err(|source| {
            SftpError::Connect {
                address: address.clone(),
                source,
            }
        })?;

        let mut session = Session::new().map_err(SftpError::Session)?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(|source| SftpError::Handshake {
                address: address.clone(),
                source,
            })?;

        session
            .userauth_password(&target.username, target.password.expose_secret())
            .map_err(|source| classify_login(&target.username, source, self.timeout))?;
        if !session.authenticated() {
            return Err(SftpError::Auth {
                username: target.username.clone(),
                source: None,
            });
        }

        let sftp = session.sftp().map_err(SftpError::Session)?;
        debug!(%address, username = %target.username, "sftp session established");
        Ok(Ssh2Session {
            session,
            sftp,
            timeout: self.timeout,
        })
    }
}

impl Connector for Ssh2Connector {
    type Target = SftpTarget;
    type Session = Ssh2Session;

    fn connect(&self, target: &SftpTarget) -> Result<Ssh2Session, ChannelError> {
        Ok(self.open(target)?)
    }
}

/// An authenticated SSH session with its SFTP subsystem open.
pub struct Ssh2Session {
    session: Session,
    sftp: Sftp,
    timeout: Duration,
}

impl TransferSession for Ssh2Session {
    fn upload(&mut self, file: &RemoteFile) -> Result<(), ChannelError> {
        let mut remote = self
            .sftp
            .create(Path::new(&file.path))
            .map_err(|source| classify_create(&file.path, source, self.timeout))?;
        remote
            .write_all(&file.contents)
            .map_err(|source| SftpError::Write {
                path: file.path.clone(),
                source,
            })?;
        // The server reports a failed write only in the status of the close.
        remote.close().map_err(|source| SftpError::Close {
            path: file.path.clone(),
            source,
        })?;
        Ok(())
    }

    fn close(self) -> Result<(), ChannelError> {
        drop(self.sftp);
        self.session
            .disconnect(None, "delivery finished", None)
            .map_err(SftpError::Session)?;
        Ok(())
    }
}
