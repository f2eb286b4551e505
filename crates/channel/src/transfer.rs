use std::sync::Arc;

use herald_core::{NotificationContent, PrimaryPayload};
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::filename::FilenameBuilder;
use crate::reencode::CsvReencoder;

/// A file ready to be written to a remote destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Remote path: directory (with trailing `/`) followed by the file name.
    pub path: String,
    pub contents: Vec<u8>,
}

/// Naming and encoding inputs shared by the file-transfer channels.
#[derive(Debug, Clone, Copy)]
pub struct UploadPlan<'a> {
    /// Remote directory, already normalized to end with `/`.
    pub directory: &'a str,
    pub timestamp: bool,
    pub reencoder: &'a CsvReencoder,
    pub filenames: &'a FilenameBuilder,
}

/// Work out every file to upload for the content.
///
/// Runs before any connection is opened, so encoding failures never cause
/// network I/O. CSV bytes are re-encoded; screenshots pass through
/// unchanged, numbered `" (1)"`, `" (2)"`, ... when there are several; the
/// embedded table or plain text becomes one text file.
pub fn plan_uploads(
    content: &NotificationContent,
    plan: &UploadPlan<'_>,
) -> Result<Vec<RemoteFile>, ChannelError> {
    let payload = content.require_payload()?;
    let extension = payload.kind().extension();
    let remote_path = |base: &str| {
        let name = plan.filenames.build(base, extension, plan.timestamp);
        format!("{}{name}", plan.directory)
    };

    let files = match payload {
        PrimaryPayload::Csv(raw) => vec![RemoteFile {
            path: remote_path(&content.name),
            contents: plan.reencoder.reencode(raw)?,
        }],
        PrimaryPayload::Screenshots(images) => {
            let numbered = images.len() > 1;
            images
                .iter()
                .enumerate()
                .map(|(i, image)| {
                    let base = if numbered {
                        format!("{} ({})", content.name, i + 1)
                    } else {
                        content.name.clone()
                    };
                    RemoteFile {
                        path: remote_path(&base),
                        contents: image.clone(),
                    }
                })
                .collect()
        }
        PrimaryPayload::Table(table) => vec![RemoteFile {
            path: remote_path(&content.name),
            contents: table.to_text().into_bytes(),
        }],
        PrimaryPayload::Text(text) => vec![RemoteFile {
            path: remote_path(&content.name),
            contents: text.as_bytes().to_vec(),
        }],
    };
    Ok(files)
}

/// An open, authenticated session to a file server.
pub trait TransferSession {
    /// Write one file, creating or replacing it.
    fn upload(&mut self, file: &RemoteFile) -> Result<(), ChannelError>;

    /// Close the session.
    fn close(self) -> Result<(), ChannelError>;
}

/// Opens [`TransferSession`]s. Implementations are blocking and are driven
/// from [`transfer`] on the blocking thread pool.
pub trait Connector: Send + Sync + 'static {
    /// Connection settings for one recipient.
    type Target: Send + Sync + 'static;
    type Session: TransferSession;

    fn connect(&self, target: &Self::Target) -> Result<Self::Session, ChannelError>;

    /// Why every [`connect`](Self::connect) is bound to fail in this build,
    /// if that is the case.
    fn unavailable_reason(&self) -> Option<String> {
        None
    }
}

/// Upload every file in order, stopping at the first failure.
///
/// The session is closed on every path; a close error after a failed upload
/// is logged and the upload error is returned.
pub fn deliver<S: TransferSession>(
    mut session: S,
    files: &[RemoteFile],
) -> Result<Vec<String>, ChannelError> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        if let Err(err) = session.upload(file) {
            if let Err(close_err) = session.close() {
                warn!(error = %close_err, "failed to close session after upload error");
            }
            return Err(err);
        }
        debug!(path = %file.path, bytes = file.contents.len(), "uploaded file");
        written.push(file.path.clone());
    }
    session.close()?;
    Ok(written)
}

/// Connect and deliver on the blocking pool.
pub async fn transfer<C: Connector>(
    connector: Arc<C>,
    target: Arc<C::Target>,
    files: Vec<RemoteFile>,
) -> Result<Vec<String>, ChannelError> {
    tokio::task::spawn_blocking(move || {
        let session = connector.connect(&target)?;
        deliver(session, &files)
    })
    .await
    .map_err(|e| ChannelError::transfer("transfer task did not complete", e))?
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use herald_core::EmbeddedTable;

    use super::*;
    use crate::filename::FixedClock;
    use crate::memory::MemoryConnector;

    fn filenames() -> FilenameBuilder {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        FilenameBuilder::new().with_clock(Arc::new(FixedClock(at)))
    }

    fn plan_for(
        content: &NotificationContent,
        timestamp: bool,
    ) -> Result<Vec<RemoteFile>, ChannelError> {
        let reencoder = CsvReencoder::new("utf-8", "utf-8", ";", ",").unwrap();
        let names = filenames();
        plan_uploads(
            content,
            &UploadPlan {
                directory: "/upload/",
                timestamp,
                reencoder: &reencoder,
                filenames: &names,
            },
        )
    }

    #[test]
    fn csv_is_reencoded() {
        let content = NotificationContent::new("Daily").with_csv(b"a;b\n1;2\n".to_vec());
        let files = plan_for(&content, false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "/upload/Daily.csv");
        assert_eq!(files[0].contents, b"a,b\n1,2\n".to_vec());
    }

    #[test]
    fn screenshots_are_numbered_when_several() {
        let content = NotificationContent::new("Dash")
            .with_screenshots(vec![vec![1, 2], vec![3, 4]]);
        let files = plan_for(&content, true).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/upload/Dash (1) 2024-01-02 03:04:05.png",
                "/upload/Dash (2) 2024-01-02 03:04:05.png",
            ]
        );
        assert_eq!(files[1].contents, vec![3, 4]);
    }

    #[test]
    fn single_screenshot_is_not_numbered() {
        let content = NotificationContent::new("Dash").with_screenshots(vec![vec![0x89, b'P']]);
        let files = plan_for(&content, false).unwrap();
        assert_eq!(files[0].path, "/upload/Dash.png");
        assert_eq!(files[0].contents, vec![0x89, b'P']);
    }

    #[test]
    fn table_beats_text() {
        let table = EmbeddedTable::new(vec!["a".into()], vec![vec!["1".into()]]);
        let content = NotificationContent::new("Alert")
            .with_text("threshold crossed")
            .with_embedded_data(table.clone());
        let files = plan_for(&content, false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "/upload/Alert.txt");
        assert_eq!(files[0].contents, table.to_text().into_bytes());
    }

    #[test]
    fn text_only_becomes_text_file() {
        let content = NotificationContent::new("Alert").with_text("threshold crossed");
        let files = plan_for(&content, false).unwrap();
        assert_eq!(files[0].contents, b"threshold crossed".to_vec());
    }

    #[test]
    fn empty_content_is_rejected() {
        let err = plan_for(&NotificationContent::new("Nothing"), false).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidContent(_)));
    }

    #[test]
    fn bad_csv_fails_before_upload() {
        let content = NotificationContent::new("Daily").with_csv(vec![0xFF, 0xFE]);
        let err = plan_for(&content, false).unwrap_err();
        assert!(matches!(err, ChannelError::Encoding(_)));
    }

    #[tokio::test]
    async fn transfer_writes_and_closes() {
        let connector = Arc::new(MemoryConnector::<()>::new());
        let files = vec![
            RemoteFile {
                path: "/a.png".into(),
                contents: vec![1],
            },
            RemoteFile {
                path: "/b.png".into(),
                contents: vec![2],
            },
        ];
        let written = transfer(connector.clone(), Arc::new(()), files)
            .await
            .unwrap();
        assert_eq!(written, vec!["/a.png".to_owned(), "/b.png".to_owned()]);
        assert_eq!(connector.files().len(), 2);
        assert_eq!(connector.connections(), 1);
        assert_eq!(connector.closed_sessions(), 1);
    }

    #[tokio::test]
    async fn upload_failure_still_closes_session() {
        let connector = Arc::new(MemoryConnector::<()>::new().failing_uploads());
        let files = vec![RemoteFile {
            path: "/a.png".into(),
            contents: vec![1],
        }];
        let err = transfer(connector.clone(), Arc::new(()), files)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Transfer { .. }));
        assert!(connector.files().is_empty());
        assert_eq!(connector.closed_sessions(), 1);
    }

    #[tokio::test]
    async fn connect_failure_opens_no_session() {
        let connector = Arc::new(MemoryConnector::<()>::new().with_connect_hook(|_| {
            Err(ChannelError::Connection {
                context: "unreachable".into(),
                source: None,
            })
        }));
        let err = transfer(connector.clone(), Arc::new(()), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Connection { .. }));
        assert_eq!(connector.closed_sessions(), 0);
    }
}
