use std::fmt::Write as _;
use std::sync::Arc;

use herald_channel::{
    Channel, ChannelError, ChannelFactory, CsvExportSettings, CsvReencoder, DynChannel,
    FilenameBuilder, SendReceipt, UploadPlan, plan_uploads,
};
use herald_core::{NotificationContent, PrimaryPayload, Recipient, RecipientId, RecipientType};
use tracing::{debug, info, instrument};

use crate::client::SlackClient;
use crate::config::{REQUIRED_KEYS, SlackRecipientConfig, SlackSettings};

/// Posts report content to one recipient's Slack channels.
pub struct SlackChannel {
    recipient: RecipientId,
    channels: Vec<String>,
    reencoder: CsvReencoder,
    filenames: FilenameBuilder,
    client: Arc<SlackClient>,
}

impl Channel for SlackChannel {
    fn recipient_type(&self) -> RecipientType {
        RecipientType::Slack
    }

    /// Post the content to every channel in turn.
    ///
    /// File payloads are uploaded once per channel and shared with the
    /// message as their comment; everything else becomes a plain message.
    /// The first failing channel aborts the send.
    #[instrument(
        skip(self, content),
        fields(recipient = %self.recipient, channel = "slack", targets = self.channels.len())
    )]
    async fn send(&self, content: &NotificationContent) -> Result<SendReceipt, ChannelError> {
        let payload = content.require_payload()?;
        let message = format_message(content, payload);
        let files = if payload.is_file_like() {
            plan_uploads(
                content,
                &UploadPlan {
                    directory: "",
                    timestamp: false,
                    reencoder: &self.reencoder,
                    filenames: &self.filenames,
                },
            )?
        } else {
            Vec::new()
        };
        debug!(files = files.len(), "planned slack delivery");

        let mut artifacts = Vec::new();
        for channel in &self.channels {
            if files.is_empty() {
                let posted = self.client.post_message(channel, &message).await?;
                artifacts.push(format!("{}/{}", posted.channel, posted.ts));
                continue;
            }

            let mut uploaded = Vec::with_capacity(files.len());
            for file in &files {
                let id = self
                    .client
                    .upload_file(&file.path, file.contents.clone())
                    .await?;
                uploaded.push((id, file.path.clone()));
            }
            self.client
                .complete_upload(channel, &uploaded, Some(&message))
                .await?;
            artifacts.extend(uploaded.into_iter().map(|(id, _)| format!("{channel}/{id}")));
        }

        info!(artifacts = artifacts.len(), "delivered to slack");
        Ok(SendReceipt::new(artifacts))
    }
}

/// Render the message text in Slack `mrkdwn`.
///
/// Name in bold, then description, link and text; an embedded table is
/// appended as a preformatted block.
pub fn format_message(content: &NotificationContent, payload: PrimaryPayload<'_>) -> String {
    let mut message = format!("*{}*", escape_mrkdwn(&content.name));
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(escape_mrkdwn)
    };
    if let Some(description) = non_blank(&content.description) {
        let _ = write!(message, "\n{description}");
    }
    if let Some(url) = non_blank(&content.url) {
        let _ = write!(message, "\n<{url}|Open report>");
    }
    if let Some(text) = non_blank(&content.text) {
        let _ = write!(message, "\n{text}");
    }
    if let PrimaryPayload::Table(table) = payload {
        let _ = write!(message, "\n```\n{}\n```", escape_mrkdwn(&table.to_text()));
    }
    message
}

/// Escape the three control characters of Slack message formatting.
fn escape_mrkdwn(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Builds [`SlackChannel`]s that share one API client.
pub struct SlackFactory {
    client: Option<Arc<SlackClient>>,
    csv: CsvExportSettings,
    filenames: FilenameBuilder,
}

impl SlackFactory {
    /// Factory for the configured workspace.
    ///
    /// Without a token the factory is still registered, but every recipient
    /// fails to build with a configuration error.
    pub fn new(
        settings: &SlackSettings,
        csv: CsvExportSettings,
        filenames: FilenameBuilder,
    ) -> Result<Self, ChannelError> {
        let client = if settings.has_token() {
            let client = SlackClient::new(settings).map_err(|e| {
                ChannelError::Configuration(format!("cannot build Slack HTTP client: {e}"))
            })?;
            Some(Arc::new(client))
        } else {
            None
        };
        Ok(Self {
            client,
            csv,
            filenames,
        })
    }
}

impl ChannelFactory for SlackFactory {
    fn recipient_type(&self) -> RecipientType {
        RecipientType::Slack
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn build(&self, recipient: &Recipient) -> Result<Box<dyn DynChannel>, ChannelError> {
        let parsed = SlackRecipientConfig::from_config(&recipient.config)?;
        let client = self.client.as_ref().ok_or_else(|| {
            ChannelError::Configuration("no Slack token is configured".to_owned())
        })?;
        let reencoder = CsvReencoder::for_recipient(&self.csv, None)?;
        debug!(recipient = %recipient.id, channels = ?parsed.channels, "built slack channel");
        Ok(Box::new(SlackChannel {
            recipient: recipient.id.clone(),
            channels: parsed.channels,
            reencoder,
            filenames: self.filenames.clone(),
            client: Arc::clone(client),
        }))
    }
}

#[cfg(test)]
mod tests {
    use herald_core::{EmbeddedTable, FailureKind, RecipientConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use super::*;

    /// What the mock server saw for one request.
    #[derive(Debug)]
    struct RecordedRequest {
        request_line: String,
        head: String,
        body: Vec<u8>,
    }

    impl RecordedRequest {
        fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }
    }

    /// A minimal mock HTTP server built on tokio that returns canned
    /// responses, one connection per request.
    struct MockSlackServer {
        listener: TcpListener,
        base_url: String,
    }

    impl MockSlackServer {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            let port = listener.local_addr().unwrap().port();
            let base_url = format!("http://127.0.0.1:{port}");
            Self { listener, base_url }
        }

        /// Answer the next requests with the given status codes and JSON
        /// bodies, in order, then shut down.
        fn respond_with(self, responses: Vec<(u16, String)>) -> JoinHandle<Vec<RecordedRequest>> {
            tokio::spawn(async move {
                let mut recorded = Vec::new();
                for (status_code, body) in responses {
                    let (mut stream, _) = self.listener.accept().await.unwrap();
                    recorded.push(read_request(&mut stream).await);
                    let response = format!(
                        "HTTP/1.1 {status_code} OK\r\n\
                         Content-Type: application/json\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\
                         \r\n\
                         {body}",
                        body.len()
                    );
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.unwrap();
                }
                recorded
            })
        }
    }

    /// Read one request: headers, then exactly `Content-Length` body bytes.
    async fn read_request(stream: &mut TcpStream) -> RecordedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = header_end + 4;
        while buf.len() < body_start + length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed mid-body");
            buf.extend_from_slice(&chunk[..n]);
        }
        RecordedRequest {
            request_line: head.lines().next().unwrap_or_default().to_owned(),
            head,
            body: buf[body_start..body_start + length].to_vec(),
        }
    }

    fn factory(base_url: &str) -> SlackFactory {
        SlackFactory::new(
            &SlackSettings::new("xoxb-test").with_api_base_url(format!("{base_url}/api")),
            CsvExportSettings::default(),
            FilenameBuilder::new(),
        )
        .unwrap()
    }

    fn recipient(target: &str) -> Recipient {
        Recipient::new(
            "ops-chat",
            RecipientType::Slack,
            RecipientConfig::new().with("target", target),
        )
    }

    fn ok(body: &str) -> (u16, String) {
        (200, body.to_owned())
    }

    #[tokio::test]
    async fn posts_message_to_each_channel() {
        let server = MockSlackServer::start().await;
        let channel = factory(&server.base_url)
            .build(&recipient("#alerts; #ops"))
            .unwrap();
        let handle = server.respond_with(vec![
            ok(r#"{"ok":true,"channel":"C1","ts":"111.1"}"#),
            ok(r#"{"ok":true,"channel":"C2","ts":"222.2"}"#),
        ]);
        let content = NotificationContent::new("Disk usage")
            .with_description("Nightly check")
            .with_url("https://bi.example.com/alert/3")
            .with_text("90% used");

        let receipt = channel.send(&content).await.unwrap();
        let requests = handle.await.unwrap();

        assert_eq!(receipt.artifacts, ["C1/111.1", "C2/222.2"]);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].request_line, "POST /api/chat.postMessage HTTP/1.1");
        assert!(requests[0].head.to_ascii_lowercase().contains("authorization: bearer xoxb-test"));
        let first = requests[0].json();
        assert_eq!(first["channel"], "#alerts");
        assert_eq!(
            first["text"],
            "*Disk usage*\nNightly check\n<https://bi.example.com/alert/3|Open report>\n90% used"
        );
        assert_eq!(requests[1].json()["channel"], "#ops");
    }

    #[tokio::test]
    async fn uploads_csv_with_external_flow() {
        let server = MockSlackServer::start().await;
        let base_url = server.base_url.clone();
        let channel = factory(&base_url).build(&recipient("C0123")).unwrap();
        let handle = server.respond_with(vec![
            ok(&format!(
                r#"{{"ok":true,"upload_url":"{base_url}/upload/F1","file_id":"F1"}}"#
            )),
            ok("OK"),
            ok(r#"{"ok":true,"files":[{"id":"F1"}]}"#),
        ]);
        let content = NotificationContent::new("Daily").with_csv(b"a;b\n1;2\n".to_vec());

        let receipt = channel.send(&content).await.unwrap();
        let requests = handle.await.unwrap();

        assert_eq!(receipt.artifacts, ["C0123/F1"]);
        assert_eq!(
            requests[0].request_line,
            "POST /api/files.getUploadURLExternal HTTP/1.1"
        );
        let form = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(form.contains("filename=Daily.csv"));
        assert!(form.contains("length=8"));
        assert_eq!(requests[1].request_line, "POST /upload/F1 HTTP/1.1");
        assert_eq!(requests[1].body, b"a;b\n1;2\n".to_vec());
        let complete = requests[2].json();
        assert_eq!(complete["channel_id"], "C0123");
        assert_eq!(complete["files"][0]["id"], "F1");
        assert_eq!(complete["files"][0]["title"], "Daily.csv");
        assert_eq!(complete["initial_comment"], "*Daily*");
    }

    #[tokio::test]
    async fn table_is_posted_as_code_block() {
        let server = MockSlackServer::start().await;
        let channel = factory(&server.base_url).build(&recipient("#ops")).unwrap();
        let handle = server.respond_with(vec![ok(r#"{"ok":true,"ts":"1.0"}"#)]);
        let table = EmbeddedTable::new(vec!["n".into()], vec![vec!["<5>".into()]]);
        let content = NotificationContent::new("Stats").with_embedded_data(table.clone());

        let receipt = channel.send(&content).await.unwrap();
        let requests = handle.await.unwrap();

        assert_eq!(receipt.artifacts, ["#ops/1.0"]);
        let text = requests[0].json()["text"].as_str().unwrap().to_owned();
        assert_eq!(
            text,
            format!(
                "*Stats*\n```\n{}\n```",
                table.to_text().replace('<', "&lt;").replace('>', "&gt;")
            )
        );
    }

    #[tokio::test]
    async fn rate_limited_is_retryable() {
        let server = MockSlackServer::start().await;
        let channel = factory(&server.base_url).build(&recipient("#ops")).unwrap();
        let handle = server.respond_with(vec![(
            429,
            r#"{"ok":false,"error":"rate_limited"}"#.to_owned(),
        )]);

        let err = channel
            .send(&NotificationContent::new("Ping").with_text("hi"))
            .await
            .unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, ChannelError::RateLimited));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn invalid_auth_is_authentication_failure() {
        let server = MockSlackServer::start().await;
        let channel = factory(&server.base_url).build(&recipient("#ops")).unwrap();
        let handle = server.respond_with(vec![ok(r#"{"ok":false,"error":"invalid_auth"}"#)]);

        let err = channel
            .send(&NotificationContent::new("Ping").with_text("hi"))
            .await
            .unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, ChannelError::Authentication { .. }));
    }

    #[tokio::test]
    async fn unknown_channel_stops_at_first_failure() {
        let server = MockSlackServer::start().await;
        let channel = factory(&server.base_url)
            .build(&recipient("#missing, #ops"))
            .unwrap();
        let handle =
            server.respond_with(vec![ok(r#"{"ok":false,"error":"channel_not_found"}"#)]);

        let err = channel
            .send(&NotificationContent::new("Ping").with_text("hi"))
            .await
            .unwrap_err();
        let requests = handle.await.unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(err.kind(), FailureKind::Configuration);
    }

    #[tokio::test]
    async fn server_error_is_retryable_transfer() {
        let server = MockSlackServer::start().await;
        let channel = factory(&server.base_url).build(&recipient("#ops")).unwrap();
        let handle = server.respond_with(vec![(500, "{}".to_owned())]);

        let err = channel
            .send(&NotificationContent::new("Ping").with_text("hi"))
            .await
            .unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, ChannelError::Transfer { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let channel = factory(&base_url).build(&recipient("#ops")).unwrap();

        let err = channel
            .send(&NotificationContent::new("Ping").with_text("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::Connection { .. }));
    }

    #[tokio::test]
    async fn empty_content_sends_nothing() {
        let channel = factory("http://127.0.0.1:1").build(&recipient("#ops")).unwrap();
        let err = channel.send(&NotificationContent::new("Empty")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Encoding);
    }

    #[test]
    fn missing_token_fails_at_build() {
        let factory = SlackFactory::new(
            &SlackSettings::default(),
            CsvExportSettings::default(),
            FilenameBuilder::new(),
        )
        .unwrap();
        let err = factory.build(&recipient("#ops")).err().unwrap();
        assert!(matches!(err, ChannelError::Configuration(ref m) if m.contains("token")));
    }

    #[test]
    fn missing_target_fails_at_build() {
        let err = factory("http://127.0.0.1:1")
            .build(&Recipient::new(
                "ops-chat",
                RecipientType::Slack,
                RecipientConfig::new(),
            ))
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::MissingKeys(_)));
    }
}
