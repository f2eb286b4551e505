use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::SlackSettings;
use crate::error::SlackError;
use crate::types::{
    CompleteUploadRequest, CompleteUploadResponse, PostMessageRequest, PostMessageResponse,
    SlackResponse, UploadUrlRequest, UploadUrlResponse, UploadedFile,
};

/// A message accepted by `chat.postMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

/// Thin Slack Web API client covering the calls the chat channel makes.
pub struct SlackClient {
    http: Client,
    token: String,
    api_base_url: String,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("token", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl SlackClient {
    /// Build a client with the configured request timeout.
    pub fn new(settings: &SlackSettings) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self::with_client(settings, http))
    }

    /// Create a client around an existing `reqwest::Client`.
    ///
    /// Useful for sharing a connection pool.
    pub fn with_client(settings: &SlackSettings, http: Client) -> Self {
        Self {
            http,
            token: settings.token.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Build the full URL for a Slack API method.
    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base_url)
    }

    /// Send a Web API request and interpret the response envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: RequestBuilder,
    ) -> Result<T, SlackError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| SlackError::Http { method, source })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(method, "Slack API rate limit hit");
            return Err(SlackError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Status {
                method,
                status,
                body,
            });
        }

        let envelope: SlackResponse<T> = response
            .json()
            .await
            .map_err(|source| SlackError::Http { method, source })?;

        if !envelope.ok {
            let code = envelope
                .error
                .unwrap_or_else(|| "unknown_error".to_owned());
            return Err(SlackError::Api { method, code });
        }

        Ok(envelope.data)
    }

    /// Post a text message to a channel.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
    ) -> Result<PostedMessage, SlackError> {
        const METHOD: &str = "chat.postMessage";
        debug!(channel, "posting message to Slack");

        let request = self
            .http
            .post(self.api_url(METHOD))
            .json(&PostMessageRequest {
                channel,
                text,
                mrkdwn: true,
            });
        let posted: PostMessageResponse = self.call(METHOD, request).await?;
        Ok(PostedMessage {
            channel: posted.channel.unwrap_or_else(|| channel.to_owned()),
            ts: posted.ts.ok_or(SlackError::MissingField {
                method: METHOD,
                field: "ts",
            })?,
        })
    }

    /// Reserve an upload slot and send the file bytes to it.
    ///
    /// Returns the file ID, which only becomes visible once
    /// [`complete_upload`](Self::complete_upload) shares it.
    pub async fn upload_file(&self, filename: &str, data: Vec<u8>) -> Result<String, SlackError> {
        const METHOD: &str = "files.getUploadURLExternal";
        const UPLOAD: &str = "file upload";
        debug!(filename, bytes = data.len(), "reserving Slack upload URL");

        let request = self
            .http
            .post(self.api_url(METHOD))
            .form(&UploadUrlRequest {
                filename,
                length: data.len(),
            });
        let slot: UploadUrlResponse = self.call(METHOD, request).await?;
        let upload_url = slot.upload_url.ok_or(SlackError::MissingField {
            method: METHOD,
            field: "upload_url",
        })?;
        let file_id = slot.file_id.ok_or(SlackError::MissingField {
            method: METHOD,
            field: "file_id",
        })?;

        let response = self
            .http
            .post(&upload_url)
            .body(data)
            .send()
            .await
            .map_err(|source| SlackError::Http {
                method: UPLOAD,
                source,
            })?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SlackError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Status {
                method: UPLOAD,
                status,
                body,
            });
        }
        Ok(file_id)
    }

    /// Share uploaded files in a channel, with an optional message.
    pub async fn complete_upload(
        &self,
        channel: &str,
        files: &[(String, String)],
        initial_comment: Option<&str>,
    ) -> Result<(), SlackError> {
        const METHOD: &str = "files.completeUploadExternal";
        debug!(channel, files = files.len(), "completing Slack upload");

        let request = self
            .http
            .post(self.api_url(METHOD))
            .json(&CompleteUploadRequest {
                files: files
                    .iter()
                    .map(|(id, title)| UploadedFile { id, title })
                    .collect(),
                channel_id: channel,
                initial_comment,
            });
        let _: CompleteUploadResponse = self.call(METHOD, request).await?;
        Ok(())
    }
}
