use serde::{Deserialize, Serialize};

/// Envelope shared by every Web API response.
#[derive(Debug, Deserialize)]
pub struct SlackResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

/// Request body for `chat.postMessage`.
#[derive(Debug, Serialize)]
pub struct PostMessageRequest<'a> {
    pub channel: &'a str,
    pub text: &'a str,
    pub mrkdwn: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostMessageResponse {
    pub channel: Option<String>,
    pub ts: Option<String>,
}

/// Form fields for `files.getUploadURLExternal`.
#[derive(Debug, Serialize)]
pub struct UploadUrlRequest<'a> {
    pub filename: &'a str,
    pub length: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UploadUrlResponse {
    pub upload_url: Option<String>,
    pub file_id: Option<String>,
}

/// Request body for `files.completeUploadExternal`.
#[derive(Debug, Serialize)]
pub struct CompleteUploadRequest<'a> {
    pub files: Vec<UploadedFile<'a>>,
    pub channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_comment: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile<'a> {
    pub id: &'a str,
    pub title: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteUploadResponse {}
