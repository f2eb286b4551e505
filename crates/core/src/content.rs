use thiserror::Error;

use crate::table::EmbeddedTable;

/// Errors raised when report content is unusable before any delivery starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    /// The report name is empty or whitespace.
    #[error("content name must not be empty")]
    EmptyName,

    /// None of the payload fields carry anything to deliver.
    #[error("content '{0}' has no payload to deliver")]
    NothingToDeliver(String),
}

/// One unit of rendered report output, built once per dispatch by the
/// rendering stage and never mutated afterwards.
///
/// # Examples
///
/// ```
/// use herald_core::{NotificationContent, PayloadKind};
///
/// let content = NotificationContent::new("Weekly sales")
///     .with_csv(b"region;total\nnorth;10\n".to_vec())
///     .with_url("https://bi.example.com/dashboard/7");
/// let payload = content.primary_payload().unwrap();
/// assert_eq!(payload.kind(), PayloadKind::Csv);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationContent {
    /// Report or alert title. Used as the base of every file name.
    pub name: String,
    /// Raw CSV export, when the report produced one.
    pub csv: Option<Vec<u8>>,
    /// Rendered PNG screenshots in presentation order.
    pub screenshots: Option<Vec<Vec<u8>>>,
    /// Plain-text summary.
    pub text: Option<String>,
    /// Free-form description of the report.
    pub description: Option<String>,
    /// Link back to the chart or dashboard the content came from.
    pub url: Option<String>,
    /// Live tabular data, only delivered when no byte payload exists.
    pub embedded_data: Option<EmbeddedTable>,
}

impl NotificationContent {
    /// Create content with only a name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_csv(mut self, csv: Vec<u8>) -> Self {
        self.csv = Some(csv);
        self
    }

    #[must_use]
    pub fn with_screenshots(mut self, screenshots: Vec<Vec<u8>>) -> Self {
        self.screenshots = Some(screenshots);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_embedded_data(mut self, table: EmbeddedTable) -> Self {
        self.embedded_data = Some(table);
        self
    }

    /// Check the invariants every channel relies on.
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.name.trim().is_empty() {
            return Err(ContentError::EmptyName);
        }
        Ok(())
    }

    /// Select the single representation that drives delivery.
    ///
    /// Precedence is CSV, then screenshots, then the embedded table, then the
    /// plain text. Empty CSV bytes and an empty screenshot list count as
    /// absent. Returns `None` when the content carries nothing at all.
    pub fn primary_payload(&self) -> Option<PrimaryPayload<'_>> {
        if let Some(csv) = self.csv.as_deref().filter(|csv| !csv.is_empty()) {
            return Some(PrimaryPayload::Csv(csv));
        }
        if let Some(images) = self.screenshots.as_deref().filter(|s| !s.is_empty()) {
            return Some(PrimaryPayload::Screenshots(images));
        }
        if let Some(table) = &self.embedded_data {
            return Some(PrimaryPayload::Table(table));
        }
        self.text.as_deref().map(PrimaryPayload::Text)
    }

    /// Like [`primary_payload`](Self::primary_payload) but treats empty
    /// content as an error.
    pub fn require_payload(&self) -> Result<PrimaryPayload<'_>, ContentError> {
        self.primary_payload()
            .ok_or_else(|| ContentError::NothingToDeliver(self.name.clone()))
    }
}

/// The representation chosen for delivery, borrowed from the content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimaryPayload<'a> {
    Csv(&'a [u8]),
    Screenshots(&'a [Vec<u8>]),
    Table(&'a EmbeddedTable),
    Text(&'a str),
}

impl PrimaryPayload<'_> {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Csv(_) => PayloadKind::Csv,
            Self::Screenshots(_) => PayloadKind::Png,
            Self::Table(_) | Self::Text(_) => PayloadKind::Text,
        }
    }

    /// Whether the payload is one or more files (as opposed to text that
    /// gets rendered into a single document).
    pub fn is_file_like(&self) -> bool {
        matches!(self, Self::Csv(_) | Self::Screenshots(_))
    }
}

/// File type of a delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Csv,
    Png,
    Text,
}

impl PayloadKind {
    /// File extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => ".csv",
            Self::Png => ".png",
            Self::Text => ".txt",
        }
    }

    /// MIME type used by channels that attach files.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Png => "image/png",
            Self::Text => "text/plain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> EmbeddedTable {
        EmbeddedTable::new(vec!["a".into()], vec![vec!["1".into()]])
    }

    #[test]
    fn csv_wins_over_screenshots() {
        let content = NotificationContent::new("r")
            .with_csv(b"a;b\n".to_vec())
            .with_screenshots(vec![vec![0x89, 0x50]]);
        let payload = content.primary_payload().unwrap();
        assert!(matches!(payload, PrimaryPayload::Csv(_)));
        assert_eq!(payload.kind().extension(), ".csv");
    }

    #[test]
    fn screenshots_win_over_table() {
        let content = NotificationContent::new("r")
            .with_screenshots(vec![vec![1], vec![2]])
            .with_embedded_data(table());
        let payload = content.primary_payload().unwrap();
        assert_eq!(payload.kind(), PayloadKind::Png);
        assert!(payload.is_file_like());
    }

    #[test]
    fn table_wins_over_text() {
        let content = NotificationContent::new("r")
            .with_text("summary")
            .with_embedded_data(table());
        let payload = content.primary_payload().unwrap();
        assert!(matches!(payload, PrimaryPayload::Table(_)));
        assert_eq!(payload.kind().extension(), ".txt");
        assert!(!payload.is_file_like());
    }

    #[test]
    fn empty_byte_payloads_are_skipped() {
        let content = NotificationContent::new("r")
            .with_csv(Vec::new())
            .with_screenshots(Vec::new())
            .with_text("fallback");
        assert_eq!(content.primary_payload(), Some(PrimaryPayload::Text("fallback")));
    }

    #[test]
    fn selection_is_deterministic() {
        let content = NotificationContent::new("r")
            .with_csv(b"x\n".to_vec())
            .with_text("t");
        assert_eq!(content.primary_payload(), content.primary_payload());
    }

    #[test]
    fn nothing_to_deliver() {
        let content = NotificationContent::new("empty");
        assert!(content.primary_payload().is_none());
        assert_eq!(
            content.require_payload().unwrap_err(),
            ContentError::NothingToDeliver("empty".into())
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(
            NotificationContent::new("  ").validate(),
            Err(ContentError::EmptyName)
        );
        assert!(NotificationContent::new("ok").validate().is_ok());
    }
}
