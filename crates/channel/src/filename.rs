use std::fmt;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::error::ChannelError;

/// Characters that are not allowed in a delivered file name.
pub const FORBIDDEN_FILENAME_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local time of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Remove every forbidden character from `name`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c))
        .collect()
}

/// Derives remote file names from a report name.
///
/// The base name and extension are sanitized; the optional timestamp is
/// appended after a single space using the configured `strftime` format.
/// The timestamp is not sanitized, so its `:` separators are kept; the
/// format is checked up front to allow no other forbidden character.
#[derive(Clone)]
pub struct FilenameBuilder {
    clock: Arc<dyn Clock>,
    timestamp_format: String,
}

impl FilenameBuilder {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(LocalClock),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_owned(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different `strftime` format for timestamps.
    ///
    /// Fails when the format has invalid specifiers or renders path
    /// separators or other characters that cannot appear in a file name
    /// (`:` is allowed).
    pub fn with_timestamp_format(mut self, format: &str) -> Result<Self, ChannelError> {
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(ChannelError::Configuration(format!(
                "invalid timestamp format '{format}'"
            )));
        }
        let sample = NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.format(format).to_string())
            .unwrap_or_default();
        if sample
            .chars()
            .any(|c| c != ':' && FORBIDDEN_FILENAME_CHARS.contains(&c))
        {
            return Err(ChannelError::Configuration(format!(
                "timestamp format '{format}' produces characters not allowed in file names"
            )));
        }
        self.timestamp_format = format.to_owned();
        Ok(self)
    }

    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }

    /// Current time rendered with the timestamp format.
    pub fn timestamp(&self) -> String {
        self.clock.now().format(&self.timestamp_format).to_string()
    }

    /// Build `"<base>[ <timestamp>]<extension>"`.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use chrono::NaiveDate;
    /// use herald_channel::{FilenameBuilder, FixedClock};
    ///
    /// let at = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
    /// let names = FilenameBuilder::new().with_clock(Arc::new(FixedClock(at)));
    /// assert_eq!(names.build("Daily", ".png", true), "Daily 2024-01-02 03:04:05.png");
    /// assert_eq!(names.build("Q1/Q2: \"sales\"?", ".csv", false), "Q1Q2 sales.csv");
    /// ```
    pub fn build(&self, base: &str, extension: &str, with_timestamp: bool) -> String {
        let mut name = sanitize_filename(base);
        if with_timestamp {
            name.push(' ');
            name.push_str(&self.timestamp());
        }
        name.push_str(&sanitize_filename(extension));
        name
    }
}

impl Default for FilenameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilenameBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilenameBuilder")
            .field("timestamp_format", &self.timestamp_format)
            .finish_non_exhaustive()
    }
}
