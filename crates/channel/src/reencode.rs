use std::borrow::Cow;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

pub const DEFAULT_CSV_ENCODING: &str = "utf-8";
pub const DEFAULT_CSV_DELIMITER: &str = ";";

/// Delimiter label that stands for a tab character.
pub const TAB_DELIMITER: &str = "Tab";

/// Process-wide CSV export settings: how the rendering stage wrote the CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvExportSettings {
    /// Encoding label of exported CSV bytes, also used when re-encoding.
    pub encoding: String,
    /// Field delimiter of exported CSV bytes.
    pub delimiter: String,
    /// Prefix cells that spreadsheet tools would evaluate as formulas.
    pub escape_formulas: bool,
}

impl Default for CsvExportSettings {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_CSV_ENCODING.to_owned(),
            delimiter: DEFAULT_CSV_DELIMITER.to_owned(),
            escape_formulas: true,
        }
    }
}

/// Parse a delimiter setting: [`TAB_DELIMITER`] or exactly one ASCII
/// character.
pub fn parse_delimiter(value: &str) -> Result<u8, ChannelError> {
    if value == TAB_DELIMITER {
        return Ok(b'\t');
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(ChannelError::Configuration(format!(
            "delimiter must be a single ASCII character or '{TAB_DELIMITER}', got '{value}'"
        ))),
    }
}

/// Resolve an encoding label (`utf-8`, `latin1`, `windows-1252`, ...).
pub fn lookup_encoding(label: &str) -> Result<&'static Encoding, ChannelError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ChannelError::Configuration(format!("unknown encoding '{label}'")))
}

/// Rewrites CSV bytes from one delimiter and encoding to another.
///
/// Cells are parsed with standard quoting rules, so a delimiter inside a
/// quoted field is never mistaken for a separator. The line terminator of
/// the input (`\r\n` or `\n`), its blank lines and the presence of a final
/// terminator are preserved.
#[derive(Debug, Clone, Copy)]
pub struct CsvReencoder {
    source_encoding: &'static Encoding,
    target_encoding: &'static Encoding,
    source_delimiter: u8,
    target_delimiter: u8,
    escape_formulas: bool,
}

impl CsvReencoder {
    pub fn new(
        source_encoding: &str,
        target_encoding: &str,
        source_delimiter: &str,
        target_delimiter: &str,
    ) -> Result<Self, ChannelError> {
        Ok(Self {
            source_encoding: lookup_encoding(source_encoding)?,
            target_encoding: lookup_encoding(target_encoding)?,
            source_delimiter: parse_delimiter(source_delimiter)?,
            target_delimiter: parse_delimiter(target_delimiter)?,
            escape_formulas: false,
        })
    }

    /// Build the re-encoder for one recipient: bytes are read with the
    /// process delimiter and written with the recipient's `divider` when it
    /// has one. Encoding is unchanged.
    pub fn for_recipient(
        settings: &CsvExportSettings,
        divider: Option<&str>,
    ) -> Result<Self, ChannelError> {
        let encoding = non_empty(&settings.encoding).unwrap_or(DEFAULT_CSV_ENCODING);
        let process_delimiter = non_empty(&settings.delimiter).unwrap_or(DEFAULT_CSV_DELIMITER);
        let target_delimiter = divider.and_then(non_empty).unwrap_or(process_delimiter);
        Ok(Self::new(encoding, encoding, process_delimiter, target_delimiter)?
            .with_formula_escaping(settings.escape_formulas))
    }

    #[must_use]
    pub fn with_formula_escaping(mut self, enabled: bool) -> Self {
        self.escape_formulas = enabled;
        self
    }

    pub fn target_delimiter(&self) -> u8 {
        self.target_delimiter
    }

    pub fn target_encoding(&self) -> &'static Encoding {
        self.target_encoding
    }

    /// Decode, re-delimit and re-encode one CSV document.
    ///
    /// Blank lines are kept where they were. Only record boundaries are
    /// looked at for the line ending, so a `\r\n` inside a quoted cell does
    /// not change how rows are terminated.
    pub fn reencode(&self, raw: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let text = self
            .source_encoding
            .decode_without_bom_handling_and_without_replacement(raw)
            .ok_or_else(|| {
                ChannelError::Encoding(format!(
                    "CSV is not valid {}",
                    self.source_encoding.name()
                ))
            })?;
        let bytes = text.as_bytes();

        let ending = LineEnding::detect(bytes, self.source_delimiter)?;
        let terminated = text.ends_with(['\n', '\r']);

        let mut reader = reader_for(bytes, self.source_delimiter);
        let mut writer = WriterBuilder::new()
            .delimiter(self.target_delimiter)
            .quote_style(QuoteStyle::Necessary)
            .terminator(ending.terminator())
            .flexible(true)
            .from_writer(Vec::with_capacity(raw.len()));

        let mut record = StringRecord::new();
        let mut consumed = 0;
        let mut after_cr = false;
        while reader.read_record(&mut record).map_err(malformed)? {
            let end = offset(&reader, bytes.len());
            let span = &bytes[consumed..end];
            write_blank_lines(&mut writer, ending, leading_blank_lines(span, after_cr))?;
            let written = if self.escape_formulas {
                writer.write_record(record.iter().map(|field| escape_formula(field).into_owned()))
            } else {
                writer.write_record(&record)
            };
            written.map_err(|e| ChannelError::Encoding(format!("failed to write CSV: {e}")))?;
            after_cr = span.last() == Some(&b'\r');
            consumed = end;
        }
        write_blank_lines(
            &mut writer,
            ending,
            leading_blank_lines(&bytes[consumed..], after_cr),
        )?;

        let bytes = writer
            .into_inner()
            .map_err(|e| ChannelError::Encoding(format!("failed to flush CSV: {e}")))?;
        let mut out = String::from_utf8(bytes)
            .map_err(|e| ChannelError::Encoding(format!("re-encoded CSV is not UTF-8: {e}")))?;

        if !terminated && out.ends_with(ending.as_str()) {
            out.truncate(out.len() - ending.as_str().len());
        }

        encode(self.target_encoding, &out)
    }
}

fn reader_for(bytes: &[u8], delimiter: u8) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes)
}

fn malformed(e: csv::Error) -> ChannelError {
    ChannelError::Encoding(format!("malformed CSV: {e}"))
}

/// Bytes the reader has consumed so far, capped at `len`.
fn offset(reader: &csv::Reader<&[u8]>, len: usize) -> usize {
    usize::try_from(reader.position().byte()).map_or(len, |byte| byte.min(len))
}

/// Row terminator of a CSV document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// Take the ending from the first record boundary. The reader may stop a
    /// `\r\n` record right after the `\r`, leaving the `\n` unread.
    fn detect(bytes: &[u8], delimiter: u8) -> Result<Self, ChannelError> {
        let mut reader = reader_for(bytes, delimiter);
        let mut record = csv::ByteRecord::new();
        if !reader.read_byte_record(&mut record).map_err(malformed)? {
            return Ok(Self::Lf);
        }
        let end = offset(&reader, bytes.len());
        let head = &bytes[..end];
        let crlf = head.ends_with(b"\r\n")
            || (head.ends_with(b"\r") && bytes.get(end) == Some(&b'\n'));
        Ok(if crlf { Self::CrLf } else { Self::Lf })
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }

    fn terminator(self) -> Terminator {
        match self {
            Self::Lf => Terminator::Any(b'\n'),
            Self::CrLf => Terminator::CRLF,
        }
    }
}

/// Number of empty lines the reader skipped at the start of `span`. When the
/// previous record stopped on a `\r`, the `\n` opening `span` belongs to it.
fn leading_blank_lines(span: &[u8], after_cr: bool) -> usize {
    let mut rest = span;
    if after_cr {
        rest = rest.strip_prefix(b"\n").unwrap_or(rest);
    }
    let mut lines = 0;
    loop {
        rest = if let Some(r) = rest.strip_prefix(b"\r\n") {
            r
        } else if let Some(r) = rest.strip_prefix(b"\n").or_else(|| rest.strip_prefix(b"\r")) {
            r
        } else {
            return lines;
        };
        lines += 1;
    }
}

fn write_blank_lines(
    writer: &mut csv::Writer<Vec<u8>>,
    ending: LineEnding,
    lines: usize,
) -> Result<(), ChannelError> {
    if lines == 0 {
        return Ok(());
    }
    writer
        .flush()
        .map_err(|e| ChannelError::Encoding(format!("failed to flush CSV: {e}")))?;
    for _ in 0..lines {
        writer.get_mut().extend_from_slice(ending.as_str().as_bytes());
    }
    Ok(())
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

/// Encode text, refusing to silently replace unmappable characters.
pub fn encode(encoding: &'static Encoding, text: &str) -> Result<Vec<u8>, ChannelError> {
    // encoding_rs only decodes UTF-16; its encoder falls back to UTF-8.
    if encoding == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }
    let (bytes, _, unmappable) = encoding.encode(text);
    if unmappable {
        return Err(ChannelError::Encoding(format!(
            "text contains characters not representable in {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

fn escape_formula(field: &str) -> Cow<'_, str> {
    let risky = field.starts_with(['=', '+', '-', '@', '\t', '\r']);
    if risky && field.trim().parse::<f64>().is_err() {
        Cow::Owned(format!("'{field}"))
    } else {
        Cow::Borrowed(field)
    }
}
