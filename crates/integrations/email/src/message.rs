use std::fmt::Write as _;

use herald_channel::{ChannelError, CsvReencoder, FilenameBuilder, UploadPlan, plan_uploads};
use herald_core::{EmbeddedTable, NotificationContent, PrimaryPayload};

use crate::backend::EmailAttachment;

/// Body and attachments derived from report content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedEmail {
    pub body: String,
    pub html_body: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Turn content into an email body and attachments.
///
/// Description, link and text always go into the body. A CSV export is
/// re-encoded and attached, screenshots are attached as PNGs, and an embedded
/// table is rendered inline. Attachment names follow the usual file naming
/// rules without a timestamp.
pub fn compose(
    content: &NotificationContent,
    reencoder: &CsvReencoder,
    filenames: &FilenameBuilder,
) -> Result<ComposedEmail, ChannelError> {
    let payload = content.require_payload()?;

    let attachments = if payload.is_file_like() {
        let content_type = payload.kind().mime_type();
        let plan = UploadPlan {
            directory: "",
            timestamp: false,
            reencoder,
            filenames,
        };
        plan_uploads(content, &plan)?
            .into_iter()
            .map(|file| EmailAttachment {
                filename: file.path,
                content_type,
                data: file.contents,
            })
            .collect()
    } else {
        Vec::new()
    };

    let table = match payload {
        PrimaryPayload::Table(table) => Some(table),
        _ => None,
    };

    Ok(ComposedEmail {
        body: plain_body(content, table),
        html_body: html_body(content, table),
        attachments,
    })
}

fn plain_body(content: &NotificationContent, table: Option<&EmbeddedTable>) -> String {
    let mut sections: Vec<String> = Vec::new();
    sections.extend(content.description.clone());
    sections.extend(content.url.clone());
    sections.extend(content.text.clone());
    if let Some(table) = table {
        sections.push(table.to_text());
    }
    sections.retain(|s| !s.trim().is_empty());
    if sections.is_empty() {
        return content.name.clone();
    }
    sections.join("\n\n")
}

fn html_body(content: &NotificationContent, table: Option<&EmbeddedTable>) -> String {
    let mut html = format!("<h2>{}</h2>\n", escape_html(&content.name));
    if let Some(description) = non_blank(content.description.as_deref()) {
        let _ = writeln!(html, "<p>{}</p>", escape_html(description));
    }
    if let Some(url) = non_blank(content.url.as_deref()) {
        let url = escape_html(url);
        let _ = writeln!(html, "<p><a href=\"{url}\">{url}</a></p>");
    }
    if let Some(text) = non_blank(content.text.as_deref()) {
        let _ = writeln!(
            html,
            "<p>{}</p>",
            escape_html(text).replace('\n', "<br>\n")
        );
    }
    if let Some(table) = table {
        html.push_str(&table_html(table));
    }
    html
}

fn table_html(table: &EmbeddedTable) -> String {
    let mut html = String::from("<table border=\"1\">\n<tr>");
    for column in &table.columns {
        let _ = write!(html, "<th>{}</th>", escape_html(column));
    }
    html.push_str("</tr>\n");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape_html(cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Escape the characters that are significant in HTML text and attributes.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
