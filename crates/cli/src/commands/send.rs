use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use futures::StreamExt;
use futures::stream;
use herald_channel::{ChannelError, NotificationError};
use herald_core::{
    DeliveryOutcome, EmbeddedTable, NotificationContent, RecipientId, RecipientRecord,
    RecipientType,
};
use herald_dispatcher::{
    HeraldConfig, NotificationDispatcher, RunSummary, failed_outcome, standard_registry,
};
use tracing::info;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// JSON file holding an array of recipient records.
    #[arg(long)]
    pub recipients: PathBuf,
    /// Report name, used for subjects and file names.
    #[arg(long)]
    pub name: String,
    /// CSV export of the report.
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// Screenshot image; repeat for several.
    #[arg(long = "screenshot")]
    pub screenshots: Vec<PathBuf>,
    /// Plain text body.
    #[arg(long)]
    pub text: Option<String>,
    /// Short description shown above the report.
    #[arg(long)]
    pub description: Option<String>,
    /// Link to the live report.
    #[arg(long)]
    pub url: Option<String>,
    /// JSON file with `columns` and `rows` of a small table.
    #[arg(long)]
    pub table: Option<PathBuf>,
}

pub async fn run(
    config: &HeraldConfig,
    args: &SendArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let content = load_content(args)?;
    let records = load_records(&args.recipients)?;

    let registry = standard_registry(config)?;
    let dispatcher = NotificationDispatcher::new(Arc::new(registry))
        .with_max_concurrent(config.dispatch.max_concurrent);
    let limit = config.dispatch.timeout();

    info!(
        report = %content.name,
        recipients = records.len(),
        "dispatching report"
    );
    let outcomes: Vec<DeliveryOutcome> = stream::iter(&records)
        .map(|record| dispatch_with_timeout(&dispatcher, record, &content, limit))
        .buffered(config.dispatch.max_concurrent.max(1))
        .collect()
        .await;
    let summary = RunSummary::from_outcomes(outcomes);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => print_summary(&summary),
    }

    if !summary.all_delivered() {
        anyhow::bail!(
            "{} of {} deliveries failed",
            summary.failed,
            summary.outcomes.len()
        );
    }
    Ok(())
}

/// A dispatch exceeding its budget is reported as a retryable timeout.
async fn dispatch_with_timeout(
    dispatcher: &NotificationDispatcher,
    record: &RecipientRecord,
    content: &NotificationContent,
    limit: Duration,
) -> DeliveryOutcome {
    match tokio::time::timeout(limit, dispatcher.dispatch_record(record, content)).await {
        Ok(outcome) => outcome,
        Err(_) => failed_outcome(&NotificationError::new(
            RecipientId::from(record.id.as_str()),
            record.type_tag.parse::<RecipientType>().ok(),
            ChannelError::Timeout(limit),
        )),
    }
}

fn print_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match outcome {
            DeliveryOutcome::Delivered(receipt) => {
                println!(
                    "  [OK ] {recipient} | {channel} | {artifacts}",
                    recipient = receipt.recipient,
                    channel = receipt.channel,
                    artifacts = receipt.artifacts.join(", "),
                );
            }
            DeliveryOutcome::Failed(failure) => {
                let retry = if failure.retryable { "retryable" } else { "permanent" };
                println!(
                    "  [ERR] {recipient} | {channel} | {kind} ({retry}) | {message}",
                    recipient = failure.recipient,
                    channel = failure.channel.map_or("unknown", RecipientType::as_str),
                    kind = failure.kind.code(),
                    message = failure.message,
                );
            }
        }
    }
    println!(
        "{} delivered, {} failed ({} retryable)",
        summary.delivered, summary.failed, summary.retryable_failures
    );
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn load_records(path: &Path) -> anyhow::Result<Vec<RecipientRecord>> {
    let bytes = read(path)?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing recipient records in {}", path.display()))
}

fn load_content(args: &SendArgs) -> anyhow::Result<NotificationContent> {
    let mut content = NotificationContent::new(&args.name);
    if let Some(path) = &args.csv {
        content = content.with_csv(read(path)?);
    }
    if !args.screenshots.is_empty() {
        let images = args
            .screenshots
            .iter()
            .map(PathBuf::as_path)
            .map(read)
            .collect::<anyhow::Result<Vec<_>>>()?;
        content = content.with_screenshots(images);
    }
    if let Some(text) = &args.text {
        content = content.with_text(text);
    }
    if let Some(description) = &args.description {
        content = content.with_description(description);
    }
    if let Some(url) = &args.url {
        content = content.with_url(url);
    }
    if let Some(path) = &args.table {
        let table: EmbeddedTable = serde_json::from_slice(&read(path)?)
            .with_context(|| format!("parsing table in {}", path.display()))?;
        content = content.with_embedded_data(table);
    }
    Ok(content)
}
