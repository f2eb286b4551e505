use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use herald_channel::CsvReencoder;
use herald_dispatcher::HeraldConfig;
use tracing::info;

#[derive(Args, Debug)]
pub struct ReencodeArgs {
    /// CSV export as written by the rendering stage.
    #[arg(long)]
    pub input: PathBuf,
    /// Where to write the re-encoded file.
    #[arg(long)]
    pub output: PathBuf,
    /// Target delimiter, a single character or `Tab`. Defaults to the
    /// configured export delimiter.
    #[arg(long)]
    pub divider: Option<String>,
}

pub fn run(config: &HeraldConfig, args: &ReencodeArgs) -> anyhow::Result<()> {
    let reencoder = CsvReencoder::for_recipient(&config.csv_export, args.divider.as_deref())?;
    let raw = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let encoded = reencoder
        .reencode(&raw)
        .with_context(|| format!("re-encoding {}", args.input.display()))?;
    std::fs::write(&args.output, &encoded)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        bytes = encoded.len(),
        "re-encoded csv"
    );
    Ok(())
}
