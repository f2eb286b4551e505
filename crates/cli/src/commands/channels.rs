use herald_channel::ChannelRegistry;
use herald_dispatcher::{HeraldConfig, standard_registry};
use serde::Serialize;

use crate::OutputFormat;

#[derive(Debug, Serialize)]
struct ChannelInfo {
    recipient_type: &'static str,
    required_keys: &'static [&'static str],
    optional_keys: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    unavailable: Option<String>,
}

fn describe(registry: &ChannelRegistry) -> Vec<ChannelInfo> {
    registry
        .factories()
        .map(|factory| ChannelInfo {
            recipient_type: factory.recipient_type().as_str(),
            required_keys: factory.required_keys(),
            optional_keys: factory.optional_keys(),
            unavailable: factory.unavailable_reason(),
        })
        .collect()
}

pub fn run(config: &HeraldConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let registry = standard_registry(config)?;
    let channels = describe(&registry);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&channels)?);
        }
        OutputFormat::Text => {
            println!("{} channels:", channels.len());
            for c in &channels {
                let optional = if c.optional_keys.is_empty() {
                    "-".to_owned()
                } else {
                    c.optional_keys.join(", ")
                };
                println!(
                    "  {name:<6} | required: {required} | optional: {optional}",
                    name = c.recipient_type,
                    required = c.required_keys.join(", "),
                );
                if let Some(reason) = &c.unavailable {
                    println!("         unavailable: {reason}");
                }
            }
        }
    }
    Ok(())
}
