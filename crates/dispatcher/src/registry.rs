use std::sync::Arc;

use herald_channel::{ChannelFactory, ChannelRegistry};
use herald_core::RecipientType;
use herald_email::EmailFactory;
use herald_samba::SambaFactory;
use herald_sftp::SftpFactory;
use herald_slack::SlackFactory;
use tracing::debug;

use crate::config::{ConfigError, HeraldConfig};

/// Registry with a factory for every recipient type, built from the
/// process-wide configuration.
///
/// The match below is exhaustive over [`RecipientType`], so a new type
/// cannot be added without deciding how it is delivered.
pub fn standard_registry(config: &HeraldConfig) -> Result<ChannelRegistry, ConfigError> {
    let filenames = config.filename_builder()?;
    let csv = &config.csv_export;

    let mut registry = ChannelRegistry::new();
    for recipient_type in RecipientType::ALL {
        let factory: Arc<dyn ChannelFactory> = match recipient_type {
            RecipientType::Email => Arc::new(
                EmailFactory::smtp(&config.email, csv.clone(), filenames.clone())
                    .map_err(|e| ConfigError::Invalid(format!("[email] {e}")))?,
            ),
            RecipientType::Slack => Arc::new(
                SlackFactory::new(&config.slack, csv.clone(), filenames.clone())
                    .map_err(|e| ConfigError::Invalid(format!("[slack] {e}")))?,
            ),
            RecipientType::Samba => Arc::new(SambaFactory::from_settings(
                &config.samba,
                csv.clone(),
                filenames.clone(),
            )),
            RecipientType::Sftp => Arc::new(SftpFactory::from_settings(
                &config.sftp,
                csv.clone(),
                filenames.clone(),
            )),
        };
        registry.register(factory);
        debug!(%recipient_type, "registered channel factory");
    }
    Ok(registry)
}
