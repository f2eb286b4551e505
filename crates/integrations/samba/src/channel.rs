use std::sync::Arc;

use herald_channel::{
    Channel, ChannelError, ChannelFactory, Connector, CsvExportSettings, CsvReencoder, DynChannel,
    FilenameBuilder, SendReceipt, UploadPlan, plan_uploads, transfer,
};
use herald_core::{NotificationContent, Recipient, RecipientId, RecipientType};
use tracing::{debug, info, instrument};

use crate::config::{
    OPTIONAL_KEYS, REQUIRED_KEYS, SambaRecipientConfig, SambaSettings, SambaTarget,
};
use crate::connector::SmbConnector;

/// Stores report files for one recipient on an SMB share.
pub struct SambaChannel<C> {
    recipient: RecipientId,
    target: Arc<SambaTarget>,
    timestamp: bool,
    reencoder: CsvReencoder,
    filenames: FilenameBuilder,
    connector: Arc<C>,
}

impl<C> Channel for SambaChannel<C>
where
    C: Connector<Target = SambaTarget>,
{
    fn recipient_type(&self) -> RecipientType {
        RecipientType::Samba
    }

    #[instrument(
        skip(self, content),
        fields(recipient = %self.recipient, channel = "samba", share = %self.target.share)
    )]
    async fn send(&self, content: &NotificationContent) -> Result<SendReceipt, ChannelError> {
        let files = plan_uploads(
            content,
            &UploadPlan {
                directory: &self.target.folder,
                timestamp: self.timestamp,
                reencoder: &self.reencoder,
                filenames: &self.filenames,
            },
        )?;
        debug!(files = files.len(), "planned smb uploads");

        let written =
            transfer(Arc::clone(&self.connector), Arc::clone(&self.target), files).await?;
        info!(files = written.len(), "delivered to smb share");
        Ok(SendReceipt::new(
            written
                .iter()
                .map(|path| self.target.unc_path(path))
                .collect(),
        ))
    }
}

/// Builds [`SambaChannel`]s from recipient settings.
pub struct SambaFactory<C = SmbConnector> {
    connector: Arc<C>,
    csv: CsvExportSettings,
    filenames: FilenameBuilder,
}

impl SambaFactory<SmbConnector> {
    /// Factory backed by libsmbclient (when the `smbclient` feature is on).
    pub fn from_settings(
        settings: &SambaSettings,
        csv: CsvExportSettings,
        filenames: FilenameBuilder,
    ) -> Self {
        Self::new(Arc::new(SmbConnector::new(settings)), csv, filenames)
    }
}

impl<C> SambaFactory<C> {
    pub fn new(connector: Arc<C>, csv: CsvExportSettings, filenames: FilenameBuilder) -> Self {
        Self {
            connector,
            csv,
            filenames,
        }
    }
}

impl<C> ChannelFactory for SambaFactory<C>
where
    C: Connector<Target = SambaTarget>,
{
    fn recipient_type(&self) -> RecipientType {
        RecipientType::Samba
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn optional_keys(&self) -> &'static [&'static str] {
        OPTIONAL_KEYS
    }

    fn unavailable_reason(&self) -> Option<String> {
        self.connector.unavailable_reason()
    }

    fn build(&self, recipient: &Recipient) -> Result<Box<dyn DynChannel>, ChannelError> {
        let parsed = SambaRecipientConfig::from_config(&recipient.config)?;
        let reencoder = CsvReencoder::for_recipient(&self.csv, parsed.divider.as_deref())?;
        debug!(recipient = %recipient.id, smb = ?parsed.target, "built samba channel");
        Ok(Box::new(SambaChannel {
            recipient: recipient.id.clone(),
            target: Arc::new(parsed.target),
            timestamp: parsed.timestamp,
            reencoder,
            filenames: self.filenames.clone(),
            connector: Arc::clone(&self.connector),
        }))
    }
}
