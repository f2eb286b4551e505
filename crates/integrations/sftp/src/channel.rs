use std::sync::Arc;

use herald_channel::{
    Channel, ChannelError, ChannelFactory, Connector, CsvExportSettings, CsvReencoder, DynChannel,
    FilenameBuilder, SendReceipt, UploadPlan, plan_uploads, transfer,
};
use herald_core::{NotificationContent, Recipient, RecipientId, RecipientType};
use tracing::{debug, info, instrument};

use crate::config::{OPTIONAL_KEYS, REQUIRED_KEYS, SftpRecipientConfig, SftpSettings, SftpTarget};
use crate::connector::Ssh2Connector;

/// Uploads report files for one recipient to an SFTP server.
pub struct SftpChannel<C> {
    recipient: RecipientId,
    target: Arc<SftpTarget>,
    timestamp: bool,
    reencoder: CsvReencoder,
    filenames: FilenameBuilder,
    connector: Arc<C>,
}

impl<C> Channel for SftpChannel<C>
where
    C: Connector<Target = SftpTarget>,
{
    fn recipient_type(&self) -> RecipientType {
        RecipientType::Sftp
    }

    #[instrument(
        skip(self, content),
        fields(recipient = %self.recipient, channel = "sftp", host = %self.target.host)
    )]
    async fn send(&self, content: &NotificationContent) -> Result<SendReceipt, ChannelError> {
        let files = plan_uploads(
            content,
            &UploadPlan {
                directory: &self.target.directory,
                timestamp: self.timestamp,
                reencoder: &self.reencoder,
                filenames: &self.filenames,
            },
        )?;
        debug!(files = files.len(), "planned sftp uploads");

        let written =
            transfer(Arc::clone(&self.connector), Arc::clone(&self.target), files).await?;
        info!(files = written.len(), "delivered over sftp");
        Ok(SendReceipt::new(written))
    }
}

/// Builds [`SftpChannel`]s from recipient settings.
pub struct SftpFactory<C = Ssh2Connector> {
    connector: Arc<C>,
    csv: CsvExportSettings,
    filenames: FilenameBuilder,
}

impl SftpFactory<Ssh2Connector> {
    /// Factory backed by libssh2.
    pub fn from_settings(
        settings: &SftpSettings,
        csv: CsvExportSettings,
        filenames: FilenameBuilder,
    ) -> Self {
        Self::new(Arc::new(Ssh2Connector::new(settings)), csv, filenames)
    }
}

impl<C> SftpFactory<C> {
    pub fn new(connector: Arc<C>, csv: CsvExportSettings, filenames: FilenameBuilder) -> Self {
        Self {
            connector,
            csv,
            filenames,
        }
    }
}

impl<C> ChannelFactory for SftpFactory<C>
where
    C: Connector<Target = SftpTarget>,
{
    fn recipient_type(&self) -> RecipientType {
        RecipientType::Sftp
    }

    fn required_keys(&self) -> &'static [&'static str] {
        REQUIRED_KEYS
    }

    fn optional_keys(&self) -> &'static [&'static str] {
        OPTIONAL_KEYS
    }

    fn build(&self, recipient: &Recipient) -> Result<Box<dyn DynChannel>, ChannelError> {
        let parsed = SftpRecipientConfig::from_config(&recipient.config)?;
        let reencoder = CsvReencoder::for_recipient(&self.csv, parsed.divider.as_deref())?;
        debug!(recipient = %recipient.id, sftp = ?parsed.target, "built sftp channel");
        Ok(Box::new(SftpChannel {
            recipient: recipient.id.clone(),
            target: Arc::new(parsed.target),
            timestamp: parsed.timestamp,
            reencoder,
            filenames: self.filenames.clone(),
            connector: Arc::clone(&self.connector),
        }))
    }
}
