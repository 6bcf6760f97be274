use crate::domain::model::{Batch, Delivery, FileUpload};
use crate::domain::ports::Deliver;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Records what would have been sent instead of touching the network.
/// Clones share the same record.
#[derive(Debug, Clone)]
pub struct NoopSender {
    channel: String,
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl NoopSender {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            deliveries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, delivery: Delivery) {
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(delivery);
    }
}

#[async_trait]
impl Deliver for NoopSender {
    async fn send_batch(&self, batch: &Batch) -> Result<()> {
        tracing::info!(
            "noop: would post batch #{} ({} lines) to {}",
            batch.seq,
            batch.len(),
            self.channel
        );
        self.record(Delivery::Message {
            channel: self.channel.clone(),
            batch: batch.clone(),
        });
        Ok(())
    }

    async fn upload_file(&self, upload: &FileUpload) -> Result<()> {
        tracing::info!(
            "noop: would upload {} ({} bytes) to {}",
            upload.filename,
            upload.content.len(),
            self.channel
        );
        self.record(Delivery::File {
            channel: self.channel.clone(),
            upload: upload.clone(),
        });
        Ok(())
    }

    fn channel(&self) -> &str {
        &self.channel
    }
}
