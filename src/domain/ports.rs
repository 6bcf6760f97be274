use crate::domain::model::{Batch, FileUpload};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Outbound side of the pipeline. Implementations own their `DeliveryTarget`.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn send_batch(&self, batch: &Batch) -> Result<()>;
    async fn upload_file(&self, upload: &FileUpload) -> Result<()>;
    fn channel(&self) -> &str;
}

/// Knobs the engines read; `CliConfig` is the only production implementation.
pub trait ConfigProvider: Send + Sync {
    fn batch_lines(&self) -> usize;
    fn flush_interval_ms(&self) -> u64;
    fn tee(&self) -> bool;
    fn filename(&self) -> Option<&str>;
    fn filetype(&self) -> Option<&str>;
    fn comment(&self) -> Option<&str>;
}
