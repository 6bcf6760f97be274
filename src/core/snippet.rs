use crate::core::source::LineSource;
use crate::domain::model::FileUpload;
use crate::domain::ports::{ConfigProvider, Deliver};
use crate::utils::error::{Result, SlackcatError};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetOptions {
    pub filename: Option<String>,
    pub filetype: Option<String>,
    pub comment: Option<String>,
}

impl SnippetOptions {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            filename: config.filename().map(str::to_string),
            filetype: config.filetype().map(str::to_string),
            comment: config.comment().map(str::to_string),
        }
    }
}

/// Timestamped name used when stdin is uploaded without `--filename`.
pub fn default_filename() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Single-shot mode: the whole input becomes one file upload.
pub struct SnippetEngine<D: Deliver> {
    deliver: D,
    options: SnippetOptions,
}

impl<D: Deliver> SnippetEngine<D> {
    pub fn new(deliver: D, options: SnippetOptions) -> Self {
        Self { deliver, options }
    }

    /// Uploads a local file; its base name is the default filename.
    pub async fn upload_path(&self, path: &Path) -> Result<FileUpload> {
        let content = tokio::fs::read(path).await.map_err(SlackcatError::Input)?;
        let fallback = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(default_filename);
        self.upload(content, fallback).await
    }

    /// Spools the stream to a temp file line by line, then uploads it.
    pub async fn upload_stream<R>(&self, reader: R) -> Result<FileUpload>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.upload_source(LineSource::new(reader)).await
    }

    pub async fn upload_stream_with_echo<R, W>(&self, reader: R, echo: W) -> Result<FileUpload>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.upload_source(LineSource::with_echo(reader, echo)).await
    }

    async fn upload_source<R, W>(&self, source: LineSource<R, W>) -> Result<FileUpload>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let tmp = tempfile::Builder::new().prefix("slackcat-").tempfile()?;
        let mut writer = BufWriter::new(tokio::fs::File::from_std(tmp.reopen()?));

        let (mut lines, source_task) = source.spawn();
        while let Some(line) = lines.recv().await {
            writer.write_all(line.as_str().as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;

        match source_task.await {
            Ok(result) => {
                let count = result?;
                tracing::debug!("spooled {} lines to {}", count, tmp.path().display());
            }
            Err(e) => {
                return Err(SlackcatError::Input(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                )))
            }
        }

        // `tmp` is removed when it drops at the end of this function.
        let content = tokio::fs::read(tmp.path()).await?;
        self.upload(content, default_filename()).await
    }

    async fn upload(&self, content: Vec<u8>, fallback_name: String) -> Result<FileUpload> {
        let upload = FileUpload {
            content,
            filename: self.options.filename.clone().unwrap_or(fallback_name),
            filetype: self.options.filetype.clone(),
            comment: self.options.comment.clone(),
        };
        self.deliver.upload_file(&upload).await?;
        Ok(upload)
    }
}
