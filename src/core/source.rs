use crate::domain::model::Line;
use crate::utils::error::{Result, SlackcatError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Reads lines off an input stream into an unbounded queue.
///
/// The queue closes when the stream ends or fails. A read failure comes back
/// through the task's join handle as `SlackcatError::Input`; the lines read
/// before it are still in the queue. The `Ok` value is the number of lines
/// read. Echo is best effort: the first failed echo write turns echo off and
/// reading carries on.
pub struct LineSource<R, W> {
    reader: R,
    echo: Option<W>,
}

impl<R> LineSource<R, tokio::io::Sink>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            echo: None,
        }
    }
}

impl<R, W> LineSource<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Echo every line to `writer` before queueing it.
    pub fn with_echo(reader: R, writer: W) -> Self {
        Self {
            reader,
            echo: Some(writer),
        }
    }

    pub fn spawn(self) -> (UnboundedReceiver<Line>, JoinHandle<Result<usize>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    async fn run(mut self, tx: UnboundedSender<Line>) -> Result<usize> {
        let mut reader = BufReader::new(self.reader);
        let mut buf = Vec::new();
        let mut count = 0usize;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(SlackcatError::Input)?;
            if n == 0 {
                break;
            }

            let line = Line::from_raw(&buf);
            if let Some(echo) = self.echo.as_mut() {
                if let Err(e) = echo_line(echo, &line).await {
                    tracing::warn!("echo output failed, no longer echoing: {}", e);
                    self.echo = None;
                }
            }

            if tx.send(line).is_err() {
                tracing::debug!("line queue closed by consumer after {} lines", count);
                break;
            }
            count += 1;
        }

        tracing::debug!("input exhausted after {} lines", count);
        Ok(count)
    }
}

async fn echo_line<W: AsyncWrite + Unpin>(echo: &mut W, line: &Line) -> std::io::Result<()> {
    echo.write_all(line.as_str().as_bytes()).await?;
    echo.write_all(b"\n").await?;
    echo.flush().await
}
