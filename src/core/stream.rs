use crate::core::batcher::{BatchPolicy, Batcher, BatcherExit};
use crate::core::shutdown::Shutdown;
use crate::core::source::LineSource;
use crate::domain::model::Batch;
use crate::domain::ports::Deliver;
use crate::utils::error::{Result, SlackcatError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// Batches in flight between the accumulator and the delivery loop.
const BATCH_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub lines_delivered: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
    pub interrupted: bool,
}

/// Runs stream mode: source, batcher and a sequential delivery loop.
pub struct StreamEngine<D: Deliver> {
    deliver: D,
    policy: BatchPolicy,
    shutdown: Shutdown,
}

impl<D: Deliver> StreamEngine<D> {
    pub fn new(deliver: D, policy: BatchPolicy, shutdown: Shutdown) -> Self {
        Self {
            deliver,
            policy,
            shutdown,
        }
    }

    pub async fn run<R>(&self, reader: R) -> Result<StreamReport>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.run_source(LineSource::new(reader)).await
    }

    /// Like `run`, echoing every input line to `echo` first.
    pub async fn run_with_echo<R, W>(&self, reader: R, echo: W) -> Result<StreamReport>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.run_source(LineSource::with_echo(reader, echo)).await
    }

    async fn run_source<R, W>(&self, source: LineSource<R, W>) -> Result<StreamReport>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shutdown_rx = self.shutdown.subscribe();
        let (lines, source_task) = source.spawn();
        let (batch_tx, mut batch_rx) = mpsc::channel(BATCH_QUEUE_DEPTH);
        let batcher_task = tokio::spawn(Batcher::new(self.policy).run(lines, shutdown_rx, batch_tx));

        let mut report = StreamReport::default();
        while let Some(batch) = batch_rx.recv().await {
            if self.shutdown.is_triggered() {
                let last = Self::collapse(batch, &mut batch_rx).await;
                self.deliver_one(&last, &mut report).await;
                break;
            }
            self.deliver_one(&batch, &mut report).await;
        }

        let exit = batcher_task
            .await
            .map_err(|e| SlackcatError::transport(format!("batcher task failed: {}", e)))?;

        match exit {
            BatcherExit::Shutdown => {
                // The source may be parked on a blocking read; leave it behind.
                report.interrupted = true;
                source_task.abort();
            }
            BatcherExit::Exhausted | BatcherExit::Abandoned => match source_task.await {
                Ok(Ok(count)) => tracing::debug!("source finished after {} lines", count),
                Ok(Err(e)) => return Err(e),
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    return Err(SlackcatError::Input(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        e.to_string(),
                    )))
                }
            },
        }

        tracing::info!(
            "stream finished: {} batches sent, {} failed, {} lines delivered",
            report.batches_sent,
            report.batches_failed,
            report.lines_delivered
        );
        Ok(report)
    }

    /// Folds every batch still queued behind `first` into one final batch.
    /// The batcher closes the queue right after its shutdown flush.
    async fn collapse(mut first: Batch, pending: &mut mpsc::Receiver<Batch>) -> Batch {
        let mut merged = 0usize;
        while let Some(batch) = pending.recv().await {
            first.absorb(batch);
            merged += 1;
        }
        first.is_final = true;
        tracing::debug!(
            "shutdown flush: folded {} queued batches into #{} ({} lines)",
            merged,
            first.seq,
            first.len()
        );
        first
    }

    /// Failures are logged and counted; the stream keeps going.
    async fn deliver_one(&self, batch: &Batch, report: &mut StreamReport) {
        match self.deliver.send_batch(batch).await {
            Ok(()) => {
                report.batches_sent += 1;
                report.lines_delivered += batch.len();
            }
            Err(e) => {
                report.batches_failed += 1;
                tracing::warn!(
                    "❌ dropping batch #{} ({} lines) for {}: {}",
                    batch.seq,
                    batch.len(),
                    self.deliver.channel(),
                    e.user_friendly_message()
                );
            }
        }
    }
}
