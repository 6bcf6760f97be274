use crate::domain::model::{Batch, Line};
use crate::domain::ports::ConfigProvider;
use std::time::Duration;
use crate::core::shutdown::requested;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

pub const DEFAULT_BATCH_LINES: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub max_lines: usize,
    pub flush_interval: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_BATCH_LINES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl BatchPolicy {
    pub fn new(max_lines: usize, flush_interval: Duration) -> Self {
        Self {
            max_lines: max_lines.max(1),
            flush_interval,
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self::new(
            config.batch_lines(),
            Duration::from_millis(config.flush_interval_ms()),
        )
    }
}

/// Why the accumulator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherExit {
    /// The line queue closed; every line has been emitted.
    Exhausted,
    /// A shutdown flush was requested and the final batch was emitted.
    Shutdown,
    /// Nobody is listening for batches anymore.
    Abandoned,
}

/// Groups queued lines into batches.
///
/// A batch is emitted when it reaches `max_lines`, when the flush timer
/// fires with lines pending, when the queue closes, or on shutdown. On
/// shutdown everything already queued goes into one last batch regardless of
/// size. Empty batches are never emitted.
pub struct Batcher {
    policy: BatchPolicy,
    next_seq: u64,
}

impl Batcher {
    pub fn new(policy: BatchPolicy) -> Self {
        Self {
            policy,
            next_seq: 0,
        }
    }

    pub async fn run(
        mut self,
        mut lines: mpsc::UnboundedReceiver<Line>,
        mut shutdown: watch::Receiver<bool>,
        out: mpsc::Sender<Batch>,
    ) -> BatcherExit {
        let period = self.policy.flush_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut open = self.fresh_batch();
        let mut shutdown_live = true;

        loop {
            tokio::select! {
                biased;

                stop = requested(&mut shutdown), if shutdown_live => {
                    if !stop {
                        shutdown_live = false;
                        continue;
                    }
                    while let Ok(line) = lines.try_recv() {
                        open.push(line);
                    }
                    tracing::debug!("shutdown flush with {} buffered lines", open.len());
                    self.emit(open, true, &out).await;
                    return BatcherExit::Shutdown;
                }

                next = lines.recv() => match next {
                    Some(line) => {
                        open.push(line);
                        if open.len() >= self.policy.max_lines {
                            let full = std::mem::replace(&mut open, self.fresh_batch());
                            if !self.emit(full, false, &out).await {
                                return BatcherExit::Abandoned;
                            }
                            ticker.reset();
                        }
                    }
                    None => {
                        self.emit(open, true, &out).await;
                        return BatcherExit::Exhausted;
                    }
                },

                _ = ticker.tick() => {
                    if !open.is_empty() {
                        let due = std::mem::replace(&mut open, self.fresh_batch());
                        if !self.emit(due, false, &out).await {
                            return BatcherExit::Abandoned;
                        }
                    }
                }
            }
        }
    }

    fn fresh_batch(&mut self) -> Batch {
        let batch = Batch::new(self.next_seq);
        self.next_seq += 1;
        batch
    }

    /// Returns false once the receiving side is gone.
    async fn emit(&self, mut batch: Batch, is_final: bool, out: &mpsc::Sender<Batch>) -> bool {
        if batch.is_empty() {
            return !out.is_closed();
        }
        batch.is_final = is_final;
        tracing::debug!(
            "emitting batch #{} ({} lines, final={})",
            batch.seq,
            batch.len(),
            is_final
        );
        out.send(batch).await.is_ok()
    }
}
