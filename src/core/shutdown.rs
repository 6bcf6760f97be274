//! Signal-driven shutdown for stream mode.
//!
//! The first SIGINT/SIGTERM raises the shutdown flag so the batcher flushes what
//! it holds and the engine delivers that last batch. A second signal while
//! that flush is running exits immediately without waiting for it.

use crate::utils::output::output;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shutdown flag shared by every long-running task.
///
/// The flag is sticky: a receiver subscribed after `trigger` still sees it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Resolves once shutdown is requested. Returns false if every `Shutdown`
/// handle was dropped without triggering.
pub async fn requested(rx: &mut watch::Receiver<bool>) -> bool {
    rx.wait_for(|stop| *stop).await.is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Flushing,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    BeginFlush,
    ForceExit,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    shutdown: Shutdown,
    state: Arc<Mutex<ShutdownState>>,
}

impl ShutdownCoordinator {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            state: Arc::new(Mutex::new(ShutdownState::Running)),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Advances the state machine for one received signal.
    pub fn on_signal(&self) -> SignalAction {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            ShutdownState::Running => {
                *state = ShutdownState::Flushing;
                self.shutdown.trigger();
                SignalAction::BeginFlush
            }
            ShutdownState::Flushing => SignalAction::ForceExit,
            ShutdownState::Terminated => SignalAction::Ignore,
        }
    }

    pub fn mark_terminated(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ShutdownState::Terminated;
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.listen().await })
    }

    async fn listen(self) {
        let mut signals = match Signals::install() {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        loop {
            let name = signals.next().await;
            match self.on_signal() {
                SignalAction::BeginFlush => {
                    tracing::info!("Received {}, flushing buffered lines", name);
                    output("flushing remaining lines before exit");
                }
                SignalAction::ForceExit => {
                    tracing::warn!("Received {} during flush, exiting without waiting", name);
                    output("interrupted again, exiting without flushing");
                    std::process::exit(1);
                }
                SignalAction::Ignore => {}
            }
        }
    }
}

struct Signals {
    ctrl_c_live: bool,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c_live: true,
            #[cfg(unix)]
            terminate: signal::unix::signal(signal::unix::SignalKind::terminate())?,
        })
    }

    async fn next(&mut self) -> &'static str {
        loop {
            #[cfg(unix)]
            let terminate = {
                let sigterm = &mut self.terminate;
                async move {
                    sigterm.recv().await;
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            if let Some(name) = wait_either(signal::ctrl_c(), terminate, &mut self.ctrl_c_live).await {
                return name;
            }
        }
    }
}

/// Waits for whichever signal comes first. A failed interrupt listener is
/// disabled and `None` returned, so the caller keeps waiting on `terminate`.
async fn wait_either<I, T>(interrupt: I, terminate: T, interrupt_live: &mut bool) -> Option<&'static str>
where
    I: Future<Output = std::io::Result<()>>,
    T: Future<Output = ()>,
{
    tokio::select! {
        result = interrupt, if *interrupt_live => match result {
            Ok(()) => Some("SIGINT"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                *interrupt_live = false;
                None
            }
        },
        _ = terminate => Some("SIGTERM"),
    }
}
