//! Debounced autosave.
//!
//! Every mutation pushes the save deadline back by the debounce delay; the
//! snapshot is written once the workspace has been quiet that long.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::DissonanceResult;
use crate::workspace::Workspace;

/// Trailing-edge debounce state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Creates an idle debouncer.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    /// The debounce delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records a change at `now`, restarting the quiet period.
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// True if a change has not been flushed yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true (and goes idle) if the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Goes idle regardless of the deadline. Returns whether anything was
    /// pending.
    pub fn take(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

/// Running autosave task.
#[derive(Debug)]
pub struct AutosaveHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    /// Stops the task and flushes whatever is still pending.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "autosave task ended abnormally");
        }
    }
}

/// Runs a flush on the blocking pool; snapshot writes fsync.
async fn run_blocking<F>(what: &'static str, flush: F)
where
    F: FnOnce() -> DissonanceResult<bool> + Send + 'static,
{
    match tokio::task::spawn_blocking(flush).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "{what} failed"),
        Err(e) => tracing::warn!(error = %e, "{what} task panicked"),
    }
}

/// Spawns a task that checks the workspace every `tick` and writes the
/// snapshot once the debounce delay has passed. Save failures are logged
/// and retried on the next change.
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn spawn_autosave(workspace: Arc<Workspace>, tick: Duration) -> AutosaveHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = interval.tick() => {
                    let ws = Arc::clone(&workspace);
                    run_blocking("autosave", move || ws.flush_if_due()).await;
                }
            }
        }
        run_blocking("final autosave", move || workspace.flush()).await;
        tracing::debug!("autosave stopped");
    });
    AutosaveHandle {
        stop: Some(stop_tx),
        task,
    }
}
