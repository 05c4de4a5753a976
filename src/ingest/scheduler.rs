//! Periodic batch trigger.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::batch::BatchRunner;

enum SchedulerMessage {
    Shutdown,
}

/// Handle to a running periodic batch task.
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerMessage>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for it to exit.
    ///
    /// A running batch finishes the feeds it has started and skips the rest.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.sender.send(SchedulerMessage::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }
    }
}

/// Run `runner.run_all()` every `interval`, starting immediately.
///
/// Batches never overlap: a tick that falls due while a batch is still
/// running is skipped. [`SchedulerHandle::shutdown`] cancels the runner's
/// token.
pub fn spawn_periodic_batch(runner: BatchRunner, interval: Duration) -> SchedulerHandle {
    let (sender, mut receiver) = mpsc::channel(1);
    let cancel = runner.cancellation_token();

    let task = tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                msg = receiver.recv() => {
                    match msg {
                        Some(SchedulerMessage::Shutdown) | None => {
                            tracing::info!("Scheduler stopped");
                            break;
                        }
                    }
                }
                _ = timer.tick() => {
                    match runner.run_all().await {
                        Ok(Some(saved)) => tracing::info!(saved = saved, "Scheduled batch finished"),
                        Ok(None) => tracing::debug!("Scheduled batch found no feeds"),
                        Err(e) => tracing::error!(error = %e, "Scheduled batch failed"),
                    }
                }
            }
        }
    });

    SchedulerHandle {
        sender,
        cancel,
        task,
    }
}
