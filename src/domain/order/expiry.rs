use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::command_handler::OrderCommandHandler;

/// Periodically cancels PENDING orders whose payment window elapsed.
///
/// Reads already expire orders lazily; the sweeper only bounds how long an
/// order that nobody reads stays PENDING in storage. It goes through the
/// same conditional write as the lazy path, so the two never double-cancel.
pub struct ExpirySweeper {
    handler: Arc<OrderCommandHandler>,
    interval: Duration,
    batch_size: i64,
}

impl ExpirySweeper {
    pub fn new(handler: Arc<OrderCommandHandler>, interval: Duration, batch_size: i64) -> Self {
        Self {
            handler,
            interval,
            batch_size: batch_size.max(1),
        }
    }

    /// One pass; keeps going while full batches come back.
    pub async fn sweep(&self) -> usize {
        let mut total = 0;
        loop {
            match self.handler.expire_overdue(self.batch_size).await {
                Ok(count) => {
                    total += count;
                    if (count as i64) < self.batch_size {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Expiry sweep failed");
                    break;
                }
            }
        }

        if total > 0 {
            tracing::info!(cancelled = total, "Expiry sweep cancelled overdue orders");
        }
        total
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");
            let mut ticker = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Expiry sweeper stopped");
        })
    }
}
