use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::backend::SeatBackend;
use crate::services::cleanup::sweep_period;

/// Periodic expiry sweep for one event, owned by a client session.
pub struct ExpirySweeper {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Starts the loop. The first sweep happens one `period` after start.
    /// Periods below `MIN_SWEEP_PERIOD` are raised to it.
    pub fn spawn(backend: Arc<dyn SeatBackend>, event_id: i64, period: Duration) -> Self {
        let period = sweep_period(period);
        let (tx, mut rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = interval.tick() => {
                        match backend.cleanup_expired_session_holds(event_id).await {
                            Ok(reclaimed) => debug!("Sweep for event {} reclaimed {} holds", event_id, reclaimed),
                            Err(e) => warn!("Sweep for event {} failed: {}", event_id, e),
                        }
                    }
                }
            }
            debug!("Expiry sweeper for event {} stopped", event_id);
        });

        Self { shutdown: Some(tx), task: Some(task) }
    }

    /// Stops the loop and waits for an in-flight sweep to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Expiry sweeper ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
