use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::SeatBackend;

/// Shortest period a sweep loop runs at; tokio intervals cannot be zero.
pub const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

pub(crate) fn sweep_period(period: Duration) -> Duration {
    if period < MIN_SWEEP_PERIOD {
        warn!("Sweep period {:?} is too short, using {:?}", period, MIN_SWEEP_PERIOD);
        return MIN_SWEEP_PERIOD;
    }
    period
}

/// Server-side expiry sweep over every event the backend knows.
pub struct CleanupService {
    backend: Arc<dyn SeatBackend>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub events: usize,
    pub reclaimed: usize,
    pub failed: usize,
}

impl CleanupService {
    pub fn new(backend: Arc<dyn SeatBackend>) -> Self {
        Self { backend }
    }

    /// Sweeps all events concurrently. A failing event does not stop the others.
    pub async fn run_once(&self) -> SweepReport {
        let events = match self.backend.known_events().await {
            Ok(events) => events,
            Err(e) => {
                error!("Cannot list events to sweep: {:?}", e);
                return SweepReport { failed: 1, ..SweepReport::default() };
            }
        };

        let results = join_all(events.iter().map(|event_id| async move {
            (*event_id, self.backend.cleanup_expired_session_holds(*event_id).await)
        }))
        .await;

        let mut report = SweepReport { events: events.len(), ..SweepReport::default() };
        for (event_id, result) in results {
            match result {
                Ok(reclaimed) => report.reclaimed += reclaimed,
                Err(e) => {
                    warn!("Sweep of event {} failed: {}", event_id, e);
                    report.failed += 1;
                }
            }
        }

        if report.reclaimed > 0 {
            info!("Sweep reclaimed {} holds across {} events", report.reclaimed, report.events);
        }
        report
    }

    /// Runs `run_once` every `period` until the task is aborted.
    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        let period = sweep_period(period);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                self.run_once().await;
            }
        })
    }
}
