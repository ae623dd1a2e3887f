//! Session-side seat hold client.
//!
//! One `SeatHoldClient` per browsing session. It owns the session id, the last
//! chart snapshot and the local selection, and it only changes the selection
//! after the seat-holding service has answered: a seat enters the selection
//! when its hold is granted and leaves it when its release is confirmed.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::SeatBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::BackendError;
use crate::models::{HoldReceipt, SeatRef, SeatStatus, SeatingChart, SelectedSeat, SessionId, Tier};
use crate::pricing::resolve_section_price;

pub mod selection;
pub mod sweeper;

pub use selection::Selection;
pub use sweeper::ExpirySweeper;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Failures reported to the user. `Display` is the message to show.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Seat may have been taken. Please choose a different seat.")]
    SeatTaken { seat: Option<SeatRef> },

    #[error("Your hold on seat {seat} is no longer active. Please select it again.")]
    NotHeld { seat: SeatRef },

    #[error("{0}")]
    Validation(String),

    #[error("Something went wrong. Please try again.")]
    Transport(#[source] BackendError),
}

impl From<BackendError> for ClientError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict { seat } => ClientError::SeatTaken { seat: Some(seat) },
            BackendError::NotHeld { seat } => ClientError::NotHeld { seat },
            BackendError::Validation(message) => ClientError::Validation(message),
            BackendError::UnknownSeat { seat, .. } => {
                ClientError::Validation(format!("Seat {} is not part of this seating chart.", seat))
            }
            BackendError::EventNotFound(_) => ClientError::Validation("This event is no longer available.".to_string()),
            other => ClientError::Transport(other),
        }
    }
}

impl ClientError {
    /// Conflicts and transport failures leave the session usable; the user may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::SeatTaken { .. } | ClientError::NotHeld { .. } | ClientError::Transport(_) => true,
            ClientError::Validation(_) => false,
        }
    }
}

fn log_failure(action: &str, session_id: &SessionId, err: &BackendError) {
    match err {
        BackendError::Conflict { .. } | BackendError::NotHeld { .. } => {
            warn!("{} for session {} rejected: {}", action, session_id, err)
        }
        _ => error!("{} for session {} failed: {:?}", action, session_id, err),
    }
}

#[derive(Clone)]
pub struct ClientConfig {
    pub sweep_interval: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { sweep_interval: DEFAULT_SWEEP_INTERVAL, clock: Arc::new(SystemClock) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatToggle {
    Selected,
    Deselected,
}

/// Result of holding a whole table seat by seat.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableHoldOutcome {
    pub held: Vec<SeatRef>,
    pub rejected: Vec<SeatRef>,
}

impl TableHoldOutcome {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

pub struct SeatHoldClient {
    backend: Arc<dyn SeatBackend>,
    clock: Arc<dyn Clock>,
    event_id: i64,
    session_id: SessionId,
    chart: SeatingChart,
    tiers: Vec<Tier>,
    selection: Selection,
    sweeper: Option<ExpirySweeper>,
    torn_down: bool,
}

impl SeatHoldClient {
    /// Opens a new session for `event_id` with a freshly generated session id.
    pub async fn connect(
        backend: Arc<dyn SeatBackend>,
        event_id: i64,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        Self::connect_with_session(backend, event_id, SessionId::generate(), config).await
    }

    pub async fn connect_with_session(
        backend: Arc<dyn SeatBackend>,
        event_id: i64,
        session_id: SessionId,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        if config.sweep_interval.is_zero() {
            return Err(ClientError::Validation("Sweep interval must be greater than zero.".to_string()));
        }
        let (chart, tiers) = load_snapshot(backend.as_ref(), event_id, &session_id).await?;
        let sweeper = ExpirySweeper::spawn(backend.clone(), event_id, config.sweep_interval);
        info!("Session {} opened for event {}", session_id, event_id);

        Ok(Self {
            backend,
            clock: config.clock,
            event_id,
            session_id,
            chart,
            tiers,
            selection: Selection::new(),
            sweeper: Some(sweeper),
            torn_down: false,
        })
    }

    pub fn event_id(&self) -> i64 {
        self.event_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Last fetched chart. Statuses may be stale.
    pub fn chart(&self) -> &SeatingChart {
        &self.chart
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn total_price_cents(&self) -> i64 {
        self.selection.total_price_cents()
    }

    /// Reloads chart and tiers. Never touches the selection.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let (chart, tiers) = load_snapshot(self.backend.as_ref(), self.event_id, &self.session_id).await?;
        self.chart = chart;
        self.tiers = tiers;
        Ok(())
    }

    fn selected_seat(&self, seat: SeatRef, now: DateTime<Utc>) -> Option<SelectedSeat> {
        self.chart.locate(seat).map(|(section, table, s)| SelectedSeat {
            table_id: table.id,
            table_number: table.table_number,
            seat_number: s.seat_number,
            seat_type: s.seat_type,
            price_cents: resolve_section_price(section, &self.tiers, now),
        })
    }

    /// Holds `seats` as one request. Either every seat joins the selection or none does.
    pub async fn request_hold(&mut self, seats: &[SeatRef]) -> Result<HoldReceipt, ClientError> {
        if seats.is_empty() {
            return Err(ClientError::Validation("Select at least one seat.".to_string()));
        }

        let now = self.clock.now();
        let mut picked = Vec::with_capacity(seats.len());
        for seat in seats {
            let selected = self.selected_seat(*seat, now).ok_or_else(|| {
                ClientError::Validation(format!("Seat {} is not part of this seating chart.", seat))
            })?;
            picked.push(selected);
        }

        match self
            .backend
            .hold_seats_for_session(self.event_id, &self.session_id, seats)
            .await
        {
            Ok(receipt) => {
                for seat in picked {
                    self.selection.insert(seat);
                }
                debug!(
                    "Session {} now holds {} seats until {}",
                    self.session_id,
                    self.selection.len(),
                    receipt.expires_at
                );
                Ok(receipt)
            }
            Err(e) => {
                log_failure("Hold", &self.session_id, &e);
                Err(e.into())
            }
        }
    }

    pub async fn select_seat(&mut self, seat: SeatRef) -> Result<HoldReceipt, ClientError> {
        self.request_hold(&[seat]).await
    }

    /// Click handler of the chart: selects a free seat, deselects a selected one.
    pub async fn toggle_seat(&mut self, seat: SeatRef) -> Result<SeatToggle, ClientError> {
        if self.selection.contains(&seat) {
            self.deselect(seat).await?;
            Ok(SeatToggle::Deselected)
        } else {
            self.select_seat(seat).await?;
            Ok(SeatToggle::Selected)
        }
    }

    /// Releases the hold, then drops the seat from the selection.
    ///
    /// Returns `false` without a round trip when the seat was not selected.
    /// When the release fails the seat stays selected.
    pub async fn deselect(&mut self, seat: SeatRef) -> Result<bool, ClientError> {
        if !self.selection.contains(&seat) {
            return Ok(false);
        }

        match self
            .backend
            .release_session_holds(self.event_id, &self.session_id, Some(&[seat]))
            .await
        {
            Ok(_) => {
                self.selection.remove(&seat);
                Ok(true)
            }
            Err(e) => {
                log_failure("Release", &self.session_id, &e);
                Err(e.into())
            }
        }
    }

    /// Releases every hold of the session and empties the selection.
    pub async fn release_all(&mut self) -> Result<usize, ClientError> {
        match self
            .backend
            .release_session_holds(self.event_id, &self.session_id, None)
            .await
        {
            Ok(released) => {
                self.selection.clear();
                Ok(released)
            }
            Err(e) => {
                log_failure("Release all", &self.session_id, &e);
                Err(e.into())
            }
        }
    }

    /// Holds every seat of a table that the snapshot shows as available.
    ///
    /// Seats are requested one at a time, so the outcome can be partial; seats
    /// that were granted stay selected.
    pub async fn hold_table(&mut self, table_id: i64) -> Result<TableHoldOutcome, ClientError> {
        let table = self
            .chart
            .table(table_id)
            .ok_or_else(|| ClientError::Validation(format!("Table {} is not part of this seating chart.", table_id)))?;

        let candidates: Vec<SeatRef> = table
            .seats
            .iter()
            .filter(|seat| seat.status == SeatStatus::Available)
            .map(|seat| seat.id())
            .filter(|seat| !self.selection.contains(seat))
            .collect();
        if candidates.is_empty() {
            return Err(ClientError::Validation("No available seats at this table.".to_string()));
        }

        let mut outcome = TableHoldOutcome::default();
        for seat in candidates {
            match self.request_hold(&[seat]).await {
                Ok(_) => outcome.held.push(seat),
                Err(_) => outcome.rejected.push(seat),
            }
        }
        if !outcome.is_complete() {
            warn!(
                "Session {} got {} of {} seats at table {}",
                self.session_id,
                outcome.held.len(),
                outcome.held.len() + outcome.rejected.len(),
                table_id
            );
        }
        Ok(outcome)
    }

    /// Ends the session: stops the sweeper and releases everything it holds.
    pub async fn teardown(mut self) -> Result<usize, ClientError> {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await;
        }
        let released = self.release_all().await?;
        self.torn_down = true;
        info!("Session {} closed, {} holds released", self.session_id, released);
        Ok(released)
    }
}

impl Drop for SeatHoldClient {
    fn drop(&mut self) {
        if self.torn_down || self.selection.is_empty() {
            return;
        }
        // Abandoned without teardown: release in the background if a runtime is around.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let backend = self.backend.clone();
            let session_id = self.session_id.clone();
            let event_id = self.event_id;
            handle.spawn(async move {
                if let Err(e) = backend.release_session_holds(event_id, &session_id, None).await {
                    warn!("Background release for abandoned session {} failed: {}", session_id, e);
                }
            });
        }
    }
}

async fn load_snapshot(
    backend: &dyn SeatBackend,
    event_id: i64,
    session_id: &SessionId,
) -> Result<(SeatingChart, Vec<Tier>), ClientError> {
    let chart = backend
        .get_public_seating_chart(event_id)
        .await
        .inspect_err(|e| log_failure("Chart load", session_id, e))?;
    let tiers = backend
        .get_event_ticket_tiers(event_id)
        .await
        .inspect_err(|e| log_failure("Tier load", session_id, e))?;
    Ok((chart, tiers))
}
