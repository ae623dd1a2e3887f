#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use seat_holds::backend::{InMemoryBackend, SeatBackend};
use seat_holds::client::ClientConfig;
use seat_holds::clock::ManualClock;
use seat_holds::error::BackendError;
use seat_holds::models::{
    ContainerType, HoldReceipt, Seat, SeatRef, SeatStatus, SeatType, SeatingChart, Section, SessionId, Table,
    TableShape, Tier,
};

pub const EVENT_ID: i64 = 1;
pub const HOLD_TTL_MINUTES: i64 = 5;

/// Floor section (tier 1, two round tables of 4) and VIP section (tier 2, one rectangle of 6).
pub fn gala_chart() -> SeatingChart {
    fn seats(table_id: i64, capacity: u32, seat_type: SeatType) -> Vec<Seat> {
        (1..=capacity as i32)
            .map(|n| Seat {
                table_id,
                seat_number: n,
                seat_type: if n == 1 && table_id == 11 { SeatType::Wheelchair } else { seat_type },
                status: SeatStatus::Available,
            })
            .collect()
    }

    fn table(id: i64, table_number: i32, shape: TableShape, x: f64, capacity: u32, seat_type: SeatType) -> Table {
        Table {
            id,
            table_number,
            shape,
            x,
            y: 50.0,
            width: 60.0,
            height: 60.0,
            capacity,
            seats: seats(id, capacity, seat_type),
        }
    }

    SeatingChart {
        id: 100,
        event_id: EVENT_ID,
        name: "Spring Gala".to_string(),
        sections: vec![
            Section {
                id: 1,
                name: "Floor".to_string(),
                color: "#3366cc".to_string(),
                container_type: ContainerType::Tables,
                tier_id: Some(1),
                tables: vec![
                    table(11, 1, TableShape::Round, 50.0, 4, SeatType::Standard),
                    table(12, 2, TableShape::Round, 150.0, 4, SeatType::Standard),
                ],
            },
            Section {
                id: 2,
                name: "VIP".to_string(),
                color: "#cc9933".to_string(),
                container_type: ContainerType::Tables,
                tier_id: Some(2),
                tables: vec![table(21, 3, TableShape::Rectangle, 250.0, 6, SeatType::Vip)],
            },
        ],
    }
}

/// Tier A $40, tier B $45.
pub fn gala_tiers() -> Vec<Tier> {
    vec![
        Tier { id: 1, event_id: EVENT_ID, name: "A".to_string(), price_cents: 4000, early_bird: None },
        Tier { id: 2, event_id: EVENT_ID, name: "B".to_string(), price_cents: 4500, early_bird: None },
    ]
}

pub fn seat(table_id: i64, seat_number: i32) -> SeatRef {
    SeatRef::new(table_id, seat_number)
}

pub async fn memory_backend() -> (Arc<ManualClock>, Arc<InMemoryBackend>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 19, 0, 0).unwrap()));
    let backend = Arc::new(InMemoryBackend::new(clock.clone(), Duration::minutes(HOLD_TTL_MINUTES)));
    backend.insert_event(gala_chart(), gala_tiers()).await.unwrap();
    (clock, backend)
}

pub fn client_config(clock: Arc<ManualClock>) -> ClientConfig {
    ClientConfig { sweep_interval: std::time::Duration::from_secs(3600), clock }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Hold(SessionId, Vec<SeatRef>),
    Release(SessionId, Option<Vec<SeatRef>>),
    Cleanup(i64),
    Purchase(SessionId, Vec<SeatRef>),
}

/// Wraps a backend, records every state-changing call and can be told to fail releases.
pub struct RecordingBackend {
    inner: Arc<dyn SeatBackend>,
    calls: Mutex<Vec<Call>>,
    fail_releases: AtomicBool,
}

impl RecordingBackend {
    pub fn new(inner: Arc<dyn SeatBackend>) -> Self {
        Self { inner, calls: Mutex::new(Vec::new()), fail_releases: AtomicBool::new(false) }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cleanup_calls(&self) -> usize {
        self.calls().iter().filter(|call| matches!(call, Call::Cleanup(_))).count()
    }

    pub fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SeatBackend for RecordingBackend {
    async fn hold_seats_for_session(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<HoldReceipt, BackendError> {
        self.record(Call::Hold(session_id.clone(), seats.to_vec()));
        self.inner.hold_seats_for_session(event_id, session_id, seats).await
    }

    async fn release_session_holds(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: Option<&[SeatRef]>,
    ) -> Result<usize, BackendError> {
        self.record(Call::Release(session_id.clone(), seats.map(|s| s.to_vec())));
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection reset".to_string()));
        }
        self.inner.release_session_holds(event_id, session_id, seats).await
    }

    async fn cleanup_expired_session_holds(&self, event_id: i64) -> Result<usize, BackendError> {
        self.record(Call::Cleanup(event_id));
        self.inner.cleanup_expired_session_holds(event_id).await
    }

    async fn get_public_seating_chart(&self, event_id: i64) -> Result<SeatingChart, BackendError> {
        self.inner.get_public_seating_chart(event_id).await
    }

    async fn get_event_ticket_tiers(&self, event_id: i64) -> Result<Vec<Tier>, BackendError> {
        self.inner.get_event_ticket_tiers(event_id).await
    }

    async fn complete_purchase(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<Vec<SeatRef>, BackendError> {
        self.record(Call::Purchase(session_id.clone(), seats.to_vec()));
        self.inner.complete_purchase(event_id, session_id, seats).await
    }
}
