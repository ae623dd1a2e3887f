use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{check_seat_list, dedup_seats, hold_expiry, SeatBackend};
use crate::clock::Clock;
use crate::error::BackendError;
use crate::models::{HoldReceipt, SeatRef, SeatStatus, SeatingChart, SessionId, Tier};

#[derive(Debug, Clone, PartialEq)]
enum SeatState {
    Available,
    Held { session_id: SessionId, expires_at: DateTime<Utc> },
    Sold,
}

impl SeatState {
    fn effective_status(&self, now: DateTime<Utc>) -> SeatStatus {
        match self {
            SeatState::Available => SeatStatus::Available,
            SeatState::Held { expires_at, .. } if *expires_at > now => SeatStatus::Held,
            SeatState::Held { .. } => SeatStatus::Available,
            SeatState::Sold => SeatStatus::Sold,
        }
    }
}

struct EventInventory {
    chart: SeatingChart,
    tiers: Vec<Tier>,
    seats: HashMap<SeatRef, SeatState>,
}

/// Seed file layout for the in-memory backend.
#[derive(Debug, Deserialize)]
pub struct SeedData {
    pub events: Vec<SeedEvent>,
}

#[derive(Debug, Deserialize)]
pub struct SeedEvent {
    pub chart: SeatingChart,
    #[serde(default)]
    pub tiers: Vec<Tier>,
}

/// In-process seat-holding service.
pub struct InMemoryBackend {
    clock: Arc<dyn Clock>,
    hold_ttl: Duration,
    events: RwLock<HashMap<i64, EventInventory>>,
}

impl InMemoryBackend {
    pub fn new(clock: Arc<dyn Clock>, hold_ttl: Duration) -> Self {
        Self { clock, hold_ttl, events: RwLock::new(HashMap::new()) }
    }

    /// Registers an event. SOLD seats in the chart stay sold; everything else starts AVAILABLE.
    pub async fn insert_event(&self, chart: SeatingChart, tiers: Vec<Tier>) -> Result<(), BackendError> {
        chart.check_layout().map_err(BackendError::Validation)?;
        if let Some(bad) = tiers.iter().find(|tier| tier.event_id != chart.event_id) {
            return Err(BackendError::Validation(format!(
                "tier {} belongs to event {}, not {}",
                bad.id, bad.event_id, chart.event_id
            )));
        }

        let seats = chart
            .seats()
            .map(|seat| {
                let state = match seat.status {
                    SeatStatus::Sold => SeatState::Sold,
                    SeatStatus::Available | SeatStatus::Held => SeatState::Available,
                };
                (seat.id(), state)
            })
            .collect();

        let event_id = chart.event_id;
        self.events.write().await.insert(event_id, EventInventory { chart, tiers, seats });
        info!("Registered seating chart for event {}", event_id);
        Ok(())
    }

    pub async fn load_seed(&self, path: &Path) -> anyhow::Result<usize> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let seed: SeedData = serde_json::from_str(&raw).context("parsing seed file")?;
        let count = seed.events.len();
        for event in seed.events {
            let event_id = event.chart.event_id;
            self.insert_event(event.chart, event.tiers)
                .await
                .with_context(|| format!("seeding event {}", event_id))?;
        }
        Ok(count)
    }
}

#[async_trait]
impl SeatBackend for InMemoryBackend {
    async fn hold_seats_for_session(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<HoldReceipt, BackendError> {
        check_seat_list(seats)?;
        let seats = dedup_seats(seats);
        let now = self.clock.now();

        let mut events = self.events.write().await;
        let inventory = events.get_mut(&event_id).ok_or(BackendError::EventNotFound(event_id))?;

        // check everything before touching anything
        for seat in &seats {
            match inventory.seats.get(seat) {
                None => return Err(BackendError::UnknownSeat { event_id, seat: *seat }),
                Some(SeatState::Sold) => return Err(BackendError::Conflict { seat: *seat }),
                Some(SeatState::Held { session_id: holder, expires_at })
                    if holder != session_id && *expires_at > now =>
                {
                    return Err(BackendError::Conflict { seat: *seat });
                }
                Some(_) => {}
            }
        }

        let expires_at = hold_expiry(now, self.hold_ttl)?;
        for seat in &seats {
            inventory
                .seats
                .insert(*seat, SeatState::Held { session_id: session_id.clone(), expires_at });
        }
        debug!("Session {} holds {} seats of event {}", session_id, seats.len(), event_id);

        Ok(HoldReceipt { event_id, session_id: session_id.clone(), seats, expires_at })
    }

    async fn release_session_holds(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: Option<&[SeatRef]>,
    ) -> Result<usize, BackendError> {
        let mut events = self.events.write().await;
        let inventory = events.get_mut(&event_id).ok_or(BackendError::EventNotFound(event_id))?;

        let targets: Vec<SeatRef> = match seats {
            Some(seats) => dedup_seats(seats),
            None => inventory
                .seats
                .iter()
                .filter(|(_, state)| matches!(state, SeatState::Held { session_id: holder, .. } if holder == session_id))
                .map(|(seat, _)| *seat)
                .collect(),
        };

        let mut released = 0;
        for seat in targets {
            if let Some(state) = inventory.seats.get_mut(&seat) {
                if matches!(state, SeatState::Held { session_id: holder, .. } if holder == session_id) {
                    *state = SeatState::Available;
                    released += 1;
                }
            }
        }
        debug!("Session {} released {} seats of event {}", session_id, released, event_id);
        Ok(released)
    }

    async fn cleanup_expired_session_holds(&self, event_id: i64) -> Result<usize, BackendError> {
        let now = self.clock.now();
        let mut events = self.events.write().await;
        let inventory = events.get_mut(&event_id).ok_or(BackendError::EventNotFound(event_id))?;

        let mut reclaimed = 0;
        for state in inventory.seats.values_mut() {
            if matches!(state, SeatState::Held { expires_at, .. } if *expires_at <= now) {
                *state = SeatState::Available;
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            info!("Reclaimed {} expired holds for event {}", reclaimed, event_id);
        }
        Ok(reclaimed)
    }

    async fn get_public_seating_chart(&self, event_id: i64) -> Result<SeatingChart, BackendError> {
        let now = self.clock.now();
        let events = self.events.read().await;
        let inventory = events.get(&event_id).ok_or(BackendError::EventNotFound(event_id))?;

        let mut chart = inventory.chart.clone();
        for seat in chart.seats_mut() {
            seat.status = inventory
                .seats
                .get(&seat.id())
                .map(|state| state.effective_status(now))
                .unwrap_or(SeatStatus::Available);
        }
        Ok(chart)
    }

    async fn get_event_ticket_tiers(&self, event_id: i64) -> Result<Vec<Tier>, BackendError> {
        let events = self.events.read().await;
        events
            .get(&event_id)
            .map(|inventory| inventory.tiers.clone())
            .ok_or(BackendError::EventNotFound(event_id))
    }

    async fn complete_purchase(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<Vec<SeatRef>, BackendError> {
        check_seat_list(seats)?;
        let seats = dedup_seats(seats);
        let now = self.clock.now();

        let mut events = self.events.write().await;
        let inventory = events.get_mut(&event_id).ok_or(BackendError::EventNotFound(event_id))?;

        for seat in &seats {
            match inventory.seats.get(seat) {
                None => return Err(BackendError::UnknownSeat { event_id, seat: *seat }),
                Some(SeatState::Held { session_id: holder, expires_at })
                    if holder == session_id && *expires_at > now => {}
                Some(_) => return Err(BackendError::NotHeld { seat: *seat }),
            }
        }
        for seat in &seats {
            inventory.seats.insert(*seat, SeatState::Sold);
        }
        info!("Session {} bought {} seats of event {}", session_id, seats.len(), event_id);
        Ok(seats)
    }

    async fn known_events(&self) -> Result<Vec<i64>, BackendError> {
        let mut ids: Vec<i64> = self.events.read().await.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{ContainerType, Seat, SeatType, Section, Table, TableShape};
    use chrono::TimeZone;

    fn chart(event_id: i64) -> SeatingChart {
        let seats = (1..=4)
            .map(|n| Seat { table_id: 1, seat_number: n, seat_type: SeatType::Standard, status: SeatStatus::Available })
            .collect();
        SeatingChart {
            id: 1,
            event_id,
            name: "Hall".to_string(),
            sections: vec![Section {
                id: 1,
                name: "Main".to_string(),
                color: "#000000".to_string(),
                container_type: ContainerType::Tables,
                tier_id: None,
                tables: vec![Table {
                    id: 1,
                    table_number: 1,
                    shape: TableShape::Round,
                    x: 0.0,
                    y: 0.0,
                    width: 40.0,
                    height: 40.0,
                    capacity: 4,
                    seats,
                }],
            }],
        }
    }

    async fn backend() -> (Arc<ManualClock>, InMemoryBackend) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let backend = InMemoryBackend::new(clock.clone(), Duration::minutes(5));
        backend.insert_event(chart(7), vec![]).await.unwrap();
        (clock, backend)
    }

    #[tokio::test]
    async fn rehold_by_same_session_extends_expiry() {
        let (clock, backend) = backend().await;
        let me = SessionId::from("me");
        let seat = [SeatRef::new(1, 1)];

        let first = backend.hold_seats_for_session(7, &me, &seat).await.unwrap();
        clock.advance(Duration::minutes(3));
        let second = backend.hold_seats_for_session(7, &me, &seat).await.unwrap();

        assert_eq!(second.expires_at - first.expires_at, Duration::minutes(3));
        clock.advance(Duration::minutes(3));
        assert_eq!(backend.cleanup_expired_session_holds(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_foreign_hold_does_not_block() {
        let (clock, backend) = backend().await;
        let seat = [SeatRef::new(1, 2)];
        backend.hold_seats_for_session(7, &SessionId::from("a"), &seat).await.unwrap();

        clock.advance(Duration::minutes(5));
        let chart = backend.get_public_seating_chart(7).await.unwrap();
        assert_eq!(chart.status_of(seat[0]), Some(SeatStatus::Available));
        assert!(backend.hold_seats_for_session(7, &SessionId::from("b"), &seat).await.is_ok());
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let (_, backend) = backend().await;
        backend.hold_seats_for_session(7, &SessionId::from("a"), &[SeatRef::new(1, 3)]).await.unwrap();

        let err = backend
            .hold_seats_for_session(7, &SessionId::from("b"), &[SeatRef::new(1, 2), SeatRef::new(1, 3)])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict { seat } if seat == SeatRef::new(1, 3)));

        let chart = backend.get_public_seating_chart(7).await.unwrap();
        assert_eq!(chart.status_of(SeatRef::new(1, 2)), Some(SeatStatus::Available));
    }

    #[tokio::test]
    async fn purchase_requires_a_live_hold() {
        let (clock, backend) = backend().await;
        let me = SessionId::from("me");
        let seat = [SeatRef::new(1, 4)];

        assert!(matches!(
            backend.complete_purchase(7, &me, &seat).await,
            Err(BackendError::NotHeld { .. })
        ));

        backend.hold_seats_for_session(7, &me, &seat).await.unwrap();
        clock.advance(Duration::minutes(1));
        assert_eq!(backend.complete_purchase(7, &me, &seat).await.unwrap(), seat.to_vec());

        // sold is terminal
        assert_eq!(backend.release_session_holds(7, &me, Some(&seat)).await.unwrap(), 0);
        assert!(matches!(
            backend.hold_seats_for_session(7, &me, &seat).await,
            Err(BackendError::Conflict { .. })
        ));
        let chart = backend.get_public_seating_chart(7).await.unwrap();
        assert_eq!(chart.status_of(seat[0]), Some(SeatStatus::Sold));
    }

    #[tokio::test]
    async fn unknown_event_and_seat_are_reported() {
        let (_, backend) = backend().await;
        let me = SessionId::from("me");
        assert!(matches!(
            backend.hold_seats_for_session(99, &me, &[SeatRef::new(1, 1)]).await,
            Err(BackendError::EventNotFound(99))
        ));
        assert!(matches!(
            backend.hold_seats_for_session(7, &me, &[SeatRef::new(1, 9)]).await,
            Err(BackendError::UnknownSeat { .. })
        ));
        assert!(matches!(
            backend.hold_seats_for_session(7, &me, &[]).await,
            Err(BackendError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn rejects_chart_with_wrong_capacity() {
        let (_, backend) = backend().await;
        let mut bad = chart(8);
        bad.sections[0].tables[0].capacity = 6;
        assert!(matches!(backend.insert_event(bad, vec![]).await, Err(BackendError::Validation(_))));
        assert_eq!(backend.known_events().await.unwrap(), vec![7]);
    }
}
