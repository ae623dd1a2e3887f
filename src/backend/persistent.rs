//! persistent.rs
//!
//! Production seat-holding service. Postgres keeps the layout, tiers and sold
//! seats; Redis keeps the holds.
//!
//! Redis layout per event:
//! - `holders:{event}`            hash   seat -> session
//! - `holds:{event}`              zset   seat scored by expiry (unix ms)
//! - `session:{event}:{session}`  set    seats of one session
//! - `sold:{event}`               set    mirror of sold seats
//!
//! Every state change is a single Lua script, so the check and the write
//! happen atomically and at most one session holds a seat.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::Script;
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{check_seat_list, dedup_seats, hold_expiry, SeatBackend};
use crate::clock::Clock;
use crate::database::Database;
use crate::error::BackendError;
use crate::models::{
    EarlyBird, HoldReceipt, Seat, SeatRef, SeatStatus, SeatingChart, Section, SessionId, Table, Tier,
};
use crate::redis_client::RedisClient;

const HOLD_SCRIPT: &str = r#"
local session = ARGV[1]
local now = tonumber(ARGV[2])
for i = 5, #ARGV do
  local m = ARGV[i]
  if redis.call('SISMEMBER', KEYS[3], m) == 1 then return {'sold', m} end
  local holder = redis.call('HGET', KEYS[1], m)
  if holder and holder ~= session then
    local score = redis.call('ZSCORE', KEYS[2], m)
    if score and tonumber(score) > now then return {'held', m} end
  end
end
for i = 5, #ARGV do
  local m = ARGV[i]
  local holder = redis.call('HGET', KEYS[1], m)
  if holder and holder ~= session then
    redis.call('SREM', ARGV[4] .. holder, m)
  end
  redis.call('HSET', KEYS[1], m, session)
  redis.call('ZADD', KEYS[2], ARGV[3], m)
  redis.call('SADD', KEYS[4], m)
end
return {'ok', ''}
"#;

const RELEASE_SCRIPT: &str = r#"
local session = ARGV[1]
local members = {}
if #ARGV > 1 then
  for i = 2, #ARGV do members[#members + 1] = ARGV[i] end
else
  members = redis.call('SMEMBERS', KEYS[3])
end
local released = 0
for _, m in ipairs(members) do
  if redis.call('HGET', KEYS[1], m) == session then
    redis.call('HDEL', KEYS[1], m)
    redis.call('ZREM', KEYS[2], m)
    released = released + 1
  end
  redis.call('SREM', KEYS[3], m)
end
return released
"#;

const CLEANUP_SCRIPT: &str = r#"
local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, m in ipairs(expired) do
  local holder = redis.call('HGET', KEYS[1], m)
  if holder then
    redis.call('SREM', ARGV[2] .. holder, m)
    redis.call('HDEL', KEYS[1], m)
  end
  redis.call('ZREM', KEYS[2], m)
end
return #expired
"#;

const PURCHASE_SCRIPT: &str = r#"
local now = tonumber(ARGV[2])
for i = 3, #ARGV do
  local m = ARGV[i]
  if redis.call('HGET', KEYS[1], m) ~= ARGV[1] then return {'not_held', m} end
  local score = redis.call('ZSCORE', KEYS[2], m)
  if not score or tonumber(score) <= now then return {'not_held', m} end
end
for i = 3, #ARGV do
  local m = ARGV[i]
  redis.call('SADD', KEYS[3], m)
  redis.call('HDEL', KEYS[1], m)
  redis.call('ZREM', KEYS[2], m)
  redis.call('SREM', KEYS[4], m)
end
return {'ok', ''}
"#;

fn holders_key(event_id: i64) -> String {
    format!("holders:{}", event_id)
}

fn holds_key(event_id: i64) -> String {
    format!("holds:{}", event_id)
}

fn sold_key(event_id: i64) -> String {
    format!("sold:{}", event_id)
}

fn session_prefix(event_id: i64) -> String {
    format!("session:{}:", event_id)
}

fn session_key(event_id: i64, session_id: &SessionId) -> String {
    format!("{}{}", session_prefix(event_id), session_id)
}

fn parse_member(member: &str) -> Result<SeatRef, BackendError> {
    member.parse().map_err(BackendError::InvalidData)
}

fn parse_column<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T, BackendError> {
    value.parse().map_err(BackendError::InvalidData)
}

/// Maps a `{outcome, seat}` script reply.
fn script_outcome(reply: Vec<String>, on_seat: impl Fn(SeatRef) -> BackendError) -> Result<(), BackendError> {
    match reply.first().map(String::as_str) {
        Some("ok") => Ok(()),
        Some(_) => {
            let member = reply.get(1).map(String::as_str).unwrap_or_default();
            Err(on_seat(parse_member(member)?))
        }
        None => Err(BackendError::InvalidData("empty script reply".to_string())),
    }
}

struct Scripts {
    hold: Script,
    release: Script,
    cleanup: Script,
    purchase: Script,
}

#[derive(FromRow)]
struct ChartRow {
    id: i64,
    event_id: i64,
    name: String,
}

#[derive(FromRow)]
struct SectionRow {
    id: i64,
    name: String,
    color: String,
    container_type: String,
    tier_id: Option<i64>,
}

#[derive(FromRow)]
struct TableRow {
    id: i64,
    section_id: i64,
    table_number: i32,
    shape: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    capacity: i32,
}

#[derive(FromRow)]
struct SeatRow {
    table_id: i64,
    seat_number: i32,
    seat_type: String,
    status: String,
}

#[derive(FromRow)]
struct TierRow {
    id: i64,
    event_id: i64,
    name: String,
    price_cents: i64,
    early_bird_price_cents: Option<i64>,
    early_bird_ends_at: Option<DateTime<Utc>>,
}

impl From<TierRow> for Tier {
    fn from(row: TierRow) -> Self {
        let early_bird = match (row.early_bird_price_cents, row.early_bird_ends_at) {
            (Some(price_cents), Some(ends_at)) => Some(EarlyBird { price_cents, ends_at }),
            _ => None,
        };
        Tier { id: row.id, event_id: row.event_id, name: row.name, price_cents: row.price_cents, early_bird }
    }
}

pub struct PersistentBackend {
    db: Database,
    redis: RedisClient,
    clock: Arc<dyn Clock>,
    hold_ttl: Duration,
    scripts: Scripts,
}

impl PersistentBackend {
    pub fn new(db: Database, redis: RedisClient, clock: Arc<dyn Clock>, hold_ttl: Duration) -> Self {
        Self {
            db,
            redis,
            clock,
            hold_ttl,
            scripts: Scripts {
                hold: Script::new(HOLD_SCRIPT),
                release: Script::new(RELEASE_SCRIPT),
                cleanup: Script::new(CLEANUP_SCRIPT),
                purchase: Script::new(PURCHASE_SCRIPT),
            },
        }
    }

    /// Copies sold seats from Postgres into the Redis mirror the hold script checks.
    pub async fn warmup(&self) -> Result<usize, BackendError> {
        info!("Starting sold-seat warmup...");
        let rows: Vec<(i64, i64, i32)> = sqlx::query_as(
            r#"
            SELECT c.event_id, s.table_id, s.seat_number
            FROM chart_seats s
            JOIN chart_tables t ON t.id = s.table_id
            JOIN chart_sections sec ON sec.id = t.section_id
            JOIN seating_charts c ON c.id = sec.chart_id
            WHERE s.status = 'SOLD'
            "#,
        )
        .fetch_all(&self.db.pool)
        .await?;

        if rows.is_empty() {
            info!("Sold-seat warmup done, nothing to copy");
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        for (event_id, table_id, seat_number) in &rows {
            pipe.sadd(sold_key(*event_id), SeatRef::new(*table_id, *seat_number).to_string())
                .ignore();
        }
        let mut conn = self.redis.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;

        info!("Sold-seat warmup done, {} seats mirrored", rows.len());
        Ok(rows.len())
    }

    /// Stores the chart and tiers of an event that is not stored yet.
    ///
    /// Returns `false` and leaves everything untouched when the event already
    /// exists, so restarting with the same seed keeps recorded sales.
    pub async fn import_event(&self, chart: &SeatingChart, tiers: &[Tier]) -> Result<bool, BackendError> {
        chart.check_layout().map_err(BackendError::Validation)?;
        if self.event_exists(chart.event_id).await? {
            debug!("Event {} already stored, skipping import", chart.event_id);
            return Ok(false);
        }

        let mut tx = self.db.pool.begin().await?;

        for tier in tiers {
            sqlx::query(
                "INSERT INTO ticket_tiers (id, event_id, name, price_cents, early_bird_price_cents, early_bird_ends_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(tier.id)
            .bind(tier.event_id)
            .bind(&tier.name)
            .bind(tier.price_cents)
            .bind(tier.early_bird.as_ref().map(|e| e.price_cents))
            .bind(tier.early_bird.as_ref().map(|e| e.ends_at))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT INTO seating_charts (id, event_id, name) VALUES ($1, $2, $3)")
            .bind(chart.id)
            .bind(chart.event_id)
            .bind(&chart.name)
            .execute(&mut *tx)
            .await?;

        for (position, section) in chart.sections.iter().enumerate() {
            sqlx::query(
                "INSERT INTO chart_sections (id, chart_id, name, color, container_type, tier_id, position)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(section.id)
            .bind(chart.id)
            .bind(&section.name)
            .bind(&section.color)
            .bind(section.container_type.as_str())
            .bind(section.tier_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;

            for table in &section.tables {
                sqlx::query(
                    "INSERT INTO chart_tables (id, section_id, table_number, shape, x, y, width, height, capacity)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                )
                .bind(table.id)
                .bind(section.id)
                .bind(table.table_number)
                .bind(table.shape.as_str())
                .bind(table.x)
                .bind(table.y)
                .bind(table.width)
                .bind(table.height)
                .bind(table.capacity as i32)
                .execute(&mut *tx)
                .await?;

                for seat in &table.seats {
                    let status = match seat.status {
                        SeatStatus::Sold => SeatStatus::Sold,
                        SeatStatus::Available | SeatStatus::Held => SeatStatus::Available,
                    };
                    sqlx::query(
                        "INSERT INTO chart_seats (table_id, seat_number, seat_type, status) VALUES ($1, $2, $3, $4)",
                    )
                    .bind(table.id)
                    .bind(seat.seat_number)
                    .bind(seat.seat_type.as_str())
                    .bind(status.as_str())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        info!("Imported seating chart {} for event {}", chart.id, chart.event_id);
        Ok(true)
    }

    async fn event_exists(&self, event_id: i64) -> Result<bool, BackendError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM seating_charts WHERE event_id = $1)")
            .bind(event_id)
            .fetch_one(&self.db.pool)
            .await?;
        Ok(exists)
    }

    /// Fails with `UnknownSeat` for the first requested seat missing from the event's chart.
    async fn ensure_seats_exist(&self, event_id: i64, seats: &[SeatRef]) -> Result<(), BackendError> {
        if !self.event_exists(event_id).await? {
            return Err(BackendError::EventNotFound(event_id));
        }

        let table_ids: Vec<i64> = seats.iter().map(|s| s.table_id).collect();
        let numbers: Vec<i32> = seats.iter().map(|s| s.seat_number).collect();
        let found: Vec<(i64, i32)> = sqlx::query_as(
            r#"
            SELECT s.table_id, s.seat_number
            FROM chart_seats s
            JOIN chart_tables t ON t.id = s.table_id
            JOIN chart_sections sec ON sec.id = t.section_id
            JOIN seating_charts c ON c.id = sec.chart_id
            WHERE c.event_id = $1
              AND (s.table_id, s.seat_number) IN (SELECT * FROM UNNEST($2::BIGINT[], $3::INT[]))
            "#,
        )
        .bind(event_id)
        .bind(&table_ids)
        .bind(&numbers)
        .fetch_all(&self.db.pool)
        .await?;

        let found: HashSet<SeatRef> = found.into_iter().map(|(t, n)| SeatRef::new(t, n)).collect();
        match seats.iter().find(|seat| !found.contains(seat)) {
            Some(missing) => Err(BackendError::UnknownSeat { event_id, seat: *missing }),
            None => Ok(()),
        }
    }

    async fn load_chart(&self, event_id: i64) -> Result<SeatingChart, BackendError> {
        let chart: ChartRow = sqlx::query_as("SELECT id, event_id, name FROM seating_charts WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(BackendError::EventNotFound(event_id))?;

        let sections: Vec<SectionRow> = sqlx::query_as(
            "SELECT id, name, color, container_type, tier_id FROM chart_sections
             WHERE chart_id = $1 ORDER BY position, id",
        )
        .bind(chart.id)
        .fetch_all(&self.db.pool)
        .await?;

        let tables: Vec<TableRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.section_id, t.table_number, t.shape, t.x, t.y, t.width, t.height, t.capacity
            FROM chart_tables t
            JOIN chart_sections sec ON sec.id = t.section_id
            WHERE sec.chart_id = $1
            ORDER BY t.table_number, t.id
            "#,
        )
        .bind(chart.id)
        .fetch_all(&self.db.pool)
        .await?;

        let seats: Vec<SeatRow> = sqlx::query_as(
            r#"
            SELECT s.table_id, s.seat_number, s.seat_type, s.status
            FROM chart_seats s
            JOIN chart_tables t ON t.id = s.table_id
            JOIN chart_sections sec ON sec.id = t.section_id
            WHERE sec.chart_id = $1
            ORDER BY s.table_id, s.seat_number
            "#,
        )
        .bind(chart.id)
        .fetch_all(&self.db.pool)
        .await?;

        let mut seats_by_table: HashMap<i64, Vec<Seat>> = HashMap::new();
        for row in seats {
            seats_by_table.entry(row.table_id).or_default().push(Seat {
                table_id: row.table_id,
                seat_number: row.seat_number,
                seat_type: parse_column(&row.seat_type)?,
                status: parse_column(&row.status)?,
            });
        }

        let mut tables_by_section: HashMap<i64, Vec<Table>> = HashMap::new();
        for row in tables {
            tables_by_section.entry(row.section_id).or_default().push(Table {
                id: row.id,
                table_number: row.table_number,
                shape: parse_column(&row.shape)?,
                x: row.x,
                y: row.y,
                width: row.width,
                height: row.height,
                capacity: u32::try_from(row.capacity)
                    .map_err(|_| BackendError::InvalidData(format!("table {} has negative capacity", row.id)))?,
                seats: seats_by_table.remove(&row.id).unwrap_or_default(),
            });
        }

        let sections = sections
            .into_iter()
            .map(|row| {
                Ok(Section {
                    id: row.id,
                    name: row.name,
                    color: row.color,
                    container_type: parse_column(&row.container_type)?,
                    tier_id: row.tier_id,
                    tables: tables_by_section.remove(&row.id).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        Ok(SeatingChart { id: chart.id, event_id: chart.event_id, name: chart.name, sections })
    }
}

#[async_trait]
impl SeatBackend for PersistentBackend {
    async fn hold_seats_for_session(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<HoldReceipt, BackendError> {
        check_seat_list(seats)?;
        let seats = dedup_seats(seats);
        self.ensure_seats_exist(event_id, &seats).await?;

        let now = self.clock.now();
        let expires_at = hold_expiry(now, self.hold_ttl)?;

        let mut invocation = self.scripts.hold.prepare_invoke();
        invocation
            .key(holders_key(event_id))
            .key(holds_key(event_id))
            .key(sold_key(event_id))
            .key(session_key(event_id, session_id))
            .arg(session_id.as_str())
            .arg(now.timestamp_millis())
            .arg(expires_at.timestamp_millis())
            .arg(session_prefix(event_id));
        for seat in &seats {
            invocation.arg(seat.to_string());
        }

        let mut conn = self.redis.conn.clone();
        let reply: Vec<String> = invocation.invoke_async(&mut conn).await?;
        script_outcome(reply, |seat| BackendError::Conflict { seat }).inspect_err(|e| {
            warn!("Hold for session {} on event {} rejected: {}", session_id, event_id, e);
        })?;

        debug!("Session {} holds {} seats of event {}", session_id, seats.len(), event_id);
        Ok(HoldReceipt { event_id, session_id: session_id.clone(), seats, expires_at })
    }

    async fn release_session_holds(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: Option<&[SeatRef]>,
    ) -> Result<usize, BackendError> {
        let mut invocation = self.scripts.release.prepare_invoke();
        invocation
            .key(holders_key(event_id))
            .key(holds_key(event_id))
            .key(session_key(event_id, session_id))
            .arg(session_id.as_str());
        if let Some(seats) = seats {
            if seats.is_empty() {
                return Ok(0);
            }
            for seat in dedup_seats(seats) {
                invocation.arg(seat.to_string());
            }
        }

        let mut conn = self.redis.conn.clone();
        let released: usize = invocation.invoke_async(&mut conn).await?;
        debug!("Session {} released {} seats of event {}", session_id, released, event_id);
        Ok(released)
    }

    async fn cleanup_expired_session_holds(&self, event_id: i64) -> Result<usize, BackendError> {
        let now = self.clock.now();
        let mut conn = self.redis.conn.clone();
        let reclaimed: usize = self
            .scripts
            .cleanup
            .key(holders_key(event_id))
            .key(holds_key(event_id))
            .arg(now.timestamp_millis())
            .arg(session_prefix(event_id))
            .invoke_async(&mut conn)
            .await?;

        if reclaimed > 0 {
            info!("Reclaimed {} expired holds for event {}", reclaimed, event_id);
        }
        Ok(reclaimed)
    }

    async fn get_public_seating_chart(&self, event_id: i64) -> Result<SeatingChart, BackendError> {
        let mut chart = self.load_chart(event_id).await?;
        let now = self.clock.now();

        // Redis down means stale statuses, not a missing chart
        let mut conn = self.redis.conn.clone();
        let overlay: Result<(Vec<String>, Vec<String>), redis::RedisError> = redis::pipe()
            .zrangebyscore(holds_key(event_id), format!("({}", now.timestamp_millis()), "+inf")
            .smembers(sold_key(event_id))
            .query_async(&mut conn)
            .await;

        let (held, sold) = match overlay {
            Ok(sets) => sets,
            Err(e) => {
                error!("Failed to read holds for event {}: {:?}", event_id, e);
                return Ok(chart);
            }
        };
        let held: HashSet<SeatRef> = held.iter().filter_map(|m| m.parse().ok()).collect();
        let sold: HashSet<SeatRef> = sold.iter().filter_map(|m| m.parse().ok()).collect();

        for seat in chart.seats_mut() {
            let id = seat.id();
            seat.status = match seat.status {
                SeatStatus::Sold => SeatStatus::Sold,
                _ if sold.contains(&id) => SeatStatus::Sold,
                _ if held.contains(&id) => SeatStatus::Held,
                SeatStatus::Available | SeatStatus::Held => SeatStatus::Available,
            };
        }
        Ok(chart)
    }

    async fn get_event_ticket_tiers(&self, event_id: i64) -> Result<Vec<Tier>, BackendError> {
        if !self.event_exists(event_id).await? {
            return Err(BackendError::EventNotFound(event_id));
        }
        let rows: Vec<TierRow> = sqlx::query_as(
            "SELECT id, event_id, name, price_cents, early_bird_price_cents, early_bird_ends_at
             FROM ticket_tiers WHERE event_id = $1 ORDER BY id",
        )
        .bind(event_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(Tier::from).collect())
    }

    async fn complete_purchase(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<Vec<SeatRef>, BackendError> {
        check_seat_list(seats)?;
        let seats = dedup_seats(seats);
        self.ensure_seats_exist(event_id, &seats).await?;

        let mut invocation = self.scripts.purchase.prepare_invoke();
        invocation
            .key(holders_key(event_id))
            .key(holds_key(event_id))
            .key(sold_key(event_id))
            .key(session_key(event_id, session_id))
            .arg(session_id.as_str())
            .arg(self.clock.now().timestamp_millis());
        for seat in &seats {
            invocation.arg(seat.to_string());
        }

        let mut conn = self.redis.conn.clone();
        let reply: Vec<String> = invocation.invoke_async(&mut conn).await?;
        script_outcome(reply, |seat| BackendError::NotHeld { seat })?;

        // Redis already reports these seats sold; Postgres is the durable copy.
        let table_ids: Vec<i64> = seats.iter().map(|s| s.table_id).collect();
        let numbers: Vec<i32> = seats.iter().map(|s| s.seat_number).collect();
        let updated = sqlx::query(
            r#"
            UPDATE chart_seats
            SET status = 'SOLD', sold_session_id = $1, sold_at = NOW()
            WHERE (table_id, seat_number) IN (SELECT * FROM UNNEST($2::BIGINT[], $3::INT[]))
            "#,
        )
        .bind(session_id.as_str())
        .bind(&table_ids)
        .bind(&numbers)
        .execute(&self.db.pool)
        .await
        .inspect_err(|e| {
            error!("Seats of session {} are sold in Redis but not persisted: {:?}", session_id, e);
        })?;

        info!(
            "Session {} bought {} seats of event {} ({} rows persisted)",
            session_id,
            seats.len(),
            event_id,
            updated.rows_affected()
        );
        Ok(seats)
    }

    async fn known_events(&self) -> Result<Vec<i64>, BackendError> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT event_id FROM seating_charts ORDER BY event_id")
            .fetch_all(&self.db.pool)
            .await?;
        Ok(ids)
    }
}
