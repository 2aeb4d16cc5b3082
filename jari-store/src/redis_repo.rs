use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};
use std::collections::HashMap;
use uuid::Uuid;

use jari_core::repository::{Expected, SeatStore, SeatStoreError};
use jari_core::seat::{Seat, SeatId, SeatStatus, SeatType};

/// Lua compare-and-set over one seat hash. Check and write run as a single
/// script, so no other writer can interleave between them. ARGV: mode
/// (status|reservation|any), expected value, new status, new reservation id,
/// wall-clock millis. Returns {flag, revision, updated_at_ms} with flag
/// 1 = updated, 0 = conflict, -1 = missing.
const CAS_SCRIPT: &str = r#"
    local status = redis.call('HGET', KEYS[1], 'status')
    if not status then return {-1, 0, 0} end
    if ARGV[1] == 'status' and status ~= ARGV[2] then return {0, 0, 0} end
    if ARGV[1] == 'reservation' then
        local rid = redis.call('HGET', KEYS[1], 'reservation_id')
        if rid ~= ARGV[2] then return {0, 0, 0} end
    end
    local ms = tonumber(ARGV[5])
    local prev = tonumber(redis.call('HGET', KEYS[1], 'updated_at_ms'))
    if prev and prev > ms then ms = prev end
    local rev = redis.call('HINCRBY', KEYS[1], 'revision', 1)
    redis.call('HSET', KEYS[1], 'status', ARGV[3], 'reservation_id', ARGV[4], 'updated_at_ms', ms)
    return {1, rev, ms}
"#;

fn seat_key(seat_id: &SeatId) -> String {
    format!("seat:{}", seat_id)
}

fn car_index_key(train_no: &str, car_no: u32) -> String {
    format!("car:{}:{}:seats", train_no, car_no)
}

fn train_index_key(train_no: &str) -> String {
    format!("train:{}:seats", train_no)
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> RedisResult<MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Fixed-window rate limit: one counter per key per window.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.conn().await?;

        let (count, _): (i64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

/// Seat store over Redis: one hash per seat plus per-car and per-train
/// index sets maintained at provisioning time.
#[derive(Clone)]
pub struct RedisSeatStore {
    client: RedisClient,
}

impl RedisSeatStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn seat_from_fields(
        seat_id: SeatId,
        fields: &HashMap<String, String>,
    ) -> Result<Seat, SeatStoreError> {
        let field = |name: &str| {
            fields
                .get(name)
                .ok_or_else(|| backend(format!("seat {} missing field {}", seat_id, name)))
        };

        let status: SeatStatus = field("status")?
            .parse()
            .map_err(|e| backend(format!("seat {}: {}", seat_id, e)))?;
        let seat_type: SeatType = field("seat_type")?
            .parse()
            .map_err(|e| backend(format!("seat {}: {}", seat_id, e)))?;
        let reservation_id = match field("reservation_id")?.as_str() {
            "" => None,
            raw => Some(
                Uuid::parse_str(raw).map_err(|e| backend(format!("seat {}: {}", seat_id, e)))?,
            ),
        };
        let updated_at_ms: i64 = field("updated_at_ms")?
            .parse()
            .map_err(|_| backend(format!("seat {}: bad updated_at_ms", seat_id)))?;
        let revision: u64 = field("revision")?
            .parse()
            .map_err(|_| backend(format!("seat {}: bad revision", seat_id)))?;

        Ok(Seat {
            updated_at: millis_to_datetime(updated_at_ms, &seat_id)?,
            seat_id,
            seat_type,
            status,
            reservation_id,
            revision,
        })
    }

    async fn load_indexed(&self, index_key: &str) -> Result<Vec<Seat>, SeatStoreError> {
        let mut conn = self.client.conn().await.map_err(redis_err)?;
        let ids: Vec<String> = conn.smembers(index_key).await.map_err(redis_err)?;

        let mut seats = Vec::with_capacity(ids.len());
        for raw in ids {
            let seat_id: SeatId = raw
                .parse()
                .map_err(|e| backend(format!("bad indexed seat id: {}", e)))?;
            if let Some(seat) = self.get(&seat_id).await? {
                seats.push(seat);
            }
        }
        seats.sort_by(|a, b| {
            (a.seat_id.car_no, &a.seat_id.seat_no).cmp(&(b.seat_id.car_no, &b.seat_id.seat_no))
        });
        Ok(seats)
    }
}

fn backend(msg: String) -> SeatStoreError {
    SeatStoreError::Backend(msg)
}

fn redis_err(e: redis::RedisError) -> SeatStoreError {
    SeatStoreError::Backend(e.to_string())
}

fn millis_to_datetime(ms: i64, seat_id: &SeatId) -> Result<chrono::DateTime<Utc>, SeatStoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| backend(format!("seat {}: timestamp out of range", seat_id)))
}

#[async_trait]
impl SeatStore for RedisSeatStore {
    async fn get(&self, seat_id: &SeatId) -> Result<Option<Seat>, SeatStoreError> {
        let mut conn = self.client.conn().await.map_err(redis_err)?;
        let fields: HashMap<String, String> = conn
            .hgetall(seat_key(seat_id))
            .await
            .map_err(redis_err)?;

        if fields.is_empty() {
            return Ok(None);
        }
        Self::seat_from_fields(seat_id.clone(), &fields).map(Some)
    }

    async fn list_car(&self, train_no: &str, car_no: u32) -> Result<Vec<Seat>, SeatStoreError> {
        self.load_indexed(&car_index_key(train_no, car_no)).await
    }

    async fn list_train(&self, train_no: &str) -> Result<Vec<Seat>, SeatStoreError> {
        self.load_indexed(&train_index_key(train_no)).await
    }

    async fn insert(&self, seat: Seat) -> Result<(), SeatStoreError> {
        let mut conn = self.client.conn().await.map_err(redis_err)?;
        let key = seat_key(&seat.seat_id);
        let fields: Vec<(&str, String)> = vec![
            ("seat_type", seat.seat_type.as_str().to_string()),
            ("status", seat.status.as_str().to_string()),
            (
                "reservation_id",
                seat.reservation_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            ),
            (
                "updated_at_ms",
                seat.updated_at.timestamp_millis().to_string(),
            ),
            ("revision", seat.revision.to_string()),
        ];

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(&key, &fields)
            .ignore()
            .sadd(
                car_index_key(&seat.seat_id.train_no, seat.seat_id.car_no),
                seat.seat_id.to_string(),
            )
            .ignore()
            .sadd(
                train_index_key(&seat.seat_id.train_no),
                seat.seat_id.to_string(),
            )
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        seat_id: &SeatId,
        expected: Expected,
        new_status: SeatStatus,
        reservation_id: Option<Uuid>,
    ) -> Result<Seat, SeatStoreError> {
        let mut conn = self.client.conn().await.map_err(redis_err)?;

        let (mode, expected_value) = match expected {
            Expected::Status(status) => ("status", status.as_str().to_string()),
            Expected::Reservation(rid) => (
                "reservation",
                rid.map(|id| id.to_string()).unwrap_or_default(),
            ),
            Expected::Any => ("any", String::new()),
        };
        let new_reservation = reservation_id
            .map(|id| id.to_string())
            .unwrap_or_default();

        let script = redis::Script::new(CAS_SCRIPT);
        let result: Vec<i64> = script
            .key(seat_key(seat_id))
            .arg(mode)
            .arg(expected_value)
            .arg(new_status.as_str())
            .arg(&new_reservation)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;

        match result.first().copied() {
            Some(1) => {
                let revision = result.get(1).copied().unwrap_or_default() as u64;
                let updated_at_ms = result.get(2).copied().unwrap_or_default();
                // seat_type is immutable after provisioning, safe to read
                // outside the script.
                let raw_type: String = conn
                    .hget(seat_key(seat_id), "seat_type")
                    .await
                    .map_err(redis_err)?;
                let seat_type: SeatType = raw_type
                    .parse()
                    .map_err(|e| backend(format!("seat {}: {}", seat_id, e)))?;

                Ok(Seat {
                    updated_at: millis_to_datetime(updated_at_ms, seat_id)?,
                    seat_id: seat_id.clone(),
                    seat_type,
                    status: new_status,
                    reservation_id,
                    revision,
                })
            }
            Some(0) => Err(SeatStoreError::Conflict(seat_id.to_string())),
            Some(-1) => Err(SeatStoreError::NotFound(seat_id.to_string())),
            other => Err(backend(format!(
                "seat {}: unexpected script reply {:?}",
                seat_id, other
            ))),
        }
    }
}
