use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use jari_core::repository::{ReservationRepository, ReservationStoreError};
use jari_core::reservation::{Reservation, ReservationStatus};
use jari_core::seat::SeatId;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Postgres-backed reservation history.
#[derive(Clone)]
pub struct PgReservations {
    pool: Pool<Postgres>,
}

impl PgReservations {
    pub fn new(db: &DbClient) -> Self {
        Self {
            pool: db.pool.clone(),
        }
    }
}

fn db_err(e: sqlx::Error) -> ReservationStoreError {
    ReservationStoreError::Backend(e.to_string())
}

fn row_to_reservation(row: &PgRow) -> Result<Reservation, ReservationStoreError> {
    let seat_id_raw: String = row.try_get("seat_id").map_err(db_err)?;
    let seat_id: SeatId = seat_id_raw
        .parse()
        .map_err(|e| ReservationStoreError::Backend(format!("stored seat id: {}", e)))?;
    let status_raw: String = row.try_get("status").map_err(db_err)?;
    let status: ReservationStatus = status_raw
        .parse()
        .map_err(|e| ReservationStoreError::Backend(format!("stored status: {}", e)))?;

    Ok(Reservation {
        id: row.try_get("id").map_err(db_err)?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        seat_id,
        status,
        reserved_at: row.try_get("reserved_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

#[async_trait]
impl ReservationRepository for PgReservations {
    async fn create(&self, reservation: &Reservation) -> Result<(), ReservationStoreError> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, user_id, seat_id, status, reserved_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reservation.id)
        .bind(&reservation.user_id)
        .bind(reservation.seat_id.to_string())
        .bind(reservation.status.as_str())
        .bind(reservation.reserved_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, ReservationStoreError> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(row_to_reservation).transpose()
    }

    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, ReservationStoreError> {
        // Conditional transition: only an active reservation flips, so two
        // racing cancels resolve to one winner.
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled', updated_at = $2
            WHERE id = $1 AND status = 'reserved'
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish "already cancelled" from "no such reservation".
        match self.get(id).await? {
            Some(_) => Ok(false),
            None => Err(ReservationStoreError::NotFound(id)),
        }
    }

    async fn find_active_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Reservation>, ReservationStoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM reservations
            WHERE user_id = $1 AND status = 'reserved'
            ORDER BY reserved_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_reservation).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Reservation>, ReservationStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reservations
            WHERE user_id = $1
            ORDER BY reserved_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_reservation).collect()
    }
}
