use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use jari_core::layout::LineLayout;
use jari_core::seat::{Seat, SeatId, SeatIdParseError, SeatStatus, SeatType};
use jari_reserve::IngestError;

use crate::error::AppError;
use crate::state::AppState;

/// Seat-map reads for riders; the car listing is also the viewer's initial
/// full-state fetch before it starts consuming broadcast events.
pub fn rider_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trains/{train}/cars/{car}/seats", get(car_seats))
        .route("/v1/trains/{train}/seats/available", get(available_seats))
}

/// Sensor-facing surface, gated by the hardware shared secret.
pub fn hardware_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/seats/{seat_id}/status", patch(update_seat_status))
        .route("/v1/trains/{train}/provision", post(provision_train))
}

async fn car_seats(
    State(state): State<AppState>,
    Path((train, car)): Path<(String, u32)>,
) -> Result<Json<Vec<Seat>>, AppError> {
    let seats = state
        .seats
        .list_car(&train, car)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(seats))
}

async fn available_seats(
    State(state): State<AppState>,
    Path(train): Path<String>,
) -> Result<Json<Vec<Seat>>, AppError> {
    let seats = state
        .seats
        .list_train(&train)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let available: Vec<Seat> = seats
        .into_iter()
        .filter(|s| s.is_available() && s.seat_type == SeatType::Priority)
        .collect();

    Ok(Json(available))
}

#[derive(Debug, Deserialize)]
struct UpdateSeatStatusRequest {
    status: Option<String>,
}

async fn update_seat_status(
    State(state): State<AppState>,
    Path(seat_id): Path<String>,
    Json(req): Json<UpdateSeatStatusRequest>,
) -> Result<Json<Seat>, AppError> {
    let seat_id: SeatId = seat_id
        .parse()
        .map_err(|e: SeatIdParseError| AppError::ValidationError(e.to_string()))?;

    let raw = req
        .status
        .ok_or_else(|| AppError::ValidationError("status is required".to_string()))?;
    let status: SeatStatus = raw
        .parse()
        .map_err(|_| AppError::ValidationError(format!("unknown status: {}", raw)))?;

    let seat = state
        .ingest
        .apply_hardware_status(&seat_id, status)
        .await
        .map_err(map_ingest_err)?;

    Ok(Json(seat))
}

#[derive(Debug, Deserialize)]
struct ProvisionTrainRequest {
    line: String,
}

#[derive(Debug, Serialize)]
struct ProvisionTrainResponse {
    provisioned: usize,
}

async fn provision_train(
    State(state): State<AppState>,
    Path(train): Path<String>,
    Json(req): Json<ProvisionTrainRequest>,
) -> Result<Json<ProvisionTrainResponse>, AppError> {
    let layout = LineLayout::for_line(&req.line)
        .ok_or_else(|| AppError::ValidationError(format!("unknown line: {}", req.line)))?;

    let provisioned = state
        .ingest
        .provision_train(&train, &layout)
        .await
        .map_err(map_ingest_err)?;

    Ok(Json(ProvisionTrainResponse { provisioned }))
}

fn map_ingest_err(err: IngestError) -> AppError {
    match err {
        IngestError::SeatNotFound(_) => AppError::NotFoundError(err.to_string()),
        IngestError::ReservedSeat(_) | IngestError::Raced(_) => {
            AppError::ConflictError(err.to_string())
        }
        IngestError::InvalidStatus(_) => AppError::ValidationError(err.to_string()),
        IngestError::Store(msg) => AppError::InternalServerError(msg),
    }
}
