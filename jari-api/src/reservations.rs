use axum::{
    extract::{Extension, Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jari_core::reservation::Reservation;
use jari_core::seat::{Seat, SeatId, SeatIdParseError};
use jari_reserve::{CancelError, ReserveError};

use crate::error::AppError;
use crate::middleware::auth::RiderClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReservationRequest {
    seat_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReservationResponse {
    reservation_id: Uuid,
}

#[derive(Debug, Serialize)]
struct CancelReservationResponse {
    seat: Seat,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/reservations",
            post(create_reservation).get(reservation_history),
        )
        .route("/v1/reservations/{id}", delete(cancel_reservation))
}

async fn create_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<RiderClaims>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Json<CreateReservationResponse>, AppError> {
    let seat_id: SeatId = req
        .seat_id
        .parse()
        .map_err(|e: SeatIdParseError| AppError::ValidationError(e.to_string()))?;

    let reservation = state
        .manager
        .reserve(&seat_id, &claims.sub)
        .await
        .map_err(map_reserve_err)?;

    tracing::info!(
        reservation = %reservation.id,
        seat = %seat_id,
        user = %claims.sub,
        "reservation created"
    );

    Ok(Json(CreateReservationResponse {
        reservation_id: reservation.id,
    }))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<RiderClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelReservationResponse>, AppError> {
    let seat = state
        .manager
        .cancel(id, &claims.sub)
        .await
        .map_err(map_cancel_err)?;

    tracing::info!(reservation = %id, user = %claims.sub, "reservation cancelled");

    Ok(Json(CancelReservationResponse { seat }))
}

async fn reservation_history(
    State(state): State<AppState>,
    Extension(claims): Extension<RiderClaims>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    let history = state
        .manager
        .history(&claims.sub)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(history))
}

fn map_reserve_err(err: ReserveError) -> AppError {
    match err {
        ReserveError::SeatNotFound(_) => AppError::NotFoundError(err.to_string()),
        ReserveError::SeatUnavailable(_)
        | ReserveError::NotPrioritySeat(_)
        | ReserveError::ActiveReservationExists(_) => AppError::ConflictError(err.to_string()),
        ReserveError::Store(msg) => AppError::InternalServerError(msg),
    }
}

fn map_cancel_err(err: CancelError) -> AppError {
    match err {
        CancelError::ReservationNotFound(_) | CancelError::SeatNotFound(_) => {
            AppError::NotFoundError(err.to_string())
        }
        CancelError::NotOwner => AppError::AuthorizationError(err.to_string()),
        CancelError::AlreadyCancelled(_) => AppError::ConflictError(err.to_string()),
        CancelError::Store(msg) => AppError::InternalServerError(msg),
    }
}
