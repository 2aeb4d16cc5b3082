use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, Method, StatusCode},
    middleware::Next,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error;
pub mod fanout;
pub mod hub;
pub mod middleware;
pub mod reservations;
pub mod seats;
pub mod state;
pub mod stream;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
            HeaderName::from_static("x-hardware-token"),
        ]);

    let rider = Router::new()
        .merge(reservations::routes())
        .merge(seats::rider_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::rider_auth_middleware,
        ));

    let hardware = seats::hardware_routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::auth::hardware_auth_middleware,
    ));

    Router::new()
        .route("/", get(health))
        .merge(auth::routes())
        .merge(stream::routes())
        .merge(rider)
        .merge(hardware)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "jari api is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, impl IntoResponse> {
    let Some(redis) = &state.redis else {
        return Ok(next.run(req).await);
    };

    // ConnectInfo is only present when served with connect-info; fall back
    // to one shared bucket otherwise.
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("ratelimit:{}", ip);

    match redis.check_rate_limit(&key, 100, 60).await {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => Err((StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")),
        Err(_) => Ok(next.run(req).await), // Fail open
    }
}
