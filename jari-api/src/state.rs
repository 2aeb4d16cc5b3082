use std::sync::Arc;

use jari_core::repository::SeatStore;
use jari_reserve::{ReservationManager, StatusIngest};
use jari_store::RedisClient;

use crate::hub::SeatHub;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct HardwareConfig {
    pub shared_secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub seats: Arc<dyn SeatStore>,
    pub manager: Arc<ReservationManager>,
    pub ingest: Arc<StatusIngest>,
    pub hub: Arc<SeatHub>,
    /// Rate limiting only; `None` disables it (tests, Redis-less dev).
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub hardware: HardwareConfig,
}
