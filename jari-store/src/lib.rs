pub mod app_config;
pub mod events;
pub mod memory;
pub mod redis_repo;
pub mod reservations;

pub use events::EventProducer;
pub use memory::{MemoryReservations, MemorySeatStore};
pub use redis_repo::{RedisClient, RedisSeatStore};
pub use reservations::{DbClient, PgReservations};
