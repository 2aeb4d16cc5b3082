use std::net::SocketAddr;
use std::sync::Arc;

use jari_api::fanout::SeatEventFanout;
use jari_api::hub::SeatHub;
use jari_api::{
    app,
    state::{AppState, AuthConfig, HardwareConfig},
};
use jari_core::events::EventSink;
use jari_core::repository::{ReservationRepository, SeatStore};
use jari_reserve::{ReservationManager, StatusIngest};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jari_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = jari_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Jari API on port {}", config.server.port);

    // Redis: live seat documents + rate limiting
    let redis_client = jari_store::RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    let redis_arc = Arc::new(redis_client);

    // Postgres: durable reservation history
    let db = jari_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    // Kafka: outbound seat-status events
    let kafka_producer = jari_store::EventProducer::new(&config.kafka.brokers)
        .expect("Failed to create Kafka producer");

    let hub = Arc::new(SeatHub::new());
    let events: Arc<dyn EventSink> = Arc::new(SeatEventFanout::new(
        hub.clone(),
        Some(Arc::new(kafka_producer)),
    ));

    let seats: Arc<dyn SeatStore> =
        Arc::new(jari_store::RedisSeatStore::new((*redis_arc).clone()));
    let reservations: Arc<dyn ReservationRepository> =
        Arc::new(jari_store::PgReservations::new(&db));

    let manager = Arc::new(ReservationManager::new(
        seats.clone(),
        reservations.clone(),
        events.clone(),
    ));
    let ingest = Arc::new(StatusIngest::new(
        seats.clone(),
        reservations.clone(),
        events.clone(),
    ));

    let app_state = AppState {
        seats,
        manager,
        ingest,
        hub,
        redis: Some(redis_arc),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        hardware: HardwareConfig {
            shared_secret: config.hardware.shared_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
