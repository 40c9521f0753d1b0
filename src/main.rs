use bookflix_circulation::{
    adapters::log_notifier::LogNotifier,
    adapters::postgres::{
        PostgresBookInventory, PostgresEventStore, PostgresFineRepository, PostgresLoanReadModel,
        PostgresMemberDirectory, PostgresReservationRepository, PostgresSettingsStore,
    },
    api::{AppState, create_router},
    application::{ServiceDependencies, sweep::run_sweep},
    config::AppConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file if present (RUST_LOG included)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookflix_circulation=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Initialize adapters
    let service_deps = ServiceDependencies {
        event_store: Arc::new(PostgresEventStore::new(pool.clone())),
        loan_read_model: Arc::new(PostgresLoanReadModel::new(pool.clone())),
        member_service: Arc::new(PostgresMemberDirectory::new(pool.clone())),
        book_service: Arc::new(PostgresBookInventory::new(pool.clone())),
        reservation_repository: Arc::new(PostgresReservationRepository::new(pool.clone())),
        fine_repository: Arc::new(PostgresFineRepository::new(pool.clone())),
        settings_store: Arc::new(PostgresSettingsStore::new(pool.clone())),
        notification_service: Arc::new(LogNotifier),
    };

    if let Some(interval) = config.sweep_interval() {
        let deps = service_deps.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match run_sweep(&deps, chrono::Utc::now()).await {
                    Ok(report) => tracing::debug!(?report, "Sweep finished"),
                    Err(e) => tracing::error!(error = %e, "Sweep failed"),
                }
            }
        });
        tracing::info!(interval_secs = config.sweep_interval_secs, "Background sweep enabled");
    }

    let app = create_router(Arc::new(AppState { service_deps }));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
