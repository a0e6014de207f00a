use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use turnstile_server::config::Config;
use turnstile_server::notify::TracingDispatcher;
use turnstile_server::payments::{PaymentStatus, SandboxGateway};
use turnstile_server::routes::{create_routes, AppState};
use turnstile_server::services::sweep::run_sweeper;
use turnstile_server::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Successfully connected to database");

            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("Failed to run migrations");
            tracing::info!("Migrations run successfully");

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState {
        store: store.clone(),
        gateway: Arc::new(SandboxGateway::new(PaymentStatus::Succeeded)),
        notifier: Arc::new(TracingDispatcher),
        currency: config.currency.clone(),
    };

    run_sweeper(store, Duration::from_secs(config.sweep_interval_secs));

    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
