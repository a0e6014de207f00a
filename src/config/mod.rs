use std::env;

pub mod cors;

pub use cors::create_cors_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_CURRENCY: &str = "NGN";

pub struct Config {
    /// Absent in development: the server falls back to the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub sweep_interval_secs: u64,
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            currency: env::var("CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY.to_string()),
        }
    }
}
