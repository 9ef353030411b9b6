//! Annals Server Binary
//!
//! Opens the database once, seeds the default account and serves the API.

use std::sync::Arc;

use annals_core::AnnalsConfig;
use annals_server::{serve, AppState};
use tracing_subscriber::EnvFilter;

/// Configuration from the TOML file named by `ANNALS_CONFIG`, then the
/// `ANNALS_ADDR` and `ANNALS_DB` overrides
fn load_config() -> Result<AnnalsConfig, Box<dyn std::error::Error>> {
    let mut config = match std::env::var("ANNALS_CONFIG") {
        Ok(path) => AnnalsConfig::from_toml(&std::fs::read_to_string(&path)?)?,
        Err(_) => AnnalsConfig::default(),
    };
    if let Ok(addr) = std::env::var("ANNALS_ADDR") {
        config.server.addr = addr;
    }
    if let Ok(db) = std::env::var("ANNALS_DB") {
        config.database.path = db.into();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let addr = config.server.addr.clone();

    let state = AppState::new(config)?;
    state.bootstrap()?;

    serve(&addr, Arc::new(state)).await
}
