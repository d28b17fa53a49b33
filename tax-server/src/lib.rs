//! Slab tax calculator service: HTTP API, command line and the wiring
//! between configuration, slab store and engines.

pub mod api;
pub mod config;
pub mod logging;
pub mod report;
pub mod service;
pub mod session;

use std::sync::Arc;

use anyhow::Context;
use tax_core::db::{MemoryRepositoryFactory, RepositoryRegistry};
use tax_data::default_slab_tables;
use tax_db_sqlite::SqliteRepositoryFactory;
use tracing::info;

use crate::config::ServerConfig;
use crate::service::AppState;
use crate::session::SessionCaches;

/// Registry with every slab store backend this binary ships.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(MemoryRepositoryFactory));
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

/// Loads the built-in slab tables, opens the configured slab store and
/// builds the engines.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let tables = default_slab_tables().context("built-in slab tables are invalid")?;

    let store = build_registry()
        .create(&config.database)
        .await
        .with_context(|| format!("cannot open '{}' slab store", config.database.backend))?;

    info!(
        backend = %config.database.backend,
        default_years = ?tables.years(),
        default_regime = %config.regime.default,
        "service ready"
    );

    let state = AppState::new_with_sessions(
        tables,
        &config.regime.settings(),
        config.regime.default,
        Arc::from(store),
        SessionCaches::with_limits(config.sessions.limits()),
    )?;
    Ok(state)
}
