use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tax_core::db::repository::{RepositoryError, SlabRepository};
use tax_core::db::{DbConfig, RepositoryFactory};
use tracing::info;

use crate::repository::SqliteSlabRepository;

/// Turns a connection string into connect options.
///
/// * `:memory:` or `sqlite::memory:` opens an ephemeral in-memory database.
/// * A `sqlite:` URL is used as given.
/// * Anything else is a file path, created if it does not exist.
fn connect_options(connection_string: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    let trimmed = connection_string.trim();
    if trimmed == ":memory:" {
        return SqliteConnectOptions::from_str("sqlite::memory:");
    }
    if trimmed.starts_with("sqlite:") {
        return SqliteConnectOptions::from_str(trimmed);
    }
    Ok(SqliteConnectOptions::new()
        .filename(trimmed)
        .create_if_missing(true))
}

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`tax_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use tax_core::db::RepositoryRegistry;
/// use tax_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string` and run
    /// the embedded migrations.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn SlabRepository>, RepositoryError> {
        let options = connect_options(&config.connection_string)
            .map_err(|e| RepositoryError::Configuration(e.to_string()))?;
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        let repo = SqliteSlabRepository::new_with_pool(pool).await;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;

        info!(connection = %config.connection_string, "sqlite slab store ready");
        Ok(Box::new(repo))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use tax_core::Slab;
    use tax_core::db::{DbConfig, RepositoryRegistry};

    use super::*;

    #[test]
    fn backend_name_is_sqlite() {
        assert_eq!(SqliteRepositoryFactory.backend_name(), "sqlite");
    }

    #[test]
    fn bare_path_creates_missing_file() {
        let options = connect_options("slabs.db").unwrap();

        assert_eq!(options.get_filename().to_string_lossy(), "slabs.db");
    }

    #[tokio::test]
    async fn creates_in_memory_repository() {
        let config = DbConfig {
            backend: "sqlite".to_string(),
            connection_string: ":memory:".to_string(),
        };

        let result = SqliteRepositoryFactory.create(&config).await;
        assert!(
            result.is_ok(),
            "failed to create in-memory repository: {:#?}",
            result.err()
        );
    }

    #[tokio::test]
    async fn registry_round_trip_through_sqlite() {
        let mut registry = RepositoryRegistry::new();
        registry.register(Box::new(SqliteRepositoryFactory));
        let config = DbConfig {
            backend: "sqlite".to_string(),
            connection_string: "sqlite::memory:".to_string(),
        };

        let repo = registry.create(&config).await.unwrap();
        repo.put_slabs(2026, &[Slab::unbounded(dec!(0), dec!(0.1))])
            .await
            .unwrap();

        assert_eq!(repo.list_years().await.unwrap(), vec![2026]);
    }
}
