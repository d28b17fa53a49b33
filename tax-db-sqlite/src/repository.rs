use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, sqlite::SqlitePool};
use tax_core::{RepositoryError, SavedSlabTable, Slab, SlabRepository};
use tracing::debug;

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

pub struct SqliteSlabRepository {
    pool: SqlitePool,
}

impl SqliteSlabRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_slab(row: &sqlx::sqlite::SqliteRow) -> Result<Slab, RepositoryError> {
    Ok(Slab {
        start: get_decimal(row, "start_amount")?,
        end: get_optional_decimal(row, "end_amount")?,
        rate: get_decimal(row, "rate")?,
    })
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

#[async_trait]
impl SlabRepository for SqliteSlabRepository {
    async fn get_slabs(&self, tax_year: i32) -> Result<Option<SavedSlabTable>, RepositoryError> {
        let Some(header) = sqlx::query("SELECT updated_at FROM custom_slab_tables WHERE tax_year = ?")
            .bind(tax_year)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };

        let updated_at = header
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get updated_at: {}", e)))?;

        let rows = sqlx::query(
            "SELECT start_amount, end_amount, rate FROM custom_slabs
             WHERE tax_year = ? ORDER BY position",
        )
        .bind(tax_year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let slabs = rows.iter().map(row_to_slab).collect::<Result<Vec<_>, _>>()?;

        Ok(Some(SavedSlabTable {
            tax_year,
            slabs,
            updated_at,
        }))
    }

    async fn put_slabs(
        &self,
        tax_year: i32,
        slabs: &[Slab],
    ) -> Result<SavedSlabTable, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM custom_slabs WHERE tax_year = ?")
            .bind(tax_year)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        sqlx::query(
            "INSERT INTO custom_slab_tables (tax_year, updated_at) VALUES (?, ?)
             ON CONFLICT (tax_year) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(tax_year)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        for (position, slab) in slabs.iter().enumerate() {
            sqlx::query(
                "INSERT INTO custom_slabs (tax_year, position, start_amount, end_amount, rate)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(tax_year)
            .bind(position as i64)
            .bind(decimal_to_text(slab.start))
            .bind(slab.end.map(decimal_to_text))
            .bind(decimal_to_text(slab.rate))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        debug!(tax_year, slabs = slabs.len(), "stored custom slab table");

        Ok(SavedSlabTable {
            tax_year,
            slabs: slabs.to_vec(),
            updated_at: now,
        })
    }

    async fn delete_slabs(&self, tax_year: i32) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM custom_slabs WHERE tax_year = ?")
            .bind(tax_year)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let result = sqlx::query("DELETE FROM custom_slab_tables WHERE tax_year = ?")
            .bind(tax_year)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn list_years(&self) -> Result<Vec<i32>, RepositoryError> {
        let rows = sqlx::query("SELECT tax_year FROM custom_slab_tables ORDER BY tax_year")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter()
            .map(|row| row.try_get("tax_year").map_err(db_error))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn setup_test_db() -> SqliteSlabRepository {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        let repo = SqliteSlabRepository::new_with_pool(pool).await;
        repo.run_migrations()
            .await
            .expect("Failed to run migrations");
        repo
    }

    fn test_slabs() -> Vec<Slab> {
        vec![
            Slab::bounded(dec!(0), dec!(500000), dec!(0)),
            Slab::bounded(dec!(500000), dec!(1000000), dec!(0.05)),
            Slab::unbounded(dec!(1000000), dec!(0.15)),
        ]
    }

    #[tokio::test]
    async fn test_get_slabs_missing_year() {
        let repo = setup_test_db().await;

        let result = repo.get_slabs(2030).await;

        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn test_put_and_get_slabs() {
        let repo = setup_test_db().await;

        let saved = repo.put_slabs(2026, &test_slabs()).await.expect("Failed to put slabs");
        let loaded = repo
            .get_slabs(2026)
            .await
            .expect("Failed to get slabs")
            .expect("Table should exist");

        assert_eq!(saved.tax_year, 2026);
        assert_eq!(loaded.tax_year, 2026);
        assert_eq!(loaded.slabs, test_slabs());
        assert_eq!(loaded.slabs[2].end, None);
    }

    #[tokio::test]
    async fn test_put_slabs_preserves_decimal_text() {
        let repo = setup_test_db().await;
        let slabs = vec![Slab::unbounded(dec!(0), dec!(0.075))];

        repo.put_slabs(2026, &slabs).await.unwrap();

        let row = sqlx::query("SELECT start_amount, rate FROM custom_slabs WHERE tax_year = 2026")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        let rate: String = row.try_get("rate").unwrap();
        assert_eq!(rate, "0.075");
    }

    #[tokio::test]
    async fn test_put_slabs_replaces_table() {
        let repo = setup_test_db().await;
        repo.put_slabs(2026, &test_slabs()).await.unwrap();

        let replacement = vec![Slab::unbounded(dec!(0), dec!(0.2))];
        repo.put_slabs(2026, &replacement).await.unwrap();

        let loaded = repo.get_slabs(2026).await.unwrap().unwrap();
        assert_eq!(loaded.slabs, replacement);
    }

    #[tokio::test]
    async fn test_put_empty_table() {
        let repo = setup_test_db().await;

        repo.put_slabs(2026, &[]).await.unwrap();

        let loaded = repo.get_slabs(2026).await.unwrap().unwrap();
        assert!(loaded.slabs.is_empty());
        assert_eq!(repo.list_years().await.unwrap(), vec![2026]);
    }

    #[tokio::test]
    async fn test_delete_slabs() {
        let repo = setup_test_db().await;
        repo.put_slabs(2026, &test_slabs()).await.unwrap();

        repo.delete_slabs(2026).await.expect("Failed to delete slabs");

        assert_eq!(repo.get_slabs(2026).await, Ok(None));
        let remaining: i64 = sqlx::query("SELECT COUNT(*) AS n FROM custom_slabs")
            .fetch_one(repo.pool())
            .await
            .unwrap()
            .get("n");
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_delete_slabs_not_found() {
        let repo = setup_test_db().await;

        let result = repo.delete_slabs(2026).await;

        assert_eq!(result, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_list_years() {
        let repo = setup_test_db().await;
        repo.put_slabs(2027, &test_slabs()).await.unwrap();
        repo.put_slabs(2026, &test_slabs()).await.unwrap();

        let years = repo.list_years().await.expect("Failed to list years");

        assert_eq!(years, vec![2026, 2027]);
    }

    #[tokio::test]
    async fn test_get_slabs_reads_hand_inserted_numbers() {
        let repo = setup_test_db().await;
        sqlx::query(
            "INSERT INTO custom_slab_tables (tax_year, updated_at)
             VALUES (2028, '2025-04-01T00:00:00Z')",
        )
        .execute(repo.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO custom_slabs (tax_year, position, start_amount, end_amount, rate)
             VALUES (2028, 0, 0, NULL, 0.1)",
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let loaded = repo.get_slabs(2028).await.unwrap().unwrap();

        assert_eq!(loaded.slabs, vec![Slab::unbounded(dec!(0), dec!(0.1))]);
    }
}
