use async_trait::async_trait;
use thiserror::Error;

use crate::models::{SavedSlabTable, Slab};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Storage for user-defined slab tables, one table per tax year.
#[async_trait]
pub trait SlabRepository: Send + Sync {
    /// The stored table for `tax_year`, or `None` when nothing is saved.
    async fn get_slabs(&self, tax_year: i32) -> Result<Option<SavedSlabTable>, RepositoryError>;

    /// Replaces the whole table for `tax_year`.
    async fn put_slabs(
        &self,
        tax_year: i32,
        slabs: &[Slab],
    ) -> Result<SavedSlabTable, RepositoryError>;

    /// Removes the table for `tax_year`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] when no table is stored for the year.
    async fn delete_slabs(&self, tax_year: i32) -> Result<(), RepositoryError>;

    /// Years with a stored table, ascending.
    async fn list_years(&self) -> Result<Vec<i32>, RepositoryError>;
}
