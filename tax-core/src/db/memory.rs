//! Process-local slab store, used when no database is configured and in tests.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::factory::{DbConfig, RepositoryFactory};
use super::repository::{RepositoryError, SlabRepository};
use crate::models::{SavedSlabTable, Slab};

#[derive(Debug, Default)]
pub struct MemorySlabRepository {
    tables: RwLock<BTreeMap<i32, SavedSlabTable>>,
}

impl MemorySlabRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlabRepository for MemorySlabRepository {
    async fn get_slabs(&self, tax_year: i32) -> Result<Option<SavedSlabTable>, RepositoryError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.get(&tax_year).cloned())
    }

    async fn put_slabs(
        &self,
        tax_year: i32,
        slabs: &[Slab],
    ) -> Result<SavedSlabTable, RepositoryError> {
        let saved = SavedSlabTable {
            tax_year,
            slabs: slabs.to_vec(),
            updated_at: Utc::now(),
        };
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tax_year, saved.clone());
        Ok(saved)
    }

    async fn delete_slabs(&self, tax_year: i32) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&tax_year)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_years(&self) -> Result<Vec<i32>, RepositoryError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.keys().copied().collect())
    }
}

/// Registers the in-memory backend under `"memory"`. Each `create` call
/// returns a fresh, empty store.
pub struct MemoryRepositoryFactory;

#[async_trait]
impl RepositoryFactory for MemoryRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, _config: &DbConfig) -> Result<Box<dyn SlabRepository>, RepositoryError> {
        Ok(Box::new(MemorySlabRepository::new()))
    }
}
