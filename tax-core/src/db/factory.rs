use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::repository::{RepositoryError, SlabRepository};

/// Where custom slab tables are kept.
///
/// | backend  | connection_string                          |
/// |----------|--------------------------------------------|
/// | `memory` | ignored; tables live for the process       |
/// | `sqlite` | `slabs.db`, `:memory:`, `sqlite:slabs.db`  |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub backend: String,
    /// Backend-specific; handed to the factory untouched.
    pub connection_string: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            connection_string: String::new(),
        }
    }
}

/// Opens slab stores for one backend.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Lowercase name matched against [`DbConfig::backend`].
    fn backend_name(&self) -> &'static str;

    /// Opens the store described by `config`, ready for use. Schema set-up
    /// happens here.
    async fn create(&self, config: &DbConfig) -> Result<Box<dyn SlabRepository>, RepositoryError>;
}

/// Backend factories by name. A binary registers the backends it links and
/// then opens whichever one its configuration names.
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: BTreeMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `factory`, replacing any factory with the same name.
    pub fn register(&mut self, factory: Box<dyn RepositoryFactory>) {
        self.factories.insert(factory.backend_name(), factory);
    }

    /// Registered backend names, ascending.
    pub fn available_backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Opens a store with the factory named by `config.backend`. The name
    /// is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Configuration`] naming the requested and available
    /// backends when nothing is registered under that name; otherwise
    /// whatever the factory returns.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn SlabRepository>, RepositoryError> {
        let backend = config.backend.trim().to_ascii_lowercase();
        let Some(factory) = self.factories.get(backend.as_str()) else {
            return Err(RepositoryError::Configuration(format!(
                "unknown backend '{}'; available: {}",
                config.backend,
                self.available_backends().join(", ")
            )));
        };

        debug!(backend = %backend, "opening slab store");
        factory.create(config).await
    }
}
