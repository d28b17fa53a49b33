pub mod factory;
pub mod memory;
pub mod repository;

pub use factory::{DbConfig, RepositoryFactory, RepositoryRegistry};
pub use memory::{MemoryRepositoryFactory, MemorySlabRepository};
pub use repository::{RepositoryError, SlabRepository};
