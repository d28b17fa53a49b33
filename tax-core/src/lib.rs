pub mod cache;
pub mod calculations;
pub mod db;
pub mod models;

pub use cache::{CalculationSignature, ComputationCache};
pub use calculations::{CalculationError, TaxEngine};
pub use db::repository::{RepositoryError, SlabRepository};
pub use models::*;
