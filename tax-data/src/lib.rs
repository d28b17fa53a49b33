pub mod defaults;
pub mod loader;

pub use defaults::{DEFAULT_SLABS_CSV, default_slab_tables};
pub use loader::{SlabLoaderError, SlabRecord, SlabTableLoader};
