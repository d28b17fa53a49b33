mod calculation;
mod regime;
mod saved_slab_table;
mod slab;
mod slab_table;

pub use calculation::{BracketResult, TaxCalculationInput, TaxCalculationResult};
pub use regime::Regime;
pub use saved_slab_table::SavedSlabTable;
pub use slab::{Slab, SlabError, SlabField, SlabOverride, validate_table};
pub use slab_table::SlabTables;
