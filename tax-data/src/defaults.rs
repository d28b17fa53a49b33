//! Built-in slab tables shipped with the crate.

use tax_core::SlabTables;

use crate::loader::{SlabLoaderError, SlabTableLoader};

/// Default tables for the years with built-in slabs, as
/// `tax_year,start,end,rate` rows.
pub const DEFAULT_SLABS_CSV: &str = include_str!("../data/default_slabs.csv");

/// Parses [`DEFAULT_SLABS_CSV`] into validated tables.
pub fn default_slab_tables() -> Result<SlabTables, SlabLoaderError> {
    let records = SlabTableLoader::parse(DEFAULT_SLABS_CSV.as_bytes())?;
    SlabTableLoader::into_tables(&records)
}
