use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::slab::{Slab, SlabError, validate_table};

/// Default slab tables keyed by fiscal year.
///
/// Years present here are the ones whose slabs may be overridden by a merge;
/// every other year must be fully specified by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlabTables {
    tables: BTreeMap<i32, Vec<Slab>>,
}

impl SlabTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the table for `year`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError`] if the table is not ascending, has an unbounded
    /// slab before the last position, or contains an invalid slab.
    pub fn insert(
        &mut self,
        year: i32,
        slabs: Vec<Slab>,
    ) -> Result<Option<Vec<Slab>>, SlabError> {
        validate_table(&slabs)?;
        Ok(self.tables.insert(year, slabs))
    }

    pub fn get(
        &self,
        year: i32,
    ) -> Option<&[Slab]> {
        self.tables.get(&year).map(Vec::as_slice)
    }

    pub fn has_defaults(
        &self,
        year: i32,
    ) -> bool {
        self.tables.contains_key(&year)
    }

    /// Years with a table, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.tables.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
