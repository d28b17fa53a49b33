use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::slab::Slab;

/// A user-defined table as held by a slab store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSlabTable {
    pub tax_year: i32,
    pub slabs: Vec<Slab>,
    pub updated_at: DateTime<Utc>,
}
