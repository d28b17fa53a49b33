//! Memoization of finished computations.
//!
//! Results are keyed by a [`CalculationSignature`] built from the *resolved*
//! slab table rather than the raw overrides, so two requests that spell the
//! same effective table differently share one entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::calculations::{CalculationError, TaxEngine, TaxRegime};
use crate::models::{Slab, TaxCalculationInput, TaxCalculationResult};

/// Canonical text identifying one computation.
///
/// Amounts are normalized so `1000000` and `1000000.00` produce the same
/// signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalculationSignature(String);

impl CalculationSignature {
    pub fn new(
        regime: &dyn TaxRegime,
        input: &TaxCalculationInput,
        slabs: &[Slab],
    ) -> Self {
        let mut signature = format!(
            "{}|{}|{}|{}|",
            regime.fingerprint(),
            input.year,
            input.base_ctc.normalize(),
            input.hike_percent.normalize()
        );
        for slab in slabs {
            let end = slab.end.map(|end| end.normalize().to_string());
            signature.push_str(&format!(
                "{}:{}:{};",
                slab.start.normalize(),
                end.as_deref().unwrap_or("-"),
                slab.rate.normalize()
            ));
        }
        Self(signature)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalculationSignature {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Thread-safe, grow-only result cache.
///
/// Concurrent misses on the same signature may both compute; the last write
/// wins and both results are identical.
#[derive(Debug, Default)]
pub struct ComputationCache {
    entries: RwLock<HashMap<CalculationSignature, TaxCalculationResult>>,
    computations: AtomicUsize,
}

impl ComputationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored result for `input`, computing and storing it on a
    /// miss. Failed computations are not stored.
    pub fn get_or_compute(
        &self,
        engine: &TaxEngine,
        input: &TaxCalculationInput,
    ) -> Result<TaxCalculationResult, CalculationError> {
        let slabs = engine.resolve_slabs(input)?;
        let signature = CalculationSignature::new(engine.regime(), input, &slabs);

        if let Some(hit) = self.get(&signature) {
            debug!(signature = %signature, "cache hit");
            return Ok(hit);
        }

        debug!(signature = %signature, "cache miss");
        let result = engine.calculate_with_slabs(input, &slabs)?;
        self.computations.fetch_add(1, Ordering::Relaxed);

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature, result.clone());
        Ok(result)
    }

    pub fn get(
        &self,
        signature: &CalculationSignature,
    ) -> Option<TaxCalculationResult> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signature)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times the cache had to run the engine.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}
