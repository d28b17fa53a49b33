//! Operations shared by the HTTP API and the command line.
//!
//! The service owns one engine per regime, the built-in slab tables, the
//! slab store and the per-session caches. Requests name a regime (or fall
//! back to the configured default) and optionally a session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tax_core::calculations::{
    CalculationError, RegimeConfigError, RegimeSettings, TaxComparison, TaxEngine,
    compare_results, parse_overrides,
};
use tax_core::{
    Regime, RepositoryError, Slab, SlabError, SlabOverride, SlabRepository, SlabTables,
    TaxCalculationInput, TaxCalculationResult, validate_table,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::session::{SessionCaches, SessionId};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Calculation(#[from] CalculationError),

    #[error(transparent)]
    Slab(#[from] SlabError),

    #[error(transparent)]
    Store(#[from] RepositoryError),

    #[error("{0} has built-in slabs which cannot be replaced or removed")]
    DefaultYear(i32),

    #[error("a slab table for {0} needs at least one slab")]
    EmptyTable(i32),
}

/// One side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub year: i32,
    pub hike_percent: Decimal,
}

impl Scenario {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            hike_percent: Decimal::ZERO,
        }
    }

    pub fn with_hike(
        mut self,
        hike_percent: Decimal,
    ) -> Self {
        self.hike_percent = hike_percent;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlabSource {
    /// Built into the server; read-only.
    Default,
    /// Held by the slab store.
    Custom,
}

/// A slab table as reported by the slab endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlabTableView {
    pub tax_year: i32,
    pub source: SlabSource,
    pub slabs: Vec<Slab>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Years with a table, split by where the table lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlabYears {
    pub default: Vec<i32>,
    pub custom: Vec<i32>,
}

/// Shared application state. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    tables: Arc<SlabTables>,
    legacy: TaxEngine,
    current: TaxEngine,
    default_regime: Regime,
    store: Arc<dyn SlabRepository>,
    sessions: SessionCaches,
}

impl fmt::Debug for Inner {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Inner")
            .field("years", &self.tables.years())
            .field("default_regime", &self.default_regime)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Builds both regime engines over `tables`, with default session
    /// limits.
    ///
    /// # Errors
    ///
    /// Returns [`RegimeConfigError`] when either regime's settings are
    /// invalid.
    pub fn new(
        tables: SlabTables,
        settings: &RegimeSettings,
        default_regime: Regime,
        store: Arc<dyn SlabRepository>,
    ) -> Result<Self, RegimeConfigError> {
        Self::new_with_sessions(tables, settings, default_regime, store, SessionCaches::new())
    }

    pub fn new_with_sessions(
        tables: SlabTables,
        settings: &RegimeSettings,
        default_regime: Regime,
        store: Arc<dyn SlabRepository>,
        sessions: SessionCaches,
    ) -> Result<Self, RegimeConfigError> {
        let tables = Arc::new(tables);
        let legacy = TaxEngine::new(Arc::clone(&tables), settings.build(Regime::Legacy)?);
        let current = TaxEngine::new(Arc::clone(&tables), settings.build(Regime::Current)?);

        Ok(Self {
            inner: Arc::new(Inner {
                tables,
                legacy,
                current,
                default_regime,
                store,
                sessions,
            }),
        })
    }

    pub fn engine(
        &self,
        regime: Regime,
    ) -> &TaxEngine {
        match regime {
            Regime::Legacy => &self.inner.legacy,
            Regime::Current => &self.inner.current,
        }
    }

    pub fn default_regime(&self) -> Regime {
        self.inner.default_regime
    }

    pub fn sessions(&self) -> &SessionCaches {
        &self.inner.sessions
    }

    /// Computes tax for `input`.
    ///
    /// A year without built-in slabs and without caller-supplied slabs uses
    /// the stored table for that year, if any. With a `session` the result
    /// is served from, and added to, that session's cache.
    pub async fn calculate(
        &self,
        mut input: TaxCalculationInput,
        regime: Option<Regime>,
        session: Option<&SessionId>,
    ) -> Result<TaxCalculationResult, ServiceError> {
        let regime = regime.unwrap_or(self.inner.default_regime);

        let has_custom = input.custom_slabs.as_ref().is_some_and(|slabs| !slabs.is_empty());
        if !has_custom && !self.inner.tables.has_defaults(input.year) {
            if let Some(saved) = self.inner.store.get_slabs(input.year).await? {
                debug!(year = input.year, slabs = saved.slabs.len(), "using stored slab table");
                input.custom_slabs = Some(saved.slabs.iter().map(SlabOverride::from).collect());
            }
        }

        let engine = self.engine(regime);
        let result = match session {
            Some(session) => self
                .inner
                .sessions
                .cache_for(session)
                .get_or_compute(engine, &input)?,
            None => engine.calculate(&input)?,
        };
        Ok(result)
    }

    /// Computes the same CTC under two scenarios and diffs the results.
    pub async fn compare(
        &self,
        base_ctc: Decimal,
        first: Scenario,
        second: Scenario,
        regime: Option<Regime>,
        session: Option<&SessionId>,
    ) -> Result<TaxComparison, ServiceError> {
        let first_input =
            TaxCalculationInput::new(first.year, base_ctc).with_hike(first.hike_percent);
        let second_input =
            TaxCalculationInput::new(second.year, base_ctc).with_hike(second.hike_percent);

        let first = self.calculate(first_input, regime, session).await?;
        let second = self.calculate(second_input, regime, session).await?;
        Ok(compare_results(first, second))
    }

    pub async fn list_years(&self) -> Result<SlabYears, ServiceError> {
        Ok(SlabYears {
            default: self.inner.tables.years(),
            custom: self.inner.store.list_years().await?,
        })
    }

    /// The table in effect for `year` when a request brings no slabs of its
    /// own.
    pub async fn get_slabs(
        &self,
        year: i32,
    ) -> Result<Option<SlabTableView>, ServiceError> {
        if let Some(slabs) = self.inner.tables.get(year) {
            return Ok(Some(SlabTableView {
                tax_year: year,
                source: SlabSource::Default,
                slabs: slabs.to_vec(),
                updated_at: None,
            }));
        }

        let saved = self.inner.store.get_slabs(year).await?;
        Ok(saved.map(|saved| SlabTableView {
            tax_year: saved.tax_year,
            source: SlabSource::Custom,
            slabs: saved.slabs,
            updated_at: Some(saved.updated_at),
        }))
    }

    /// Replaces the stored table for `year` with fully specified `slabs`.
    pub async fn put_slabs(
        &self,
        year: i32,
        slabs: &[SlabOverride],
    ) -> Result<SlabTableView, ServiceError> {
        if self.inner.tables.has_defaults(year) {
            return Err(ServiceError::DefaultYear(year));
        }

        let slabs = parse_overrides(Some(slabs))?;
        if slabs.is_empty() {
            return Err(ServiceError::EmptyTable(year));
        }
        validate_table(&slabs)?;

        let saved = self.inner.store.put_slabs(year, &slabs).await?;
        info!(year, slabs = saved.slabs.len(), "stored slab table");

        Ok(SlabTableView {
            tax_year: saved.tax_year,
            source: SlabSource::Custom,
            slabs: saved.slabs,
            updated_at: Some(saved.updated_at),
        })
    }

    pub async fn delete_slabs(
        &self,
        year: i32,
    ) -> Result<(), ServiceError> {
        if self.inner.tables.has_defaults(year) {
            return Err(ServiceError::DefaultYear(year));
        }

        self.inner.store.delete_slabs(year).await?;
        info!(year, "deleted slab table");
        Ok(())
    }
}
