use std::collections::BTreeMap;
use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;
use tax_core::{RepositoryError, Slab, SlabError, SlabRepository, SlabTables, validate_table};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when loading slab data.
#[derive(Debug, Error)]
pub enum SlabLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid slab table for {tax_year}: {source}")]
    InvalidTable {
        tax_year: i32,
        #[source]
        source: SlabError,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for SlabLoaderError {
    fn from(err: csv::Error) -> Self {
        SlabLoaderError::CsvParse(err.to_string())
    }
}

/// A single row of a slab CSV file.
///
/// - `tax_year`: fiscal year the slab belongs to (e.g., 2025)
/// - `start`: inclusive lower bound
/// - `end`: upper bound (empty for unbounded)
/// - `rate`: fraction, e.g. `0.05` for 5%
///
/// Rows for one year must appear in ascending `start` order.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SlabRecord {
    pub tax_year: i32,
    pub start: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub end: Option<Decimal>,
    pub rate: Decimal,
}

impl From<&SlabRecord> for Slab {
    fn from(record: &SlabRecord) -> Self {
        Slab {
            start: record.start,
            end: record.end,
            rate: record.rate,
        }
    }
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Reads slab tables from CSV and writes them to a [`SlabRepository`].
pub struct SlabTableLoader;

impl SlabTableLoader {
    /// Parse slab records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<SlabRecord>, SlabLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: SlabRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Groups records by year, keeping file order within each year, and
    /// validates every resulting table.
    pub fn group(
        records: &[SlabRecord]
    ) -> Result<BTreeMap<i32, Vec<Slab>>, SlabLoaderError> {
        let mut tables: BTreeMap<i32, Vec<Slab>> = BTreeMap::new();
        for record in records {
            tables.entry(record.tax_year).or_default().push(Slab::from(record));
        }

        for (tax_year, slabs) in &tables {
            validate_table(slabs).map_err(|source| SlabLoaderError::InvalidTable {
                tax_year: *tax_year,
                source,
            })?;
        }

        Ok(tables)
    }

    /// Builds an in-memory [`SlabTables`] from parsed records.
    pub fn into_tables(records: &[SlabRecord]) -> Result<SlabTables, SlabLoaderError> {
        let mut tables = SlabTables::new();
        for (tax_year, slabs) in Self::group(records)? {
            tables
                .insert(tax_year, slabs)
                .map_err(|source| SlabLoaderError::InvalidTable { tax_year, source })?;
        }
        Ok(tables)
    }

    /// Load slab records into the repository.
    ///
    /// Every table is validated before anything is written. Each year in
    /// `records` then has its stored table replaced as a whole, so running
    /// the same load twice leaves the store unchanged.
    ///
    /// Returns the number of slabs written.
    pub async fn load<R: SlabRepository + ?Sized>(
        repo: &R,
        records: &[SlabRecord],
    ) -> Result<usize, SlabLoaderError> {
        let tables = Self::group(records)?;
        let mut written = 0;

        for (tax_year, slabs) in &tables {
            repo.put_slabs(*tax_year, slabs).await?;
            debug!(tax_year, slabs = slabs.len(), "replaced stored slab table");
            written += slabs.len();
        }

        info!(years = tables.len(), slabs = written, "slab tables loaded");
        Ok(written)
    }
}
