// 🔌 Source Adapters - One per source layout, all producing EntityRecords
//
// The engine never reads files itself. Each adapter turns one source's
// file into records (or explicit skips); I/O and format errors stay here
// and carry the file name as context.
//
// Adding a source = one new SourceKind + one SourceAdapter impl.

pub mod afsc;
pub mod boycott;
pub mod generic;
pub mod holdings;
pub mod who_profits;

use crate::entities::EntityRecord;
use crate::error::LedgerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use afsc::AfscAdapter;
pub use boycott::BoycottAdapter;
pub use generic::GenericCsvAdapter;
pub use holdings::{load_holdings, FundHoldings, FundTotals};
pub use who_profits::WhoProfitsAdapter;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Which adapter understands a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    BoycottBrands,
    WhoProfits,
    InvestigateAfsc,
    GenericCsv,
}

impl SourceKind {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceKind::BoycottBrands => "Boycott brands",
            SourceKind::WhoProfits => "Who Profits",
            SourceKind::InvestigateAfsc => "AFSC Investigate",
            SourceKind::GenericCsv => "Generic CSV",
        }
    }
}

/// What one adapter run produced
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    /// Source identifier stamped on every record
    pub source: String,
    pub records: Vec<EntityRecord>,
    /// Rows/items seen in the file
    pub records_read: usize,
    /// Rows the adapter dropped (no usable name)
    pub records_skipped: usize,
}

/// SourceAdapter - Core trait
///
/// `load` either returns records or fails for the whole file; a single bad
/// row is skipped and counted, never fatal.
pub trait SourceAdapter: Send + Sync {
    fn load(&self, file_path: &Path) -> Result<AdapterOutput>;

    fn source_kind(&self) -> SourceKind;

    /// Get adapter version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// DETECTION + FACTORY
// ============================================================================

/// Detect the adapter for a file from its name
///
/// ```
/// use exposure_ledger::adapters::{detect_source, SourceKind};
/// use std::path::Path;
///
/// assert_eq!(detect_source(Path::new("boycott_brands_latest.json")).unwrap(), SourceKind::BoycottBrands);
/// assert_eq!(detect_source(Path::new("who_profits_results_latest.json")).unwrap(), SourceKind::WhoProfits);
/// assert_eq!(detect_source(Path::new("investigate-dataset-july-2025.csv")).unwrap(), SourceKind::InvestigateAfsc);
/// assert_eq!(detect_source(Path::new("watchlist.csv")).unwrap(), SourceKind::GenericCsv);
/// assert!(detect_source(Path::new("notes.txt")).is_err());
/// ```
pub fn detect_source(file_path: &Path) -> Result<SourceKind> {
    let filename = file_name(file_path);
    let filename_lower = filename.to_lowercase();

    if filename_lower.contains("boycott") {
        return Ok(SourceKind::BoycottBrands);
    }

    if filename_lower.contains("who_profits")
        || filename_lower.contains("who-profits")
        || filename_lower.contains("whoprofits")
    {
        return Ok(SourceKind::WhoProfits);
    }

    if filename_lower.contains("afsc") || filename_lower.contains("investigate") {
        return Ok(SourceKind::InvestigateAfsc);
    }

    if filename_lower.ends_with(".csv") {
        return Ok(SourceKind::GenericCsv);
    }

    Err(LedgerError::UnknownSource {
        file: filename.to_string(),
    }
    .into())
}

/// Factory: adapter for a source kind
pub fn get_adapter(kind: SourceKind) -> Box<dyn SourceAdapter> {
    match kind {
        SourceKind::BoycottBrands => Box::new(BoycottAdapter::new()),
        SourceKind::WhoProfits => Box::new(WhoProfitsAdapter::new()),
        SourceKind::InvestigateAfsc => Box::new(AfscAdapter::new()),
        SourceKind::GenericCsv => Box::new(GenericCsvAdapter::new()),
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

pub(crate) fn file_name(file_path: &Path) -> &str {
    file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
}

/// Empty strings become None
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// "a|b| c" → ["a", "b", "c"]
pub(crate) fn split_pipe(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
