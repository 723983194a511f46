// Exposure Ledger - Core Library
// Entity resolution + weighted exposure aggregation, used by the CLI,
// the HTTP facade and tests

pub mod normalize;     // Name Normalizer (entities + securities)
pub mod similarity;    // Token-sort similarity + best match
pub mod entities;      // Entity model + ledger
pub mod weight;        // Weight Resolver
pub mod aggregation;   // Aggregation Accumulator + security search
pub mod discrepancy;   // Declared vs. attributed fund value
pub mod reweighting;   // Restricted-company exclusion
pub mod adapters;      // Source files → records / funds
pub mod config;
pub mod error;
pub mod pipeline;      // Run contexts
pub mod output;

// Re-export commonly used types
pub use normalize::{normalize_name, SecurityNormalizer};
pub use similarity::{best_match, token_sort_ratio, FuzzyMatch, DEFAULT_THRESHOLD};
pub use entities::{
    Entity, EntityRecord, EntityType, SourcePayload,
    EntityLedger, EntityStatistics, MatchPolicy, MergeOutcome,
};
pub use weight::{resolve, resolve_weight, RawWeight, ResolvedWeight, WeightKind};
pub use aggregation::{
    Accumulator, AggregationSummary, Fund, FundSubtotal, FundingSource, Holding,
    Security, search_securities,
};
pub use discrepancy::{DiscrepancyReport, DiscrepancyReporter, DiscrepancyStatus, FundDiscrepancy};
pub use reweighting::{ExcludedHolding, ReweightedFund, Reweighter};
pub use adapters::{
    SourceAdapter, SourceKind, AdapterOutput,
    detect_source, get_adapter,
    FundHoldings, FundTotals, load_holdings,
};
pub use config::{AssetSelection, EngineConfig, MissingTotalPolicy, ProcessingOrder};
pub use error::LedgerError;
pub use pipeline::{
    AggregationOutput, AggregationRun, UnificationRun, UnifiedDataset,
    run_aggregation, run_unification,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
