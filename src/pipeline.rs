// 🔁 Pipeline - Explicit run contexts for unification and aggregation
//
// Each run owns its ledger / security table from start to finish; nothing
// survives between runs. Input files are arranged by the configured
// processing order before anything is read, so two runs over the same
// files produce the same canonical names.

use crate::adapters::{detect_source, get_adapter, load_holdings, AdapterOutput, FundHoldings, FundTotals, SourceKind};
use crate::aggregation::{Accumulator, AggregationSummary, Fund};
use crate::config::{AssetSelection, EngineConfig, MissingTotalPolicy};
use crate::discrepancy::{DiscrepancyReport, DiscrepancyReporter, SkippedFund};
use crate::entities::{Entity, EntityLedger, EntityStatistics, MatchPolicy, MergeOutcome};
use crate::error::LedgerError;
use crate::normalize::SecurityNormalizer;
use crate::output::file_digest;
use crate::reweighting::{ExcludedHolding, Reweighter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// UNIFICATION OUTPUT
// ============================================================================

/// Load summary for one entity source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub name: String,
    pub kind: SourceKind,
    pub file: String,
    pub sha256: Option<String>,
    pub adapter_version: String,
    pub records_read: usize,
    pub records_skipped: usize,
    /// New identities this source created
    pub entities_loaded: usize,
    /// Records folded into an identity that already existed
    pub records_merged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedMetadata {
    pub generated_at: DateTime<Utc>,
    pub matching_policy: MatchPolicy,
    pub sources: Vec<SourceSummary>,
    pub total_entities: usize,
    pub statistics: EntityStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDataset {
    pub metadata: UnifiedMetadata,
    /// Sorted by case-folded name
    pub entities: Vec<Entity>,
}

// ============================================================================
// UNIFICATION RUN
// ============================================================================

pub struct UnificationRun {
    ledger: EntityLedger,
    sources: Vec<SourceSummary>,
}

impl UnificationRun {
    pub fn new(config: &EngineConfig) -> Self {
        UnificationRun {
            ledger: EntityLedger::new(config.matching.policy, config.matching.entity_threshold),
            sources: Vec::new(),
        }
    }

    /// Detect, load and merge one source file
    pub fn ingest_file(&mut self, file_path: &Path) -> Result<&SourceSummary> {
        let kind = detect_source(file_path)?;
        let adapter = get_adapter(kind);
        let output = adapter.load(file_path)?;
        let sha256 = file_digest(file_path)
            .with_context(|| format!("Failed to hash {}", file_path.display()))?;

        let summary = self.merge_output(output, kind, adapter.version());
        summary.file = file_path.display().to_string();
        summary.sha256 = Some(sha256);

        info!(
            source = %summary.name,
            file = %summary.file,
            loaded = summary.entities_loaded,
            merged = summary.records_merged,
            skipped = summary.records_skipped,
            "loaded entity source"
        );
        Ok(&*summary)
    }

    /// Merge records an adapter already produced
    pub fn merge_output(&mut self, output: AdapterOutput, kind: SourceKind, version: &str) -> &mut SourceSummary {
        let mut summary = SourceSummary {
            name: output.source,
            kind,
            file: String::new(),
            sha256: None,
            adapter_version: version.to_string(),
            records_read: output.records_read,
            records_skipped: output.records_skipped,
            entities_loaded: 0,
            records_merged: 0,
        };

        for record in output.records {
            match self.ledger.merge(record) {
                MergeOutcome::Created(_) => summary.entities_loaded += 1,
                MergeOutcome::MergedExact(_) | MergeOutcome::MergedFuzzy { .. } => summary.records_merged += 1,
                MergeOutcome::SkippedEmptyName => summary.records_skipped += 1,
            }
        }

        self.sources.push(summary);
        let last = self.sources.len() - 1;
        &mut self.sources[last]
    }

    pub fn ledger(&self) -> &EntityLedger {
        &self.ledger
    }

    pub fn finish(self) -> UnifiedDataset {
        let statistics = self.ledger.statistics();
        let matching_policy = self.ledger.policy();
        let entities = self.ledger.into_sorted_entities();

        UnifiedDataset {
            metadata: UnifiedMetadata {
                generated_at: Utc::now(),
                matching_policy,
                sources: self.sources,
                total_entities: entities.len(),
                statistics,
            },
            entities,
        }
    }
}

/// Merge every entity source file into one dataset
pub fn run_unification(config: &EngineConfig, files: Vec<PathBuf>) -> Result<UnifiedDataset> {
    let mut run = UnificationRun::new(config);

    for file in config.order.arrange(files) {
        run.ingest_file(&file)?;
    }

    let dataset = run.finish();
    info!(
        entities = dataset.metadata.total_entities,
        multi_source = dataset.metadata.statistics.multi_source_entities,
        "unification complete"
    );
    Ok(dataset)
}

// ============================================================================
// AGGREGATION OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundExclusions {
    pub fund_name: String,
    pub excluded: Vec<ExcludedHolding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsInput {
    pub fund_name: String,
    pub file: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationOutput {
    pub generated_at: DateTime<Utc>,
    pub asset_selection: AssetSelection,
    pub inputs: Vec<HoldingsInput>,
    pub summary: AggregationSummary,
    pub discrepancies: DiscrepancyReport,
    pub exclusions: Vec<FundExclusions>,
}

// ============================================================================
// AGGREGATION RUN
// ============================================================================

pub struct AggregationRun {
    accumulator: Accumulator,
    reweighter: Reweighter,
    asset_selection: AssetSelection,
    on_missing_total: MissingTotalPolicy,
    inputs: Vec<HoldingsInput>,
    skipped: Vec<SkippedFund>,
    exclusions: Vec<FundExclusions>,
}

impl AggregationRun {
    pub fn new(config: &EngineConfig) -> Self {
        let normalizer = SecurityNormalizer::new(config.aggregation.group_share_classes);

        AggregationRun {
            accumulator: Accumulator::new(normalizer, config.matching.security_threshold),
            reweighter: Reweighter::new(
                &config.aggregation.exclusions,
                normalizer,
                config.aggregation.exclusion_threshold,
            ),
            asset_selection: config.aggregation.asset_selection,
            on_missing_total: config.aggregation.on_missing_total,
            inputs: Vec::new(),
            skipped: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// Accumulate one fund, re-weighting first when exclusions are configured
    pub fn add_fund(&mut self, fund: &Fund) {
        self.accumulator.open_fund(fund);

        if self.reweighter.is_empty() {
            self.accumulator.accumulate_fund(fund);
        } else {
            let reweighted = self.reweighter.reweight(fund);
            for holding in &reweighted.holdings {
                self.accumulator
                    .accumulate_resolved(fund, &holding.security_name, holding.weight);
            }
            if !reweighted.excluded.is_empty() {
                self.exclusions.push(FundExclusions {
                    fund_name: fund.name.clone(),
                    excluded: reweighted.excluded,
                });
            }
        }

        info!(fund = %fund.name, holdings = fund.holdings.len(), "aggregated fund");
    }

    /// Attach the declared value and accumulate
    ///
    /// A fund missing from `totals` is skipped and listed in the report, or
    /// returned as an error under the abort policy. Returns whether the fund
    /// was accumulated.
    pub fn add_holdings(&mut self, holdings: FundHoldings, totals: &FundTotals) -> crate::error::Result<bool> {
        let declared = match totals.require(&holdings.fund_name) {
            Ok(value) => value,
            Err(err) => {
                if self.on_missing_total == MissingTotalPolicy::Abort {
                    return Err(err);
                }
                warn!(fund = %holdings.fund_name, "no declared total value, skipping fund");
                self.skipped.push(SkippedFund {
                    fund_name: holdings.fund_name,
                    reason: err.to_string(),
                });
                return Ok(false);
            }
        };

        let fund = holdings.into_fund(declared, self.asset_selection);
        self.add_fund(&fund);
        Ok(true)
    }

    /// Load a holdings file and accumulate it
    pub fn ingest_file(&mut self, file_path: &Path, totals: &FundTotals) -> Result<bool> {
        let holdings = load_holdings(file_path)?;
        let sha256 = file_digest(file_path)
            .with_context(|| format!("Failed to hash {}", file_path.display()))?;

        self.inputs.push(HoldingsInput {
            fund_name: holdings.fund_name.clone(),
            file: file_path.display().to_string(),
            sha256,
        });

        Ok(self.add_holdings(holdings, totals)?)
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn finish(self, reporter: &DiscrepancyReporter) -> AggregationOutput {
        let summary = self.accumulator.finish();
        let discrepancies = reporter.report_all(&summary.fund_subtotals, self.skipped);

        AggregationOutput {
            generated_at: Utc::now(),
            asset_selection: self.asset_selection,
            inputs: self.inputs,
            summary,
            discrepancies,
            exclusions: self.exclusions,
        }
    }
}

/// Aggregate every holdings file against the fund totals lookup
pub fn run_aggregation(config: &EngineConfig, holdings_files: Vec<PathBuf>, totals_path: &Path) -> Result<AggregationOutput> {
    let totals = FundTotals::load(totals_path)?;
    let mut run = AggregationRun::new(config);

    for file in config.order.arrange(holdings_files) {
        run.ingest_file(&file, &totals)
            .with_context(|| format!("Aggregation aborted at {}", file.display()))?;
    }

    let output = run.finish(&DiscrepancyReporter::new());
    info!(
        securities = output.summary.securities.len(),
        total_sum = output.summary.total_sum,
        unknown_money = output.summary.unknown_money,
        skipped_funds = output.discrepancies.skipped_funds.len(),
        "aggregation complete"
    );
    Ok(output)
}

/// Typed error behind an aggregation failure, if any
pub fn ledger_error(err: &anyhow::Error) -> Option<&LedgerError> {
    err.chain().find_map(|cause| cause.downcast_ref::<LedgerError>())
}

// ============================================================================
// TESTS
// ============================================================================
