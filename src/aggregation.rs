// 💰 Aggregation Accumulator - (fund, security, weight) → dollar exposure per security
//
// For every holding row:
//   1. normalize the security name (legal forms, share classes)
//   2. resolve it to a Security bucket (exact key, else fuzzy >= threshold, else new)
//   3. resolve the weight to a fraction
//   4. amount = fund.declared_total_value * fraction
//   5. append {fund, amount} to the bucket, add to its total and the fund subtotal
//
// Invariant: Security.total_investment == sum of its funding_sources amounts,
// added in the same order, so the equality is exact.
//
// Reproducibility caveat: totals do not depend on fund order, but which
// spelling becomes a bucket's key under fuzzy matching does.

use crate::normalize::SecurityNormalizer;
use crate::similarity::{best_match, DEFAULT_THRESHOLD};
use crate::weight::{resolve_weight, RawWeight, ResolvedWeight, WeightKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

// ============================================================================
// INPUT TYPES
// ============================================================================

/// A fund as supplied by an adapter (read-only to the engine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fund {
    pub name: String,
    pub declared_total_value: f64,
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub security_name: String,
    #[serde(default)]
    pub raw_weight: RawWeight,
}

impl Holding {
    pub fn new(security_name: impl Into<String>, raw_weight: impl Into<RawWeight>) -> Self {
        Holding {
            security_name: security_name.into(),
            raw_weight: raw_weight.into(),
        }
    }
}

// ============================================================================
// SECURITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingSource {
    pub fund_name: String,
    pub amount: f64,
}

/// Aggregation bucket for one normalized investable asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    /// Normalized security name
    pub asset: String,

    /// Running sum of all contributions
    pub total_investment: f64,

    /// One entry per (fund, security) observation, duplicates kept
    pub funding_sources: Vec<FundingSource>,
}

impl Security {
    fn new(asset: String) -> Self {
        Security {
            asset,
            total_investment: 0.0,
            funding_sources: Vec::new(),
        }
    }

    fn add(&mut self, fund_name: &str, amount: f64) {
        self.funding_sources.push(FundingSource {
            fund_name: fund_name.to_string(),
            amount,
        });
        self.total_investment += amount;
    }

    /// Sum of funding sources in insertion order (consistency check)
    pub fn recomputed_total(&self) -> f64 {
        self.funding_sources
            .iter()
            .fold(0.0, |acc, source| acc + source.amount)
    }

    pub fn is_consistent(&self) -> bool {
        self.recomputed_total() == self.total_investment
    }
}

// ============================================================================
// SECURITY TABLE
// ============================================================================

/// How a security name found its bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketResolution {
    Created,
    Exact,
    Fuzzy { score: u8 },
    /// Name normalized to "" - amount goes to unknown money
    Unclassified,
}

pub struct SecurityTable {
    threshold: u8,
    securities: Vec<Security>,
    /// Bucket keys → bucket. Fuzzy-matched spellings are not cached, so a
    /// repeat spelling is scored against buckets created after its first hit.
    index: HashMap<String, usize>,
    /// Bucket keys only, creation order (fuzzy candidate set)
    keys: Vec<String>,
}

impl SecurityTable {
    pub fn new(threshold: u8) -> Self {
        SecurityTable {
            threshold,
            securities: Vec::new(),
            index: HashMap::new(),
            keys: Vec::new(),
        }
    }

    /// Bucket for a normalized key: exact, else fuzzy, else a new one
    fn resolve_or_insert(&mut self, key: &str) -> (usize, BucketResolution) {
        if let Some(&idx) = self.index.get(key) {
            return (idx, BucketResolution::Exact);
        }

        let matched = best_match(key, self.keys.iter().map(String::as_str), self.threshold)
            .map(|m| (m.key.to_string(), m.score));

        if let Some((matched_key, score)) = matched {
            if let Some(&idx) = self.index.get(&matched_key) {
                debug!(security = %key, bucket = %matched_key, score, "fuzzy security merge");
                return (idx, BucketResolution::Fuzzy { score });
            }
        }

        let idx = self.securities.len();
        self.securities.push(Security::new(key.to_string()));
        self.index.insert(key.to_string(), idx);
        self.keys.push(key.to_string());
        (idx, BucketResolution::Created)
    }

    pub fn get(&self, key: &str) -> Option<&Security> {
        self.index.get(key).map(|&idx| &self.securities[idx])
    }

    pub fn securities(&self) -> &[Security] {
        &self.securities
    }

    pub fn len(&self) -> usize {
        self.securities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }

    pub fn into_securities(self) -> Vec<Security> {
        self.securities
    }
}

// ============================================================================
// RUN STATE
// ============================================================================

/// Per-fund running subtotal, input to the discrepancy reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSubtotal {
    pub fund_name: String,
    pub declared_total_value: f64,
    pub summed_total: f64,
    pub holdings_processed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationCounters {
    pub rows_processed: usize,
    pub blank_weights: usize,
    pub malformed_weights: usize,
    pub percentage_weights: usize,
    pub empty_names: usize,
    pub fuzzy_merges: usize,
}

/// Result of one `accumulate` call
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    /// Bucket key, `None` for unclassified rows
    pub asset: Option<String>,
    pub amount: f64,
    pub weight: ResolvedWeight,
    pub resolution: BucketResolution,
}

/// Everything the accumulator produced, detached from the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSummary {
    pub securities: Vec<Security>,
    pub fund_subtotals: Vec<FundSubtotal>,
    pub unknown_money: f64,
    pub total_sum: f64,
    pub counters: AggregationCounters,
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Run context for the aggregation pass
///
/// Owned by the run that creates it; every holding of every fund goes
/// through `accumulate` exactly once.
pub struct Accumulator {
    normalizer: SecurityNormalizer,
    table: SecurityTable,
    fund_subtotals: Vec<FundSubtotal>,
    fund_index: HashMap<String, usize>,
    unknown_money: f64,
    total_sum: f64,
    counters: AggregationCounters,
}

impl Accumulator {
    pub fn new(normalizer: SecurityNormalizer, threshold: u8) -> Self {
        Accumulator {
            normalizer,
            table: SecurityTable::new(threshold),
            fund_subtotals: Vec::new(),
            fund_index: HashMap::new(),
            unknown_money: 0.0,
            total_sum: 0.0,
            counters: AggregationCounters::default(),
        }
    }

    /// Register a fund so it shows up in discrepancy reports even with no rows
    pub fn open_fund(&mut self, fund: &Fund) {
        self.subtotal_index(fund);
    }

    /// Accumulate one holding row of `fund`
    pub fn accumulate(&mut self, fund: &Fund, security_name: &str, raw_weight: &RawWeight) -> Contribution {
        let weight = resolve_weight(raw_weight);

        if weight.is_malformed() {
            warn!(fund = %fund.name, security = %security_name, raw = ?raw_weight, "malformed holding weight, using 0");
        }

        self.accumulate_resolved(fund, security_name, weight)
    }

    /// Accumulate a row whose weight is already resolved (re-weighted funds).
    /// The resolver's caller logs malformed weights; this only counts them.
    pub fn accumulate_resolved(&mut self, fund: &Fund, security_name: &str, weight: ResolvedWeight) -> Contribution {
        self.counters.rows_processed += 1;

        match weight.kind {
            WeightKind::Malformed => self.counters.malformed_weights += 1,
            WeightKind::Blank => self.counters.blank_weights += 1,
            WeightKind::Percentage => self.counters.percentage_weights += 1,
            WeightKind::Fraction => {}
        }

        let amount = fund.declared_total_value * weight.fraction;

        let fund_idx = self.subtotal_index(fund);
        let subtotal = &mut self.fund_subtotals[fund_idx];
        subtotal.summed_total += amount;
        subtotal.holdings_processed += 1;
        self.total_sum += amount;

        let key = self.normalizer.normalize(security_name);
        if key.is_empty() {
            self.counters.empty_names += 1;
            self.unknown_money += amount;
            warn!(fund = %fund.name, amount, "security name normalizes to empty key, counted as unknown money");
            return Contribution {
                asset: None,
                amount,
                weight,
                resolution: BucketResolution::Unclassified,
            };
        }

        let (idx, resolution) = self.table.resolve_or_insert(&key);
        if matches!(resolution, BucketResolution::Fuzzy { .. }) {
            self.counters.fuzzy_merges += 1;
        }

        let security = &mut self.table.securities[idx];
        security.add(&fund.name, amount);

        Contribution {
            asset: Some(security.asset.clone()),
            amount,
            weight,
            resolution,
        }
    }

    /// Accumulate every holding of `fund`, in row order
    pub fn accumulate_fund(&mut self, fund: &Fund) -> usize {
        self.open_fund(fund);
        for holding in &fund.holdings {
            self.accumulate(fund, &holding.security_name, &holding.raw_weight);
        }
        fund.holdings.len()
    }

    fn subtotal_index(&mut self, fund: &Fund) -> usize {
        if let Some(&idx) = self.fund_index.get(&fund.name) {
            return idx;
        }
        let idx = self.fund_subtotals.len();
        self.fund_subtotals.push(FundSubtotal {
            fund_name: fund.name.clone(),
            declared_total_value: fund.declared_total_value,
            summed_total: 0.0,
            holdings_processed: 0,
        });
        self.fund_index.insert(fund.name.clone(), idx);
        idx
    }

    pub fn securities(&self) -> &[Security] {
        self.table.securities()
    }

    pub fn security(&self, key: &str) -> Option<&Security> {
        self.table.get(key)
    }

    pub fn fund_subtotal(&self, fund_name: &str) -> Option<&FundSubtotal> {
        self.fund_index
            .get(fund_name)
            .map(|&idx| &self.fund_subtotals[idx])
    }

    pub fn fund_subtotals(&self) -> &[FundSubtotal] {
        &self.fund_subtotals
    }

    pub fn unknown_money(&self) -> f64 {
        self.unknown_money
    }

    pub fn total_sum(&self) -> f64 {
        self.total_sum
    }

    pub fn counters(&self) -> &AggregationCounters {
        &self.counters
    }

    pub fn finish(self) -> AggregationSummary {
        AggregationSummary {
            securities: self.table.into_securities(),
            fund_subtotals: self.fund_subtotals,
            unknown_money: self.unknown_money,
            total_sum: self.total_sum,
            counters: self.counters,
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new(SecurityNormalizer::default(), DEFAULT_THRESHOLD)
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Prefix/substring search over security records
///
/// The query goes through the same normalizer as the buckets. Prefix hits
/// rank before substring hits; within each group table order is kept.
/// An empty query returns nothing.
pub fn search_securities<'a>(
    securities: &'a [Security],
    query: &str,
    normalizer: &SecurityNormalizer,
    limit: usize,
) -> Vec<&'a Security> {
    let needle = normalizer.normalize(query);
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let prefix = securities.iter().filter(|s| s.asset.starts_with(&needle));
    let substring = securities
        .iter()
        .filter(|s| !s.asset.starts_with(&needle) && s.asset.contains(&needle));

    prefix.chain(substring).take(limit).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fund(name: &str, total: f64, rows: &[(&str, &str)]) -> Fund {
        Fund {
            name: name.to_string(),
            declared_total_value: total,
            holdings: rows.iter().map(|(n, w)| Holding::new(*n, *w)).collect(),
        }
    }

    #[test]
    fn test_two_funds_fold_into_one_bucket() {
        let mut acc = Accumulator::default();

        let fund_a = fund("Fund A", 1000.0, &[("Acme Inc", "0.5")]);
        let fund_b = fund("Fund B", 2000.0, &[("ACME INCORPORATED", "25")]);

        acc.accumulate_fund(&fund_a);
        acc.accumulate_fund(&fund_b);

        assert_eq!(acc.securities().len(), 1);
        let acme = acc.security("acme inc").unwrap();
        assert_eq!(acme.total_investment, 1000.0);
        assert_eq!(acme.funding_sources.len(), 2);
        assert_eq!(acme.funding_sources[0].fund_name, "Fund A");
        assert_eq!(acme.funding_sources[0].amount, 500.0);
        assert_eq!(acme.funding_sources[1].amount, 500.0);

        assert_eq!(acc.fund_subtotal("Fund A").unwrap().summed_total, 500.0);
        assert_eq!(acc.fund_subtotal("Fund B").unwrap().summed_total, 500.0);
        assert_eq!(acc.total_sum(), 1000.0);
    }

    #[test]
    fn test_total_matches_funding_sources_after_every_step() {
        let mut acc = Accumulator::default();
        let rows = [
            ("Apple Inc", "0.071"),
            ("Microsoft Corporation", "6.3"),
            ("apple inc.", "0.013"),
            ("Alphabet Inc Class A", "0.021"),
            ("Alphabet Inc Class C", "1.9"),
            ("Microsoft Corp", "0.0333"),
        ];
        let funds = [
            fund("F1", 1234567.89, &rows),
            fund("F2", 987.65, &rows),
            fund("F3", 0.1, &rows),
        ];

        for f in &funds {
            for h in &f.holdings {
                acc.accumulate(f, &h.security_name, &h.raw_weight);
                for security in acc.securities() {
                    assert_eq!(security.recomputed_total(), security.total_investment);
                    assert!(security.is_consistent());
                }
            }
        }
    }

    #[test]
    fn test_share_classes_collapse() {
        let mut acc = Accumulator::default();
        let f = fund(
            "F",
            100.0,
            &[("Alphabet Inc Class A", "0.1"), ("Alphabet Inc Class C", "0.2")],
        );
        acc.accumulate_fund(&f);

        assert_eq!(acc.securities().len(), 1);
        assert_eq!(acc.securities()[0].asset, "alphabet inc");
        assert_eq!(acc.securities()[0].funding_sources.len(), 2);
    }

    #[test]
    fn test_share_classes_kept_apart_without_grouping() {
        let f = fund(
            "F",
            100.0,
            &[("Alphabet Inc Class A", "0.1"), ("Alphabet Inc Class C", "0.2")],
        );

        // "a alphabet class inc" vs "alphabet c class inc" scores 90
        let mut acc = Accumulator::new(SecurityNormalizer::new(false), 95);
        acc.accumulate_fund(&f);
        assert_eq!(acc.securities().len(), 2);
        assert!(acc.security("alphabet inc class a").is_some());
        assert!(acc.security("alphabet inc class c").is_some());
    }

    #[test]
    fn test_fuzzy_bucket_merge() {
        let mut acc = Accumulator::default();
        let f = fund("F", 100.0, &[("Exxon Mobil Corp", "0.1"), ("Exxon Mobil Corp.", "0.1")]);
        acc.accumulate_fund(&f);

        assert_eq!(acc.securities().len(), 1);
        assert_eq!(acc.securities()[0].asset, "exxon mobil corp");
        assert_eq!(acc.counters().fuzzy_merges, 1);
    }

    #[test]
    fn test_repeat_fuzzy_spelling_is_rescored() {
        let mut acc = Accumulator::new(SecurityNormalizer::default(), 75);
        let f = fund(
            "F",
            100.0,
            &[
                ("Vandelay", "0.1"),
                ("Vandelay Ind", "0.1"),
                ("Vandelay Indus", "0.1"),
                ("Vandelay Ind", "0.1"),
            ],
        );
        acc.accumulate_fund(&f);

        assert_eq!(acc.securities().len(), 2);
        assert_eq!(acc.counters().fuzzy_merges, 2);
        assert!(acc.security("vandelay ind").is_none());
        assert_eq!(acc.security("vandelay").unwrap().funding_sources.len(), 2);
        // Second sighting lands on the closer bucket created in between
        assert_eq!(acc.security("vandelay indus").unwrap().funding_sources.len(), 2);
    }

    #[test]
    fn test_duplicate_rows_within_fund_are_kept() {
        let mut acc = Accumulator::default();
        let f = fund("F", 100.0, &[("Acme", "0.1"), ("Acme", "0.2")]);
        acc.accumulate_fund(&f);

        let acme = acc.security("acme").unwrap();
        assert_eq!(acme.funding_sources.len(), 2);
        assert!(acme.funding_sources.iter().all(|s| s.fund_name == "F"));
    }

    #[test]
    fn test_empty_name_goes_to_unknown_money() {
        let mut acc = Accumulator::default();
        let f = fund("F", 1000.0, &[("", "0.1"), ("  ", "0.2"), ("Acme", "0.3")]);
        acc.accumulate_fund(&f);

        assert_eq!(acc.securities().len(), 1);
        assert_eq!(acc.counters().empty_names, 2);
        assert!((acc.unknown_money() - 300.0).abs() < 1e-9);
        // Still counted towards the fund
        assert!((acc.fund_subtotal("F").unwrap().summed_total - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_weight_counters() {
        let mut acc = Accumulator::default();
        let f = Fund {
            name: "F".to_string(),
            declared_total_value: 100.0,
            holdings: vec![
                Holding::new("A", "0.1"),
                Holding::new("B", "10"),
                Holding::new("C", ""),
                Holding::new("D", "n/a"),
                Holding {
                    security_name: "E".to_string(),
                    raw_weight: RawWeight::Absent,
                },
            ],
        };
        acc.accumulate_fund(&f);

        let counters = acc.counters();
        assert_eq!(counters.rows_processed, 5);
        assert_eq!(counters.percentage_weights, 1);
        assert_eq!(counters.blank_weights, 2);
        assert_eq!(counters.malformed_weights, 1);
        assert!((acc.fund_subtotal("F").unwrap().summed_total - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_fund_without_rows() {
        let mut acc = Accumulator::default();
        let f = fund("Empty", 500.0, &[]);
        acc.accumulate_fund(&f);

        let subtotal = acc.fund_subtotal("Empty").unwrap();
        assert_eq!(subtotal.summed_total, 0.0);
        assert_eq!(subtotal.holdings_processed, 0);
    }

    #[test]
    fn test_fund_order_does_not_change_totals() {
        let f1 = fund("F1", 1000.0, &[("Acme", "0.5"), ("Globex", "0.25")]);
        let f2 = fund("F2", 400.0, &[("Globex", "50"), ("Acme", "0.5")]);

        let mut forward = Accumulator::default();
        forward.accumulate_fund(&f1);
        forward.accumulate_fund(&f2);

        let mut backward = Accumulator::default();
        backward.accumulate_fund(&f2);
        backward.accumulate_fund(&f1);

        for key in ["acme", "globex"] {
            assert_eq!(
                forward.security(key).unwrap().total_investment,
                backward.security(key).unwrap().total_investment
            );
        }
    }

    #[test]
    fn test_search_prefix_before_substring() {
        let mut acc = Accumulator::default();
        let f = fund(
            "F",
            100.0,
            &[
                ("Bank of America Corp", "0.1"),
                ("American Express Co", "0.1"),
                ("Amazon.com Inc", "0.1"),
                ("Walmart Inc", "0.1"),
            ],
        );
        acc.accumulate_fund(&f);

        let normalizer = SecurityNormalizer::default();
        let hits = search_securities(acc.securities(), "AMER", &normalizer, 10);
        let assets: Vec<&str> = hits.iter().map(|s| s.asset.as_str()).collect();
        assert_eq!(assets, vec!["american express co", "bank of america corp"]);

        let bounded = search_securities(acc.securities(), "a", &normalizer, 2);
        assert_eq!(bounded.len(), 2);

        assert!(search_securities(acc.securities(), "   ", &normalizer, 10).is_empty());
    }
}
