// 🚫 Fund Re-weighting - Drop restricted companies, renormalize what is left
//
// Each holding whose security key fuzzy-matches an exclusion (token-sort
// score >= threshold) is removed; the remaining resolved weights are
// scaled so they sum to 1. A fund left with no weight contributes nothing.

use crate::aggregation::Fund;
use crate::normalize::SecurityNormalizer;
use crate::similarity::best_match;
use crate::weight::{resolve_weight, ResolvedWeight};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ReweightedHolding {
    pub security_name: String,
    pub weight: ResolvedWeight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedHolding {
    pub security_name: String,
    pub matched_exclusion: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReweightedFund {
    /// Kept holdings, original row order, weights summing to 1 (or all 0)
    pub holdings: Vec<ReweightedHolding>,
    pub excluded: Vec<ExcludedHolding>,
    /// Sum of resolved weights before exclusion
    pub original_weight_sum: f64,
    /// Sum of resolved weights of kept rows before renormalizing
    pub retained_weight_sum: f64,
}

// ============================================================================
// REWEIGHTER
// ============================================================================

pub struct Reweighter {
    normalizer: SecurityNormalizer,
    /// Normalized exclusion keys, configuration order
    exclusions: Vec<String>,
    threshold: u8,
}

impl Reweighter {
    pub fn new<S: AsRef<str>>(exclusions: &[S], normalizer: SecurityNormalizer, threshold: u8) -> Self {
        let exclusions = exclusions
            .iter()
            .map(|e| normalizer.normalize(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();

        Reweighter {
            normalizer,
            exclusions,
            threshold,
        }
    }

    /// No exclusions configured: funds pass through untouched
    pub fn is_empty(&self) -> bool {
        self.exclusions.is_empty()
    }

    pub fn exclusion_for(&self, security_name: &str) -> Option<(String, u8)> {
        let key = self.normalizer.normalize(security_name);
        if key.is_empty() {
            return None;
        }
        best_match(&key, self.exclusions.iter().map(String::as_str), self.threshold)
            .map(|m| (m.key.to_string(), m.score))
    }

    pub fn reweight(&self, fund: &Fund) -> ReweightedFund {
        let mut kept = Vec::new();
        let mut excluded = Vec::new();
        let mut original_weight_sum = 0.0;

        for holding in &fund.holdings {
            let weight = resolve_weight(&holding.raw_weight);
            if weight.is_malformed() {
                warn!(fund = %fund.name, security = %holding.security_name, raw = ?holding.raw_weight, "malformed holding weight, using 0");
            }
            original_weight_sum += weight.fraction;

            match self.exclusion_for(&holding.security_name) {
                Some((matched_exclusion, score)) => excluded.push(ExcludedHolding {
                    security_name: holding.security_name.clone(),
                    matched_exclusion,
                    score,
                }),
                None => kept.push(ReweightedHolding {
                    security_name: holding.security_name.clone(),
                    weight,
                }),
            }
        }

        let retained_weight_sum: f64 = kept.iter().map(|h| h.weight.fraction).sum();

        for holding in &mut kept {
            holding.weight.fraction = if retained_weight_sum > 0.0 {
                holding.weight.fraction / retained_weight_sum
            } else {
                0.0
            };
        }

        if !excluded.is_empty() {
            info!(
                fund = %fund.name,
                excluded = excluded.len(),
                retained_weight = retained_weight_sum,
                "re-weighted fund after exclusions"
            );
        }

        ReweightedFund {
            holdings: kept,
            excluded,
            original_weight_sum,
            retained_weight_sum,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Holding;
    use crate::weight::WeightKind;
    use std::sync::{Arc, Mutex};

    fn fund(rows: &[(&str, &str)]) -> Fund {
        Fund {
            name: "ESG".to_string(),
            declared_total_value: 1000.0,
            holdings: rows.iter().map(|(n, w)| Holding::new(*n, *w)).collect(),
        }
    }

    fn reweighter(exclusions: &[&str]) -> Reweighter {
        Reweighter::new(exclusions, SecurityNormalizer::default(), 95)
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_malformed_weight_is_logged() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let r = reweighter(&["Chevron Corp"]);
        let out = tracing::subscriber::with_default(subscriber, || {
            r.reweight(&fund(&[("Chevron Corp", "0.2"), ("Apple Inc", "n/a"), ("Microsoft Corp", "0.3")]))
        });

        assert!(out.holdings[0].weight.is_malformed());
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("malformed holding weight"));
        assert!(text.contains("Apple Inc"));
    }

    #[test]
    fn test_excludes_and_renormalizes() {
        let r = reweighter(&["Exxon Mobil Corporation", "Chevron Corp"]);
        let out = r.reweight(&fund(&[
            ("EXXON MOBIL CORP", "0.2"),
            ("Apple Inc", "0.3"),
            ("Microsoft Corp", "0.3"),
            ("Chevron Corporation", "0.2"),
        ]));

        assert_eq!(out.excluded.len(), 2);
        assert_eq!(out.excluded[0].matched_exclusion, "exxon mobil corp");
        assert_eq!(out.holdings.len(), 2);
        assert!((out.retained_weight_sum - 0.6).abs() < 1e-12);
        assert!((out.original_weight_sum - 1.0).abs() < 1e-12);

        let total: f64 = out.holdings.iter().map(|h| h.weight.fraction).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((out.holdings[0].weight.fraction - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_everything_excluded() {
        let r = reweighter(&["Acme"]);
        let out = r.reweight(&fund(&[("ACME", "1")]));

        assert!(out.holdings.is_empty());
        assert_eq!(out.retained_weight_sum, 0.0);
    }

    #[test]
    fn test_zero_retained_weight_gives_zero_fractions() {
        let r = reweighter(&["Acme"]);
        let out = r.reweight(&fund(&[("Acme", "0.5"), ("Globex", ""), ("Initech", "junk")]));

        assert_eq!(out.holdings.len(), 2);
        assert!(out.holdings.iter().all(|h| h.weight.fraction == 0.0));
        // Kind survives re-weighting so the accumulator can still count it
        assert_eq!(out.holdings[1].weight.kind, WeightKind::Malformed);
    }

    #[test]
    fn test_empty_exclusion_list() {
        let r = reweighter(&["", "  "]);
        assert!(r.is_empty());
        assert!(r.exclusion_for("Acme").is_none());
    }

    #[test]
    fn test_close_but_not_matching_names_kept() {
        let r = reweighter(&["Hess Corp"]);
        assert!(r.exclusion_for("Hershey Co").is_none());
        assert!(r.exclusion_for("HESS CORPORATION").is_some());
    }
}
