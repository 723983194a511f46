// 🧮 Discrepancy Reporter - Declared fund value vs. what aggregation attributed
//
// Formula:
//   delta = declared_total_value - sum(amounts contributed by the fund this run)
//
// Non-zero deltas are normal: residual cash, rounding, unlisted holdings.
// They are surfaced per fund and in aggregate, never dropped.

use crate::aggregation::FundSubtotal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// DISCREPANCY STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyStatus {
    /// |delta| within tolerance
    Balanced,

    /// Holdings account for less than the declared value (delta > 0)
    Underallocated,

    /// Holdings account for more than the declared value (delta < 0)
    Overallocated,
}

// ============================================================================
// PER-FUND + RUN REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundDiscrepancy {
    pub fund_name: String,
    pub declared_total_value: f64,
    pub summed_total: f64,
    pub delta: f64,
    pub holdings_processed: usize,
    pub status: DiscrepancyStatus,
}

impl FundDiscrepancy {
    /// Share of the declared value the holdings did not account for
    pub fn unattributed_ratio(&self) -> Option<f64> {
        if self.declared_total_value == 0.0 {
            None
        } else {
            Some(self.delta / self.declared_total_value)
        }
    }
}

/// A fund that never reached the accumulator, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFund {
    pub fund_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub funds: Vec<FundDiscrepancy>,
    pub skipped_funds: Vec<SkippedFund>,
    pub total_declared: f64,
    pub total_summed: f64,
    pub total_delta: f64,
    pub reported_at: DateTime<Utc>,
}

impl DiscrepancyReport {
    pub fn fund(&self, fund_name: &str) -> Option<&FundDiscrepancy> {
        self.funds.iter().find(|f| f.fund_name == fund_name)
    }

    /// Funds whose delta is outside tolerance
    pub fn unbalanced(&self) -> impl Iterator<Item = &FundDiscrepancy> {
        self.funds
            .iter()
            .filter(|f| f.status != DiscrepancyStatus::Balanced)
    }

    pub fn summary(&self) -> String {
        format!(
            "Discrepancies: {} funds ({} unbalanced, {} skipped), declared ${:.2}, attributed ${:.2}, delta ${:.2}",
            self.funds.len(),
            self.unbalanced().count(),
            self.skipped_funds.len(),
            self.total_declared,
            self.total_summed,
            self.total_delta
        )
    }
}

// ============================================================================
// DISCREPANCY REPORTER
// ============================================================================

pub struct DiscrepancyReporter {
    /// |delta| below this counts as balanced (default: $0.01)
    pub tolerance: f64,
}

impl DiscrepancyReporter {
    pub fn new() -> Self {
        DiscrepancyReporter { tolerance: 0.01 }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        DiscrepancyReporter { tolerance }
    }

    /// Delta for one fund
    pub fn report(&self, subtotal: &FundSubtotal) -> FundDiscrepancy {
        let delta = subtotal.declared_total_value - subtotal.summed_total;

        let status = if delta.abs() < self.tolerance {
            DiscrepancyStatus::Balanced
        } else if delta > 0.0 {
            DiscrepancyStatus::Underallocated
        } else {
            DiscrepancyStatus::Overallocated
        };

        FundDiscrepancy {
            fund_name: subtotal.fund_name.clone(),
            declared_total_value: subtotal.declared_total_value,
            summed_total: subtotal.summed_total,
            delta,
            holdings_processed: subtotal.holdings_processed,
            status,
        }
    }

    /// Per-fund deltas plus run totals
    pub fn report_all(&self, subtotals: &[FundSubtotal], skipped_funds: Vec<SkippedFund>) -> DiscrepancyReport {
        let funds: Vec<FundDiscrepancy> = subtotals.iter().map(|s| self.report(s)).collect();

        let total_declared: f64 = funds.iter().map(|f| f.declared_total_value).sum();
        let total_summed: f64 = funds.iter().map(|f| f.summed_total).sum();

        DiscrepancyReport {
            funds,
            skipped_funds,
            total_declared,
            total_summed,
            total_delta: total_declared - total_summed,
            reported_at: Utc::now(),
        }
    }
}

impl Default for DiscrepancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn subtotal(name: &str, declared: f64, summed: f64) -> FundSubtotal {
        FundSubtotal {
            fund_name: name.to_string(),
            declared_total_value: declared,
            summed_total: summed,
            holdings_processed: 1,
        }
    }

    #[test]
    fn test_report_underallocated() {
        let reporter = DiscrepancyReporter::new();
        let d = reporter.report(&subtotal("Fund A", 1000.0, 500.0));

        assert_eq!(d.delta, 500.0);
        assert_eq!(d.status, DiscrepancyStatus::Underallocated);
        assert_eq!(d.unattributed_ratio(), Some(0.5));
    }

    #[test]
    fn test_report_balanced_within_tolerance() {
        let reporter = DiscrepancyReporter::new();
        let d = reporter.report(&subtotal("F", 1000.0, 999.995));

        assert_eq!(d.status, DiscrepancyStatus::Balanced);
        // Delta is still reported as-is
        assert!(d.delta > 0.0);
    }

    #[test]
    fn test_report_overallocated() {
        let reporter = DiscrepancyReporter::new();
        let d = reporter.report(&subtotal("F", 100.0, 130.0));

        assert_eq!(d.delta, -30.0);
        assert_eq!(d.status, DiscrepancyStatus::Overallocated);
    }

    #[test]
    fn test_zero_declared_has_no_ratio() {
        let reporter = DiscrepancyReporter::new();
        let d = reporter.report(&subtotal("F", 0.0, 0.0));
        assert_eq!(d.unattributed_ratio(), None);
        assert_eq!(d.status, DiscrepancyStatus::Balanced);
    }

    #[test]
    fn test_report_all_totals() {
        let reporter = DiscrepancyReporter::with_tolerance(1.0);
        let report = reporter.report_all(
            &[subtotal("A", 1000.0, 500.0), subtotal("B", 2000.0, 1999.5)],
            vec![SkippedFund {
                fund_name: "C".to_string(),
                reason: "no declared total value".to_string(),
            }],
        );

        assert_eq!(report.funds.len(), 2);
        assert_eq!(report.total_declared, 3000.0);
        assert_eq!(report.total_summed, 2499.5);
        assert_eq!(report.total_delta, 500.5);
        assert_eq!(report.unbalanced().count(), 1);
        assert_eq!(report.fund("B").unwrap().status, DiscrepancyStatus::Balanced);
        assert_eq!(report.skipped_funds[0].fund_name, "C");
        assert!(report.summary().contains("1 skipped"));
    }
}
