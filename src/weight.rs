// ⚖️ Weight Resolver - Raw holding weight → fraction of fund value
//
// Sources disagree on encoding:
//   "0.032"  → 3.2% written as a fraction
//   "3.2"    → 3.2% written as a percentage
//   ""/null  → no weight
//
// Known approximation: any value strictly greater than 1 is read as a
// percentage. A true 100% holding written "1" and a 1% holding written "1"
// are indistinguishable; both resolve to 1.0. The data carries no per-source
// marker that would settle it, so this stays a documented limitation.

use serde::{Deserialize, Serialize};

// ============================================================================
// RAW WEIGHT
// ============================================================================

/// Weight exactly as the holdings file carried it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawWeight {
    #[default]
    Absent,
    Number(f64),
    Text(String),
}

impl From<&str> for RawWeight {
    fn from(s: &str) -> Self {
        RawWeight::Text(s.to_string())
    }
}

impl From<Option<&str>> for RawWeight {
    fn from(s: Option<&str>) -> Self {
        match s {
            Some(s) => RawWeight::from(s),
            None => RawWeight::Absent,
        }
    }
}

impl From<f64> for RawWeight {
    fn from(n: f64) -> Self {
        RawWeight::Number(n)
    }
}

// ============================================================================
// RESOLVED WEIGHT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightKind {
    /// Absent or blank → 0
    Blank,

    /// Already a fraction (<= 1)
    Fraction,

    /// Read as a percentage and divided by 100
    Percentage,

    /// Not a usable number → 0
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWeight {
    pub fraction: f64,
    pub kind: WeightKind,
}

impl ResolvedWeight {
    fn zero(kind: WeightKind) -> Self {
        ResolvedWeight {
            fraction: 0.0,
            kind,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.kind == WeightKind::Malformed
    }
}

/// Resolve a raw weight into a fraction of the fund's total value
///
/// - Absent / blank → 0
/// - Trailing `%` → explicit percentage
/// - Value > 1 → percentage (divided by 100)
/// - Negative, NaN, infinite or unparseable → 0, flagged malformed
pub fn resolve_weight(raw: &RawWeight) -> ResolvedWeight {
    match raw {
        RawWeight::Absent => ResolvedWeight::zero(WeightKind::Blank),
        RawWeight::Number(n) => from_number(*n),
        RawWeight::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return ResolvedWeight::zero(WeightKind::Blank);
            }

            if let Some(percent) = trimmed.strip_suffix('%') {
                return match parse_usable(percent.trim()) {
                    Some(value) => ResolvedWeight {
                        fraction: value / 100.0,
                        kind: WeightKind::Percentage,
                    },
                    None => ResolvedWeight::zero(WeightKind::Malformed),
                };
            }

            match trimmed.parse::<f64>() {
                Ok(value) => from_number(value),
                Err(_) => ResolvedWeight::zero(WeightKind::Malformed),
            }
        }
    }
}

/// Plain fraction for an optional string weight
///
/// ```
/// use exposure_ledger::weight::resolve;
///
/// assert_eq!(resolve(Some("0.25")), 0.25);
/// assert_eq!(resolve(Some("25")), 0.25);
/// assert_eq!(resolve(Some("")), 0.0);
/// assert_eq!(resolve(None), 0.0);
/// ```
pub fn resolve(raw: Option<&str>) -> f64 {
    resolve_weight(&RawWeight::from(raw)).fraction
}

fn from_number(value: f64) -> ResolvedWeight {
    if !value.is_finite() || value < 0.0 {
        return ResolvedWeight::zero(WeightKind::Malformed);
    }

    if value > 1.0 {
        ResolvedWeight {
            fraction: value / 100.0,
            kind: WeightKind::Percentage,
        }
    } else {
        ResolvedWeight {
            fraction: value,
            kind: WeightKind::Fraction,
        }
    }
}

fn parse_usable(s: &str) -> Option<f64> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_fraction() {
        assert_eq!(resolve(Some("0.25")), 0.25);
        assert_eq!(resolve_weight(&RawWeight::from("0.25")).kind, WeightKind::Fraction);
    }

    #[test]
    fn test_resolve_percentage_correction() {
        assert_eq!(resolve(Some("25")), 0.25);
        assert_eq!(resolve_weight(&RawWeight::from("25")).kind, WeightKind::Percentage);
        assert_eq!(resolve_weight(&RawWeight::Number(50.0)).fraction, 0.5);
    }

    #[test]
    fn test_resolve_blank_and_absent() {
        assert_eq!(resolve(Some("")), 0.0);
        assert_eq!(resolve(Some("   ")), 0.0);
        assert_eq!(resolve(None), 0.0);
        assert_eq!(resolve_weight(&RawWeight::Absent).kind, WeightKind::Blank);
    }

    #[test]
    fn test_resolve_boundary_is_fraction() {
        // Exactly 1 stays a fraction (100%): the documented ambiguity
        assert_eq!(resolve(Some("1")), 1.0);
        assert_eq!(resolve_weight(&RawWeight::from("1")).kind, WeightKind::Fraction);
    }

    #[test]
    fn test_resolve_explicit_percent_sign() {
        assert_eq!(resolve(Some("50%")), 0.5);
        assert_eq!(resolve(Some(" 1 %")), 0.01);
        assert!(resolve_weight(&RawWeight::from("abc%")).is_malformed());
    }

    #[test]
    fn test_resolve_malformed() {
        for raw in ["abc", "1,5", "nan", "inf", "-0.5"] {
            let resolved = resolve_weight(&RawWeight::from(raw));
            assert!(resolved.is_malformed(), "{:?} should be malformed", raw);
            assert_eq!(resolved.fraction, 0.0);
        }
        assert!(resolve_weight(&RawWeight::Number(f64::NAN)).is_malformed());
        assert!(resolve_weight(&RawWeight::Number(-2.0)).is_malformed());
    }

    #[test]
    fn test_raw_weight_deserialize_shapes() {
        let text: RawWeight = serde_json::from_str("\"0.5\"").unwrap();
        let number: RawWeight = serde_json::from_str("3.2").unwrap();
        let null: RawWeight = serde_json::from_str("null").unwrap();

        assert_eq!(text, RawWeight::Text("0.5".to_string()));
        assert_eq!(number, RawWeight::Number(3.2));
        assert_eq!(null, RawWeight::Absent);
    }
}
