// 📊 Holdings adapter - Per-fund holdings JSON + fund totals CSV
//
// Holdings file (one per fund, fund name = file name up to the first '.'):
//   { "restricted assets":     [ { "security name": "...", "holding wt": "0.03" } ],
//     "non restricted assets": [ ... ] }
//
// Fund totals CSV: column 0 = fund name, column 2 = declared total value.
// Rows whose value does not parse (headers, notes) are ignored.

use crate::aggregation::{Fund, Holding};
use crate::config::AssetSelection;
use crate::error::LedgerError;
use crate::weight::RawWeight;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::warn;

// ============================================================================
// HOLDINGS FILE
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct HoldingsFile {
    #[serde(rename = "restricted assets", default)]
    restricted: Vec<HoldingRow>,
    #[serde(rename = "non restricted assets", default)]
    unrestricted: Vec<HoldingRow>,
}

#[derive(Debug, Deserialize)]
struct HoldingRow {
    #[serde(rename = "security name", default)]
    security_name: Option<String>,
    #[serde(rename = "holding wt", default)]
    holding_wt: RawWeight,
}

impl From<HoldingRow> for Holding {
    fn from(row: HoldingRow) -> Self {
        Holding {
            security_name: row.security_name.unwrap_or_default(),
            raw_weight: row.holding_wt,
        }
    }
}

/// Both asset lists of one fund, before a total value is attached
#[derive(Debug, Clone, PartialEq)]
pub struct FundHoldings {
    pub fund_name: String,
    pub restricted: Vec<Holding>,
    pub unrestricted: Vec<Holding>,
}

impl FundHoldings {
    /// Asset list to aggregate
    pub fn select(&self, selection: AssetSelection) -> &[Holding] {
        match selection {
            AssetSelection::Restricted => &self.restricted,
            AssetSelection::Unrestricted => &self.unrestricted,
            AssetSelection::Larger => {
                if self.restricted.len() > self.unrestricted.len() {
                    &self.restricted
                } else {
                    &self.unrestricted
                }
            }
        }
    }

    pub fn into_fund(self, declared_total_value: f64, selection: AssetSelection) -> Fund {
        let holdings = self.select(selection).to_vec();
        Fund {
            name: self.fund_name,
            declared_total_value,
            holdings,
        }
    }
}

/// Fund name for a holdings file: "ADAGE CAPITAL.json" → "ADAGE CAPITAL"
pub fn fund_name_for(file_path: &Path) -> String {
    file_path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or("")
        .to_string()
}

pub fn load_holdings(file_path: &Path) -> Result<FundHoldings> {
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    let parsed: HoldingsFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from {}", file_path.display()))?;

    Ok(FundHoldings {
        fund_name: fund_name_for(file_path),
        restricted: parsed.restricted.into_iter().map(Holding::from).collect(),
        unrestricted: parsed.unrestricted.into_iter().map(Holding::from).collect(),
    })
}

// ============================================================================
// FUND TOTALS
// ============================================================================

/// Declared total value per fund name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundTotals {
    totals: HashMap<String, f64>,
}

impl FundTotals {
    pub fn load(file_path: &Path) -> Result<Self> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("Failed to read fund totals from {}", file_path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut totals = HashMap::new();

        for (line_num, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("Failed to parse CSV line {}", line_num + 1))?;

            let name = record.get(0).map(str::trim).unwrap_or("");
            if name.is_empty() {
                continue;
            }

            match record.get(2).and_then(parse_money) {
                // First row for a fund wins
                Some(value) => {
                    totals.entry(name.to_string()).or_insert(value);
                }
                None => {
                    if line_num > 0 {
                        warn!(line = line_num + 1, fund = %name, "fund total is not a number, ignoring row");
                    }
                }
            }
        }

        Ok(FundTotals { totals })
    }

    pub fn get(&self, fund_name: &str) -> Option<f64> {
        self.totals.get(fund_name).copied()
    }

    /// Declared value or the fund-scoped missing-value error
    pub fn require(&self, fund_name: &str) -> crate::error::Result<f64> {
        self.get(fund_name)
            .ok_or_else(|| LedgerError::MissingDeclaredValue {
                fund: fund_name.to_string(),
            })
    }

    pub fn insert(&mut self, fund_name: impl Into<String>, value: f64) {
        self.totals.insert(fund_name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

/// "$1,234.50" → 1234.5
fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// TESTS
// ============================================================================
