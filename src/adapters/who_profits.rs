// 🔎 Who Profits adapter
//
// Format: { "metadata": {...}, "results": { "<search term>": {
//           "found": bool, "matches": [ { "company_name", "traded_in",
//           "headquarters", "involvement": "a|b", "search_term" } ] } } }
//
// Company names come scraped with a Hebrew rendering appended; everything
// from the first 'א' on is dropped.
//
// Results are walked in file order (serde_json `preserve_order`), so the
// first search term in the file supplies the first-seen spelling.

use super::{non_empty, split_pipe, AdapterOutput, SourceAdapter, SourceKind};
use crate::entities::{EntityRecord, EntityType, SourcePayload, WhoProfitsPayload};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const SOURCE_ID: &str = "who_profits";
pub const CATEGORY: &str = "occupation_involvement";

#[derive(Debug, Deserialize)]
struct WhoProfitsFile {
    #[serde(default)]
    results: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    matches: Vec<MatchRow>,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    traded_in: Option<String>,
    #[serde(default)]
    headquarters: Option<String>,
    #[serde(default)]
    involvement: Option<String>,
    #[serde(default)]
    search_term: Option<String>,
}

/// Latin part of a scraped company name
pub fn strip_hebrew_suffix(name: &str) -> &str {
    name.split('א').next().unwrap_or("").trim()
}

pub struct WhoProfitsAdapter;

impl WhoProfitsAdapter {
    pub fn new() -> Self {
        WhoProfitsAdapter
    }
}

impl Default for WhoProfitsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for WhoProfitsAdapter {
    fn load(&self, file_path: &Path) -> Result<AdapterOutput> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let parsed: WhoProfitsFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse JSON from {}", file_path.display()))?;

        let mut output = AdapterOutput {
            source: SOURCE_ID.to_string(),
            ..Default::default()
        };

        for (term, value) in parsed.results {
            let result: SearchResult = serde_json::from_value(value).with_context(|| {
                format!("Invalid result '{}' in {}", term, file_path.display())
            })?;

            // Results without a hit carry no company
            if !result.found {
                continue;
            }

            for row in result.matches {
                output.records_read += 1;

                let raw_name = row.company_name.as_deref().unwrap_or("");
                let Some(name) = non_empty(Some(strip_hebrew_suffix(raw_name))) else {
                    output.records_skipped += 1;
                    continue;
                };

                let mut involvement = split_pipe(row.involvement.as_deref().unwrap_or(""));
                involvement.sort();
                involvement.dedup();

                let payload = SourcePayload::WhoProfits(WhoProfitsPayload {
                    traded_in: non_empty(row.traded_in.as_deref()),
                    headquarters: non_empty(row.headquarters.as_deref()),
                    involvement: involvement.clone(),
                    search_term: row.search_term,
                });

                output.records.push(
                    EntityRecord::new(name, SOURCE_ID, payload)
                        .with_type(EntityType::Company)
                        .with_category(CATEGORY)
                        .with_involvement(involvement),
                );
            }
        }

        Ok(output)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::WhoProfits
    }
}
