// 🗂️ AFSC Investigate dataset adapter (CSV)
//
// Columns used: Company Standard Name (fallback Company Short Name),
// Country of HQ, Primary Symbol, Primary Exchange Name, Industry,
// Primary ISIN, Summary, Link, and the flags Prisons / Occupations /
// Borders ("1" = set) and Divestment Shortlist (any value = set).

use super::{file_name, non_empty, AdapterOutput, SourceAdapter, SourceKind};
use crate::entities::{AfscInvolvement, AfscPayload, EntityRecord, EntityType, SourcePayload};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

pub const SOURCE_ID: &str = "investigate_afsc";

/// Category when a company carries none of the involvement flags
pub const UNFLAGGED_CATEGORY: &str = "tracked_company";

/// Header name → column index
struct Columns(HashMap<String, usize>);

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Columns(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_string(), i))
                .collect(),
        )
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.0.get(column).and_then(|&i| record.get(i))
    }
}

fn flag_is_one(value: Option<&str>) -> bool {
    value.map(str::trim) == Some("1")
}

pub struct AfscAdapter;

impl AfscAdapter {
    pub fn new() -> Self {
        AfscAdapter
    }
}

impl Default for AfscAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for AfscAdapter {
    fn load(&self, file_path: &Path) -> Result<AdapterOutput> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let filename = file_name(file_path).to_string();
        let columns = Columns::new(
            reader
                .headers()
                .with_context(|| format!("Failed to read CSV headers in {}", filename))?,
        );

        let mut output = AdapterOutput {
            source: SOURCE_ID.to_string(),
            ..Default::default()
        };

        for (line_num, result) in reader.records().enumerate() {
            let record = result.with_context(|| {
                format!("Failed to parse CSV line {} in {}", line_num + 2, filename)
            })?;
            output.records_read += 1;

            let name = non_empty(columns.get(&record, "Company Standard Name"))
                .or_else(|| non_empty(columns.get(&record, "Company Short Name")));
            let Some(name) = name else {
                output.records_skipped += 1;
                continue;
            };

            let involvement = AfscInvolvement {
                prisons: flag_is_one(columns.get(&record, "Prisons")),
                occupations: flag_is_one(columns.get(&record, "Occupations")),
                borders: flag_is_one(columns.get(&record, "Borders")),
                divestment_shortlist: non_empty(columns.get(&record, "Divestment Shortlist")).is_some(),
            };

            let flags = [
                (involvement.prisons, "prisons"),
                (involvement.occupations, "occupations"),
                (involvement.borders, "borders"),
                (involvement.divestment_shortlist, "divestment_shortlist"),
            ];

            let payload = SourcePayload::InvestigateAfsc(AfscPayload {
                short_name: non_empty(columns.get(&record, "Company Short Name")),
                country_hq: non_empty(columns.get(&record, "Country of HQ")),
                primary_symbol: non_empty(columns.get(&record, "Primary Symbol")),
                exchange: non_empty(columns.get(&record, "Primary Exchange Name")),
                industry: non_empty(columns.get(&record, "Industry")),
                isin: non_empty(columns.get(&record, "Primary ISIN")),
                summary: non_empty(columns.get(&record, "Summary")),
                involvement,
                link: non_empty(columns.get(&record, "Link")),
            });

            let mut entity = EntityRecord::new(name, SOURCE_ID, payload).with_type(EntityType::Company);
            for (set, category) in flags {
                if set {
                    entity = entity.with_category(category);
                }
            }
            if entity.categories.is_empty() {
                entity = entity.with_category(UNFLAGGED_CATEGORY);
            }

            output.records.push(entity);
        }

        Ok(output)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::InvestigateAfsc
    }
}
