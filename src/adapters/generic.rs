// 📄 Generic CSV adapter
//
// Any CSV with a `name` column. Optional `type`, `categories` and
// `involvement_types` (pipe-separated); every other non-empty column is
// kept in the payload. Source id = file stem.

use super::{file_name, non_empty, split_pipe, AdapterOutput, SourceAdapter, SourceKind};
use crate::entities::{EntityRecord, EntityType, GenericPayload, SourcePayload};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

const RESERVED: [&str; 4] = ["name", "type", "categories", "involvement_types"];

pub struct GenericCsvAdapter;

impl GenericCsvAdapter {
    pub fn new() -> Self {
        GenericCsvAdapter
    }

    pub fn source_id(file_path: &Path) -> String {
        file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("generic")
            .to_string()
    }
}

impl Default for GenericCsvAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for GenericCsvAdapter {
    fn load(&self, file_path: &Path) -> Result<AdapterOutput> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let filename = file_name(file_path).to_string();
        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read CSV headers in {}", filename))?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        if !headers.iter().any(|h| h == "name") {
            return Err(anyhow!("CSV {} has no 'name' column", filename));
        }

        let source = Self::source_id(file_path);
        let mut output = AdapterOutput {
            source: source.clone(),
            ..Default::default()
        };

        for (line_num, result) in reader.records().enumerate() {
            let record = result.with_context(|| {
                format!("Failed to parse CSV line {} in {}", line_num + 2, filename)
            })?;
            output.records_read += 1;

            let row: BTreeMap<&str, &str> = headers
                .iter()
                .map(String::as_str)
                .zip(record.iter())
                .collect();

            let Some(name) = non_empty(row.get("name").copied()) else {
                output.records_skipped += 1;
                continue;
            };

            let fields = row
                .iter()
                .filter(|(k, v)| !RESERVED.contains(*k) && !v.trim().is_empty())
                .map(|(k, v)| (k.to_string(), v.trim().to_string()))
                .collect();

            let entity_type = row
                .get("type")
                .map(|t| EntityType::parse(t))
                .unwrap_or(EntityType::Unknown);

            let mut entity = EntityRecord::new(
                name,
                source.clone(),
                SourcePayload::Generic(GenericPayload { fields }),
            )
            .with_type(entity_type)
            .with_involvement(split_pipe(row.get("involvement_types").copied().unwrap_or("")));

            for category in split_pipe(row.get("categories").copied().unwrap_or("")) {
                entity = entity.with_category(category);
            }

            output.records.push(entity);
        }

        Ok(output)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::GenericCsv
    }
}
