// 💾 Output - Write run results for downstream readers
//
// Unification: pretty JSON, compact JSON, CSV summary
// Aggregation: pretty JSON, compact JSON
//
// The HTTP facade reads these files back; it never runs the pipeline.

use crate::config::OutputConfig;
use crate::entities::{Entity, SourcePayload};
use crate::pipeline::{AggregationOutput, UnifiedDataset};
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const UNIFIED_FILE: &str = "unified_entities.json";
pub const UNIFIED_COMPACT_FILE: &str = "unified_entities_compact.json";
pub const UNIFIED_SUMMARY_FILE: &str = "unified_entities_summary.csv";
pub const AGGREGATION_FILE: &str = "aggregation.json";
pub const AGGREGATION_COMPACT_FILE: &str = "aggregation_compact.json";

const SUMMARY_HEADER: [&str; 12] = [
    "Name",
    "Type",
    "Sources",
    "Categories",
    "Country_HQ",
    "Industry",
    "Stock_Symbol",
    "Prisons",
    "Occupations",
    "Borders",
    "Divestment_Shortlist",
    "Involvement_Types",
];

// ============================================================================
// DIGESTS
// ============================================================================

/// SHA-256 of a file's bytes, lowercase hex
pub fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// JSON
// ============================================================================

pub fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)
    } else {
        serde_json::to_writer(&mut writer, value)
    }
    .with_context(|| format!("Failed to write JSON to {}", path.display()))?;

    writer.flush()?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from {}", path.display()))
}

/// Read back whichever JSON variant a run wrote, pretty first
fn read_first<T: DeserializeOwned>(dir: &Path, names: [&str; 2]) -> Result<T> {
    match names.iter().map(|n| dir.join(n)).find(|p| p.is_file()) {
        Some(path) => read_json(&path),
        None => bail!("No {} or {} in {}", names[0], names[1], dir.display()),
    }
}

pub fn read_unified(config: &OutputConfig) -> Result<UnifiedDataset> {
    read_first(&config.dir, [UNIFIED_FILE, UNIFIED_COMPACT_FILE])
}

pub fn read_aggregation(config: &OutputConfig) -> Result<AggregationOutput> {
    read_first(&config.dir, [AGGREGATION_FILE, AGGREGATION_COMPACT_FILE])
}

// ============================================================================
// CSV SUMMARY
// ============================================================================

/// One summary row; investigation-dataset columns stay empty for other sources
fn summary_row(entity: &Entity) -> [String; 12] {
    let mut row: [String; 12] = Default::default();
    row[0] = entity.canonical_name.clone();
    row[1] = entity.entity_type.as_str().to_string();
    row[2] = entity.sources.join("|");
    row[3] = entity.categories.join("|");

    let afsc = entity.source_data.values().find_map(|payload| match payload {
        SourcePayload::InvestigateAfsc(p) => Some(p),
        _ => None,
    });

    if let Some(p) = afsc {
        let yes = |flag: bool| if flag { "Yes".to_string() } else { String::new() };
        row[4] = p.country_hq.clone().unwrap_or_default();
        row[5] = p.industry.clone().unwrap_or_default();
        row[6] = p.primary_symbol.clone().unwrap_or_default();
        row[7] = yes(p.involvement.prisons);
        row[8] = yes(p.involvement.occupations);
        row[9] = yes(p.involvement.borders);
        row[10] = yes(p.involvement.divestment_shortlist);
    }

    row[11] = entity
        .involvement_types
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("|");
    row
}

pub fn write_csv_summary<W: Write>(writer: W, entities: &[Entity]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(SUMMARY_HEADER)?;
    for entity in entities {
        csv_writer.write_record(summary_row(entity))?;
    }
    csv_writer.flush()?;
    Ok(())
}

// ============================================================================
// RUN OUTPUTS
// ============================================================================

/// Write the unified dataset; returns the files written
pub fn write_unified(config: &OutputConfig, dataset: &UnifiedDataset) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("Failed to create output dir: {}", config.dir.display()))?;

    let mut written = Vec::new();

    if config.pretty {
        let path = config.dir.join(UNIFIED_FILE);
        write_json(&path, dataset, true)?;
        written.push(path);
    }

    if config.compact {
        let path = config.dir.join(UNIFIED_COMPACT_FILE);
        write_json(&path, dataset, false)?;
        written.push(path);
    }

    if config.csv_summary {
        let path = config.dir.join(UNIFIED_SUMMARY_FILE);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        write_csv_summary(BufWriter::new(file), &dataset.entities)
            .with_context(|| format!("Failed to write CSV summary {}", path.display()))?;
        written.push(path);
    }

    info!(files = written.len(), dir = %config.dir.display(), "wrote unified entities");
    Ok(written)
}

pub fn write_aggregation(config: &OutputConfig, output: &AggregationOutput) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("Failed to create output dir: {}", config.dir.display()))?;

    let mut written = Vec::new();

    if config.pretty {
        let path = config.dir.join(AGGREGATION_FILE);
        write_json(&path, output, true)?;
        written.push(path);
    }

    if config.compact {
        let path = config.dir.join(AGGREGATION_COMPACT_FILE);
        write_json(&path, output, false)?;
        written.push(path);
    }

    info!(files = written.len(), dir = %config.dir.display(), "wrote aggregation output");
    Ok(written)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::entities::{AfscInvolvement, AfscPayload, EntityRecord, EntityType};
    use crate::pipeline::UnificationRun;
    use crate::adapters::{AdapterOutput, SourceKind};

    fn dataset() -> UnifiedDataset {
        let afsc = SourcePayload::InvestigateAfsc(AfscPayload {
            short_name: None,
            country_hq: Some("United States".to_string()),
            primary_symbol: Some("CAT".to_string()),
            exchange: None,
            industry: Some("Machinery".to_string()),
            isin: None,
            summary: None,
            involvement: AfscInvolvement {
                prisons: false,
                occupations: true,
                borders: false,
                divestment_shortlist: true,
            },
            link: None,
        });

        let mut run = UnificationRun::new(&EngineConfig::default());
        run.merge_output(
            AdapterOutput {
                source: "investigate_afsc".to_string(),
                records: vec![EntityRecord::new("Caterpillar Inc", "investigate_afsc", afsc)
                    .with_type(EntityType::Company)
                    .with_category("occupations")
                    .with_involvement(["bulldozers", "construction"])],
                records_read: 1,
                records_skipped: 0,
            },
            SourceKind::InvestigateAfsc,
            "1.0.0",
        );
        run.finish()
    }

    #[test]
    fn test_file_digest_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();

        assert_eq!(
            file_digest(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_csv_summary_columns() {
        let mut buf = Vec::new();
        write_csv_summary(&mut buf, &dataset().entities).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], SUMMARY_HEADER.join(","));
        assert_eq!(
            lines[1],
            "Caterpillar Inc,company,investigate_afsc,occupations,United States,Machinery,CAT,,Yes,,Yes,bulldozers|construction"
        );
    }

    #[test]
    fn test_write_unified_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            dir: dir.path().join("out"),
            ..Default::default()
        };

        let original = dataset();
        let written = write_unified(&config, &original).unwrap();
        assert_eq!(written.len(), 3);

        let pretty: UnifiedDataset = read_json(&config.dir.join(UNIFIED_FILE)).unwrap();
        let compact: UnifiedDataset = read_json(&config.dir.join(UNIFIED_COMPACT_FILE)).unwrap();
        assert_eq!(pretty, original);
        assert_eq!(compact, original);

        let raw = std::fs::read_to_string(config.dir.join(UNIFIED_FILE)).unwrap();
        assert!(raw.contains("\"normalized_name\": \"caterpillar\""));
        assert!(raw.contains("\"adapter\": \"investigate_afsc\""));
    }

    #[test]
    fn test_output_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            dir: dir.path().to_path_buf(),
            pretty: false,
            compact: true,
            csv_summary: false,
        };

        let written = write_unified(&config, &dataset()).unwrap();
        assert_eq!(written, vec![dir.path().join(UNIFIED_COMPACT_FILE)]);
    }

    #[test]
    fn test_read_back_falls_back_to_compact() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            dir: dir.path().to_path_buf(),
            pretty: false,
            compact: true,
            csv_summary: false,
        };

        assert!(read_unified(&config).is_err());
        assert!(read_aggregation(&config).is_err());

        let original = dataset();
        write_unified(&config, &original).unwrap();
        assert_eq!(read_unified(&config).unwrap(), original);

        let run = crate::pipeline::AggregationRun::new(&EngineConfig::default());
        let output = run.finish(&crate::discrepancy::DiscrepancyReporter::new());
        write_aggregation(&config, &output).unwrap();
        assert_eq!(read_aggregation(&config).unwrap(), output);
    }
}
