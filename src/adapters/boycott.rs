// 🛍️ Boycott brands adapter
//
// Format: { "total_brands": N, "brands": [ { "name", "image_url",
//           "target_link", "page_number", "scraped_at" } ] }

use super::{non_empty, AdapterOutput, SourceAdapter, SourceKind};
use crate::entities::{BoycottPayload, EntityRecord, EntityType, SourcePayload};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const SOURCE_ID: &str = "boycott.thewitness";
pub const CATEGORY: &str = "consumer_boycott";

#[derive(Debug, Deserialize)]
struct BoycottFile {
    #[serde(default)]
    brands: Vec<BrandRow>,
}

#[derive(Debug, Deserialize)]
struct BrandRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    target_link: Option<String>,
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default)]
    scraped_at: Option<String>,
}

pub struct BoycottAdapter;

impl BoycottAdapter {
    pub fn new() -> Self {
        BoycottAdapter
    }
}

impl Default for BoycottAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for BoycottAdapter {
    fn load(&self, file_path: &Path) -> Result<AdapterOutput> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let parsed: BoycottFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse JSON from {}", file_path.display()))?;

        let mut output = AdapterOutput {
            source: SOURCE_ID.to_string(),
            ..Default::default()
        };

        for brand in parsed.brands {
            output.records_read += 1;

            let Some(name) = non_empty(brand.name.as_deref()) else {
                output.records_skipped += 1;
                continue;
            };

            let payload = SourcePayload::BoycottBrand(BoycottPayload {
                image_url: brand.image_url,
                target_link: brand.target_link,
                page_number: brand.page_number,
                scraped_at: brand.scraped_at,
            });

            output.records.push(
                EntityRecord::new(name, SOURCE_ID, payload)
                    .with_type(EntityType::Brand)
                    .with_category(CATEGORY),
            );
        }

        Ok(output)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::BoycottBrands
    }
}
