// ⚙️ Engine Configuration - TOML file, every field defaulted
//
// An absent file is the same as an empty one: all defaults.
// CLI flags override individual fields after loading.

use crate::entities::MatchPolicy;
use crate::error::{LedgerError, Result};
use crate::similarity::DEFAULT_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub aggregation: AggregationConfig,
    pub order: OrderConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

impl EngineConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load if the file exists, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => Err(LedgerError::Config(format!(
                "config file not found: {}",
                p.display()
            ))),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_threshold("matching.entity_threshold", self.matching.entity_threshold)?;
        check_threshold("matching.security_threshold", self.matching.security_threshold)?;
        check_threshold(
            "aggregation.exclusion_threshold",
            self.aggregation.exclusion_threshold,
        )?;

        if self.server.search_limit == 0 || self.server.search_limit > self.server.max_search_limit {
            return Err(LedgerError::Config(format!(
                "server.search_limit must be between 1 and max_search_limit ({}), got {}",
                self.server.max_search_limit, self.server.search_limit
            )));
        }

        Ok(())
    }
}

fn check_threshold(field: &str, value: u8) -> Result<()> {
    if value > 100 {
        return Err(LedgerError::Config(format!(
            "{} must be in 0..=100, got {}",
            field, value
        )));
    }
    Ok(())
}

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Entity ledger policy; securities always match fuzzily
    pub policy: MatchPolicy,
    pub entity_threshold: u8,
    pub security_threshold: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig {
            policy: MatchPolicy::Fuzzy,
            entity_threshold: DEFAULT_THRESHOLD,
            security_threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Which asset list of a holdings file to aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSelection {
    Restricted,
    Unrestricted,
    /// Restricted list if strictly longer, else unrestricted
    #[default]
    Larger,
}

/// What to do with a fund missing from the totals lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTotalPolicy {
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub asset_selection: AssetSelection,
    pub group_share_classes: bool,
    pub on_missing_total: MissingTotalPolicy,
    /// Restricted company names removed before accumulation
    pub exclusions: Vec<String>,
    pub exclusion_threshold: u8,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            asset_selection: AssetSelection::Larger,
            group_share_classes: true,
            on_missing_total: MissingTotalPolicy::Skip,
            exclusions: Vec::new(),
            exclusion_threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingOrder {
    /// Sort input files by file name
    #[default]
    Lexicographic,
    /// Keep the order files were given in
    AsGiven,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    pub processing_order: ProcessingOrder,
}

impl OrderConfig {
    /// Apply the configured order to a list of input files
    pub fn arrange(&self, mut files: Vec<PathBuf>) -> Vec<PathBuf> {
        if self.processing_order == ProcessingOrder::Lexicographic {
            files.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
        }
        files
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub pretty: bool,
    pub compact: bool,
    pub csv_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: PathBuf::from("output"),
            pretty: true,
            compact: true,
            csv_summary: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub search_limit: usize,
    pub max_search_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            search_limit: 20,
            max_search_limit: 100,
        }
    }
}

impl ServerConfig {
    /// Requested limit, defaulted and capped
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.search_limit)
            .clamp(1, self.max_search_limit)
    }
}

// ============================================================================
// TESTS
// ============================================================================
