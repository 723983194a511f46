// 🏢 Entity - One merged identity per real-world company or brand
//
// Identity: normalized key (and a UUID v5 derived from it)
// Values: canonical name, sources, per-source payloads, categories, involvement
//
// Problem solved:
// - "Acme Inc" (boycott list), "ACME INCORPORATED" (investigation dataset)
//   → one Entity carrying both sources' data side by side

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

// ============================================================================
// ENTITY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Consumer brand (boycott lists)
    Brand,

    /// Company / issuer
    Company,

    /// Source did not say
    Unknown,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Brand => "brand",
            EntityType::Company => "company",
            EntityType::Unknown => "unknown",
        }
    }

    /// Lenient parse used by the generic CSV adapter
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "brand" => EntityType::Brand,
            "company" => EntityType::Company,
            _ => EntityType::Unknown,
        }
    }
}

// ============================================================================
// PER-SOURCE PAYLOADS
// ============================================================================

/// Raw attributes one source contributed, one variant per adapter
///
/// Serialized with an `adapter` tag so downstream readers know which
/// fields to expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "adapter", rename_all = "snake_case")]
pub enum SourcePayload {
    BoycottBrand(BoycottPayload),
    WhoProfits(WhoProfitsPayload),
    InvestigateAfsc(AfscPayload),
    Generic(GenericPayload),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoycottPayload {
    pub image_url: Option<String>,
    pub target_link: Option<String>,
    pub page_number: Option<u32>,
    pub scraped_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoProfitsPayload {
    pub traded_in: Option<String>,
    pub headquarters: Option<String>,
    pub involvement: Vec<String>,
    pub search_term: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AfscPayload {
    pub short_name: Option<String>,
    pub country_hq: Option<String>,
    pub primary_symbol: Option<String>,
    pub exchange: Option<String>,
    pub industry: Option<String>,
    pub isin: Option<String>,
    pub summary: Option<String>,
    pub involvement: AfscInvolvement,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfscInvolvement {
    pub prisons: bool,
    pub occupations: bool,
    pub borders: bool,
    pub divestment_shortlist: bool,
}

/// Columns a generic CSV carried beyond name/type/categories/involvement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericPayload {
    pub fields: BTreeMap<String, String>,
}

// ============================================================================
// INPUT RECORD
// ============================================================================

/// EntityRecord - What an adapter hands to the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub name: String,
    pub source: String,
    pub entity_type: EntityType,
    pub payload: SourcePayload,
    pub categories: Vec<String>,
    pub involvement_types: Vec<String>,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>, source: impl Into<String>, payload: SourcePayload) -> Self {
        EntityRecord {
            name: name.into(),
            source: source.into(),
            entity_type: EntityType::Unknown,
            payload,
            categories: Vec::new(),
            involvement_types: Vec::new(),
        }
    }

    /// Builder pattern: set entity type
    pub fn with_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = entity_type;
        self
    }

    /// Builder pattern: add a category tag
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Builder pattern: add involvement labels
    pub fn with_involvement<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.involvement_types.extend(labels.into_iter().map(Into::into));
        self
    }
}

// ============================================================================
// ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// UUID v5 of the normalized key - same key, same id, every run
    pub id: String,

    /// First-seen display name
    #[serde(rename = "name")]
    pub canonical_name: String,

    #[serde(rename = "normalized_name")]
    pub normalized_key: String,

    /// First-seen type wins
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Contributing sources, no duplicates
    pub sources: Vec<String>,

    /// Last payload per source; keys are always a subset of `sources`
    pub source_data: BTreeMap<String, SourcePayload>,

    /// Union of category tags, first-seen order
    pub categories: Vec<String>,

    pub involvement_types: BTreeSet<String>,
}

impl Entity {
    /// Create an entity from its first sighting
    pub fn from_record(normalized_key: String, record: EntityRecord) -> Self {
        let mut entity = Entity {
            id: entity_id_for_key(&normalized_key),
            canonical_name: record.name.clone(),
            normalized_key,
            entity_type: record.entity_type,
            sources: Vec::new(),
            source_data: BTreeMap::new(),
            categories: Vec::new(),
            involvement_types: BTreeSet::new(),
        };
        entity.absorb(record);
        entity
    }

    /// Merge another sighting into this entity
    ///
    /// - source added once
    /// - that source's payload overwritten (other sources untouched)
    /// - categories and involvement types unioned
    pub fn absorb(&mut self, record: EntityRecord) {
        if !self.sources.contains(&record.source) {
            self.sources.push(record.source.clone());
        }

        self.source_data.insert(record.source, record.payload);

        for category in record.categories {
            if !self.categories.contains(&category) {
                self.categories.push(category);
            }
        }

        self.involvement_types.extend(record.involvement_types);
    }

    pub fn is_multi_source(&self) -> bool {
        self.sources.len() > 1
    }

    pub fn has_source(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }
}

/// Reproducible entity id from a normalized key
pub fn entity_id_for_key(normalized_key: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, normalized_key.as_bytes()).to_string()
}

// ============================================================================
// TESTS
// ============================================================================
