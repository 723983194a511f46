// 📒 Entity Ledger - Canonical identity → merged Entity
//
// Two matching policies:
// - Exact: identity = normalize(name), O(1) lookup
// - Fuzzy: exact key if known, else best token-sort match against the
//   keys accepted so far (>= threshold), else a new identity
//
// The ledger is built fresh on every run and owned by the run that
// builds it. Insertion order is part of its state: under the fuzzy
// policy it decides which spelling becomes canonical.

use crate::entities::entity::{Entity, EntityRecord};
use crate::normalize::normalize_name;
use crate::similarity::{best_match, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

// ============================================================================
// MATCH POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Identity = normalized key
    Exact,

    /// Normalized key, falling back to similarity matching
    #[default]
    Fuzzy,
}

// ============================================================================
// HANDLES + OUTCOMES
// ============================================================================

/// Handle to an entity inside one ledger (entities are never removed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First sighting of this identity
    Created(EntityId),

    /// Normalized key equals a canonical key
    MergedExact(EntityId),

    /// Resolved through the similarity matcher
    MergedFuzzy { id: EntityId, score: u8 },

    /// Name normalized to "" - not merged anywhere
    SkippedEmptyName,
}

impl MergeOutcome {
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            MergeOutcome::Created(id) | MergeOutcome::MergedExact(id) => Some(*id),
            MergeOutcome::MergedFuzzy { id, .. } => Some(*id),
            MergeOutcome::SkippedEmptyName => None,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, MergeOutcome::Created(_))
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStatistics {
    pub total_entities: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub multi_source_entities: usize,
    pub involvement_types: BTreeMap<String, usize>,
    pub skipped_empty_names: usize,
}

// ============================================================================
// ENTITY LEDGER
// ============================================================================

pub struct EntityLedger {
    policy: MatchPolicy,

    /// Fuzzy acceptance cutoff (0-100)
    threshold: u8,

    /// Entities in creation order
    entities: Vec<Entity>,

    /// Canonical keys → entity. Fuzzy-matched spellings are never added,
    /// so each one is scored against every key accepted so far.
    index: HashMap<String, EntityId>,

    /// Canonical keys only, creation order (fuzzy candidate set)
    canonical_keys: Vec<String>,

    skipped_empty_names: usize,
}

impl EntityLedger {
    pub fn new(policy: MatchPolicy, threshold: u8) -> Self {
        EntityLedger {
            policy,
            threshold,
            entities: Vec::new(),
            index: HashMap::new(),
            canonical_keys: Vec::new(),
            skipped_empty_names: 0,
        }
    }

    pub fn exact() -> Self {
        Self::new(MatchPolicy::Exact, DEFAULT_THRESHOLD)
    }

    pub fn fuzzy(threshold: u8) -> Self {
        Self::new(MatchPolicy::Fuzzy, threshold)
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Merge one record into the ledger
    ///
    /// New identity → new Entity seeded from the record.
    /// Known identity → source added, that source's payload overwritten,
    /// categories and involvement types unioned.
    pub fn merge(&mut self, record: EntityRecord) -> MergeOutcome {
        let key = normalize_name(&record.name);

        if key.is_empty() {
            self.skipped_empty_names += 1;
            warn!(source = %record.source, name = %record.name, "entity name normalizes to empty key, skipping");
            return MergeOutcome::SkippedEmptyName;
        }

        if let Some(&id) = self.index.get(&key) {
            self.entities[id.0].absorb(record);
            return MergeOutcome::MergedExact(id);
        }

        if self.policy == MatchPolicy::Fuzzy {
            let matched = best_match(
                &key,
                self.canonical_keys.iter().map(String::as_str),
                self.threshold,
            )
            .map(|m| (m.key.to_string(), m.score));

            if let Some((matched_key, score)) = matched {
                if let Some(&id) = self.index.get(&matched_key) {
                    debug!(
                        name = %record.name,
                        key = %key,
                        matched = %matched_key,
                        score,
                        "fuzzy entity merge"
                    );
                    self.entities[id.0].absorb(record);
                    return MergeOutcome::MergedFuzzy { id, score };
                }
            }
        }

        let id = EntityId(self.entities.len());
        self.index.insert(key.clone(), id);
        self.canonical_keys.push(key.clone());
        self.entities.push(Entity::from_record(key, record));
        MergeOutcome::Created(id)
    }

    /// Merge a batch in the given order
    pub fn merge_all<I>(&mut self, records: I) -> Vec<MergeOutcome>
    where
        I: IntoIterator<Item = EntityRecord>,
    {
        records.into_iter().map(|r| self.merge(r)).collect()
    }

    /// Entity behind a handle returned by `merge`
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    /// Look up an entity by name (normalized, canonical keys only)
    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        let key = normalize_name(name);
        self.index.get(&key).map(|id| &self.entities[id.0])
    }

    /// Entities in creation order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn skipped_empty_names(&self) -> usize {
        self.skipped_empty_names
    }

    /// Consume the ledger, entities sorted by case-folded display name
    pub fn into_sorted_entities(self) -> Vec<Entity> {
        let mut entities = self.entities;
        entities.sort_by_key(|e| e.canonical_name.to_lowercase());
        entities
    }

    /// Counts by type / category / source / involvement type
    pub fn statistics(&self) -> EntityStatistics {
        let mut stats = EntityStatistics {
            total_entities: self.entities.len(),
            skipped_empty_names: self.skipped_empty_names,
            ..Default::default()
        };

        for entity in &self.entities {
            *stats
                .by_type
                .entry(entity.entity_type.as_str().to_string())
                .or_insert(0) += 1;

            for category in &entity.categories {
                *stats.by_category.entry(category.clone()).or_insert(0) += 1;
            }

            for source in &entity.sources {
                *stats.by_source.entry(source.clone()).or_insert(0) += 1;
            }

            if entity.is_multi_source() {
                stats.multi_source_entities += 1;
            }

            for involvement in &entity.involvement_types {
                *stats
                    .involvement_types
                    .entry(involvement.clone())
                    .or_insert(0) += 1;
            }
        }

        stats
    }
}

impl Default for EntityLedger {
    fn default() -> Self {
        Self::new(MatchPolicy::default(), DEFAULT_THRESHOLD)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::entity::{EntityType, GenericPayload, SourcePayload};

    fn payload(v: &str) -> SourcePayload {
        let mut fields = BTreeMap::new();
        fields.insert("v".to_string(), v.to_string());
        SourcePayload::Generic(GenericPayload { fields })
    }

    fn record(name: &str, source: &str, category: &str) -> EntityRecord {
        EntityRecord::new(name, source, payload(source)).with_category(category)
    }

    #[test]
    fn test_fuzzy_policy_merges_sources_and_categories() {
        let mut ledger = EntityLedger::fuzzy(95);

        let first = ledger.merge(record("Acme Inc", "A", "x"));
        let second = ledger.merge(record("Acme Incorporated", "B", "y"));

        assert!(first.is_new());
        assert_eq!(first.entity_id(), second.entity_id());
        assert_eq!(ledger.len(), 1);

        let entity = ledger.entity(first.entity_id().unwrap());
        assert_eq!(entity.sources, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(entity.categories, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_exact_policy_same_source_twice() {
        let mut ledger = EntityLedger::exact();

        ledger.merge(EntityRecord::new("Acme", "A", payload("first")));
        let outcome = ledger.merge(EntityRecord::new("ACME", "A", payload("second")));

        assert_eq!(outcome, MergeOutcome::MergedExact(EntityId(0)));
        let entity = ledger.entity(EntityId(0));
        assert_eq!(entity.sources, vec!["A".to_string()]);
        assert_eq!(entity.source_data.get("A"), Some(&payload("second")));
    }

    #[test]
    fn test_exact_policy_does_not_fuzzy_merge() {
        let mut ledger = EntityLedger::exact();

        ledger.merge(record("Exxon Mobil", "A", "x"));
        let outcome = ledger.merge(record("ExxonMobil", "B", "x"));

        assert!(outcome.is_new());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_fuzzy_policy_merges_near_spelling() {
        let mut ledger = EntityLedger::fuzzy(90);

        ledger.merge(record("Exxon Mobil Corp", "A", "x"));
        let outcome = ledger.merge(record("ExxonMobil Corp", "B", "y"));

        match outcome {
            MergeOutcome::MergedFuzzy { id, score } => {
                assert_eq!(id, EntityId(0));
                assert!(score >= 90);
            }
            other => panic!("expected fuzzy merge, got {:?}", other),
        }

        // Canonical name is the first spelling seen
        assert_eq!(ledger.entity(EntityId(0)).canonical_name, "Exxon Mobil Corp");

        // A fuzzy-matched spelling is not cached; its next sighting is scored again
        let again = ledger.merge(record("ExxonMobil", "C", "z"));
        assert!(matches!(again, MergeOutcome::MergedFuzzy { id: EntityId(0), .. }));
    }

    #[test]
    fn test_repeat_fuzzy_spelling_sees_later_keys() {
        let mut ledger = EntityLedger::fuzzy(75);

        ledger.merge(record("Vandelay", "A", "x"));
        // 80 against "vandelay"
        let first = ledger.merge(record("Vandelay Ind", "B", "x"));
        assert!(matches!(first, MergeOutcome::MergedFuzzy { id: EntityId(0), .. }));

        // 73 against "vandelay": a second identity
        let created = ledger.merge(record("Vandelay Indus", "C", "x"));
        assert_eq!(created, MergeOutcome::Created(EntityId(1)));

        // 92 against "vandelay indus" beats 80 against "vandelay"
        let again = ledger.merge(record("Vandelay Ind", "D", "x"));
        assert_eq!(again, MergeOutcome::MergedFuzzy { id: EntityId(1), score: 92 });
        assert_eq!(ledger.find_by_name("Vandelay Ind"), None);
    }

    #[test]
    fn test_fuzzy_policy_below_threshold_creates_new() {
        let mut ledger = EntityLedger::fuzzy(95);

        ledger.merge(record("Chevron", "A", "x"));
        let outcome = ledger.merge(record("Chevrolet", "B", "x"));

        assert!(outcome.is_new());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_empty_name_is_skipped() {
        let mut ledger = EntityLedger::fuzzy(0);

        ledger.merge(record("Acme", "A", "x"));
        let outcome = ledger.merge(record("  ...  ", "B", "y"));

        assert_eq!(outcome, MergeOutcome::SkippedEmptyName);
        assert_eq!(outcome.entity_id(), None);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.skipped_empty_names(), 1);
        // Threshold 0 would accept anything - still nothing merged into Acme
        assert_eq!(ledger.entity(EntityId(0)).sources, vec!["A".to_string()]);
    }

    #[test]
    fn test_find_by_name() {
        let mut ledger = EntityLedger::exact();
        ledger.merge(record("Acme Holdings", "A", "x"));

        assert!(ledger.find_by_name("ACME, Inc.").is_some());
        assert!(ledger.find_by_name("Globex").is_none());
    }

    #[test]
    fn test_statistics() {
        let mut ledger = EntityLedger::exact();

        ledger.merge(record("Acme", "A", "x").with_type(EntityType::Brand));
        ledger.merge(
            record("Acme", "B", "y")
                .with_type(EntityType::Company)
                .with_involvement(["prisons", "borders"]),
        );
        ledger.merge(record("Globex", "B", "y").with_type(EntityType::Company));
        ledger.merge(record("", "B", "y"));

        let stats = ledger.statistics();
        assert_eq!(stats.total_entities, 2);
        // First-seen type wins for Acme
        assert_eq!(stats.by_type.get("brand"), Some(&1));
        assert_eq!(stats.by_type.get("company"), Some(&1));
        assert_eq!(stats.by_category.get("x"), Some(&1));
        assert_eq!(stats.by_category.get("y"), Some(&2));
        assert_eq!(stats.by_source.get("A"), Some(&1));
        assert_eq!(stats.by_source.get("B"), Some(&2));
        assert_eq!(stats.multi_source_entities, 1);
        assert_eq!(stats.involvement_types.get("prisons"), Some(&1));
        assert_eq!(stats.skipped_empty_names, 1);
    }

    #[test]
    fn test_into_sorted_entities() {
        let mut ledger = EntityLedger::exact();
        ledger.merge(record("zeta", "A", "x"));
        ledger.merge(record("Alpha", "A", "x"));
        ledger.merge(record("beta", "A", "x"));

        let names: Vec<String> = ledger
            .into_sorted_entities()
            .into_iter()
            .map(|e| e.canonical_name)
            .collect();
        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_merge_order_decides_canonical_name() {
        let mut forward = EntityLedger::fuzzy(90);
        forward.merge_all(vec![
            record("Exxon Mobil Corp", "A", "x"),
            record("ExxonMobil Corp", "B", "x"),
        ]);

        let mut backward = EntityLedger::fuzzy(90);
        backward.merge_all(vec![
            record("ExxonMobil Corp", "B", "x"),
            record("Exxon Mobil Corp", "A", "x"),
        ]);

        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
        assert_eq!(forward.entities()[0].canonical_name, "Exxon Mobil Corp");
        assert_eq!(backward.entities()[0].canonical_name, "ExxonMobil Corp");
    }
}
