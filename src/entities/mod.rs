// Entity Models
//
// Each entity has:
// - A normalization key that decides identity within one run
// - Per-source payloads merged side by side, never across sources
// - A ledger that owns resolution (exact or fuzzy) and merge policy

pub mod entity;
pub mod ledger;

pub use entity::{
    AfscInvolvement, AfscPayload, BoycottPayload, Entity, EntityRecord, EntityType,
    GenericPayload, SourcePayload, WhoProfitsPayload,
};
pub use ledger::{EntityId, EntityLedger, EntityStatistics, MatchPolicy, MergeOutcome};
