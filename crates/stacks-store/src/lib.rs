//! Stacks: an embedded, crash-safe, content-addressed vector and lexical
//! store (§4.2).

mod backend;
mod codec;
mod store;
mod volume;

pub use backend::{FileBackend, InMemoryBackend, StorageBackend};
pub use store::Stacks;
pub use volume::{
    AdvancedLookup, AdvancedSearchParams, Lookup, MetadataFilter, MetadataFilterMode, RankBy,
    ScoreBreakdown, TextSearchMode, Volume,
};
