use indexmap::IndexMap;

/// A stored tuple `(id, text, embedding, metadata, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub id: u64,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: IndexMap<String, String>,
    pub timestamp_ms: u64,
}

/// A vector-search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub volume: Volume,
    pub score: f32,
}

/// Per-signal score breakdown for [`AdvancedLookup`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub vector: Option<f32>,
    pub text: Option<f32>,
}

/// An `advanced_search` hit, preserving both vector and text sub-scores.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedLookup {
    pub volume: Volume,
    pub score: f32,
    pub scores: ScoreBreakdown,
}

/// Lexical search mode for [`crate::Stacks::text_search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSearchMode {
    Fuzzy,
    Substring,
    Exact,
    Regex,
    Token,
}

impl Default for TextSearchMode {
    fn default() -> Self {
        TextSearchMode::Fuzzy
    }
}

/// Metadata comparison mode for [`crate::Stacks::filter_by_metadata`].
#[derive(Debug, Clone)]
pub enum MetadataFilterMode {
    Eq(String),
    Neq(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Regex(String),
    Exists,
    NotExists,
}

/// A single metadata predicate: `key` combined with a [`MetadataFilterMode`].
/// `filter_by_metadata` ANDs every filter in the slice it is given.
#[derive(Debug, Clone)]
pub struct MetadataFilter {
    pub key: String,
    pub mode: MetadataFilterMode,
}

/// Composite ranking strategy for `advanced_search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Vector,
    Text,
    Multiply,
    Max,
}

impl Default for RankBy {
    fn default() -> Self {
        RankBy::Max
    }
}

/// Parameters for `advanced_search`.
#[derive(Debug, Clone, Default)]
pub struct AdvancedSearchParams {
    pub query_embedding: Option<Vec<f32>>,
    pub text: Option<String>,
    pub metadata: Vec<MetadataFilter>,
    pub after_ms: Option<u64>,
    pub before_ms: Option<u64>,
    pub rank_by: RankBy,
    pub max_results: usize,
}
