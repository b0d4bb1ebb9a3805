//! A thin topic-indexed facade over [`stacks_store::Stacks`] (§4.3).

use std::sync::Arc;

use indexmap::IndexMap;

use stacks_core::LibraryConfig;
use stacks_errors::LibraryError;
use stacks_store::{AdvancedSearchParams, Lookup, MetadataFilter, MetadataFilterMode, RankBy, StorageBackend, Stacks, Volume};

const SHELF_KEY: &str = "shelf";
const TOPIC_KEY: &str = "topic";

/// Supplies embeddings on demand; implemented against whatever model-hosting
/// layer the caller has (an HTTP embedding endpoint, a local model, etc).
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LibraryError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub similarity: f32,
}

/// A `Library` wraps one `Stacks` instance. `shelf()` returns a scoped
/// sub-view sharing the same backing store and embedder but restricted to
/// volumes tagged with that shelf's name.
pub struct Library<B: StorageBackend, E: EmbeddingProvider> {
    stacks: Arc<Stacks<B>>,
    embedder: Arc<E>,
    config: LibraryConfig,
    shelf_name: Option<String>,
}

impl<B: StorageBackend, E: EmbeddingProvider> Library<B, E> {
    pub fn new(stacks: Arc<Stacks<B>>, embedder: Arc<E>, config: LibraryConfig) -> Self {
        Self {
            stacks,
            embedder,
            config,
            shelf_name: None,
        }
    }

    /// A named, metadata-scoped sub-view: adds and searches are restricted
    /// to volumes tagged with this shelf's name. Used by subagents so they
    /// cannot see or pollute the rest of the library.
    pub fn shelf(&self, name: impl Into<String>) -> Self {
        Self {
            stacks: Arc::clone(&self.stacks),
            embedder: Arc::clone(&self.embedder),
            config: self.config.clone(),
            shelf_name: Some(name.into()),
        }
    }

    fn scoped_metadata(&self, mut metadata: IndexMap<String, String>) -> IndexMap<String, String> {
        if let Some(shelf) = &self.shelf_name {
            metadata.insert(SHELF_KEY.to_string(), shelf.clone());
        }
        metadata
    }

    pub fn add(
        &self,
        text: impl Into<String>,
        metadata: Option<IndexMap<String, String>>,
    ) -> Result<u64, LibraryError> {
        let text = text.into();
        let embedding = self.embedder.embed(&text)?;
        let metadata = self.scoped_metadata(metadata.unwrap_or_default());
        Ok(self.stacks.add(text, embedding, Some(metadata))?)
    }

    pub fn search(
        &self,
        query: &str,
        max_results: usize,
        threshold: f32,
    ) -> Result<Vec<Lookup>, LibraryError> {
        let embedding = self.embedder.embed(query)?;
        let max_results = if max_results == 0 {
            self.config.default_max_results
        } else {
            max_results
        };

        if let Some(shelf) = &self.shelf_name {
            let params = AdvancedSearchParams {
                query_embedding: Some(embedding),
                text: None,
                metadata: vec![MetadataFilter {
                    key: SHELF_KEY.to_string(),
                    mode: MetadataFilterMode::Eq(shelf.clone()),
                }],
                after_ms: None,
                before_ms: None,
                rank_by: RankBy::Vector,
                max_results,
            };
            Ok(self
                .stacks
                .advanced_search(params)?
                .into_iter()
                .filter(|hit| hit.score >= threshold)
                .map(|hit| Lookup { volume: hit.volume, score: hit.score })
                .collect())
        } else {
            Ok(self.stacks.search(&embedding, max_results, threshold)?)
        }
    }

    /// Embeds `text` and reports whether the best existing match exceeds
    /// `threshold` (default from [`LibraryConfig::duplicate_threshold`],
    /// typically `0.9`).
    pub fn check_duplicate(
        &self,
        text: &str,
        threshold: Option<f32>,
    ) -> Result<DuplicateCheck, LibraryError> {
        let threshold = threshold.unwrap_or(self.config.duplicate_threshold);
        let embedding = self.embedder.embed(text)?;
        let best = self.stacks.search(&embedding, 1, f32::MIN)?.into_iter().next();
        let similarity = best.map(|hit| hit.score).unwrap_or(0.0);
        Ok(DuplicateCheck {
            is_duplicate: similarity >= threshold,
            similarity,
        })
    }

    /// Removes a volume by id, scoped to this shelf if one is set so a
    /// shelf cannot withdraw entries outside its own view.
    pub fn withdraw(&self, id: u64) -> Result<bool, LibraryError> {
        if let Some(shelf) = &self.shelf_name {
            let belongs = self
                .stacks
                .get_by_id(id)
                .map(|v| v.metadata.get(SHELF_KEY).map(|s| s.as_str()) == Some(shelf.as_str()))
                .unwrap_or(false);
            if !belongs {
                return Ok(false);
            }
        }
        Ok(self.stacks.delete(id)?)
    }

    /// Metadata-filter shortcut: volumes whose `topic` metadata matches any
    /// of `topics`.
    pub fn filter_by_topic(&self, topics: &[String]) -> Vec<Volume> {
        self.stacks
            .get_all()
            .into_iter()
            .filter(|v| {
                if let Some(shelf) = &self.shelf_name {
                    if v.metadata.get(SHELF_KEY).map(|s| s.as_str()) != Some(shelf.as_str()) {
                        return false;
                    }
                }
                v.metadata
                    .get(TOPIC_KEY)
                    .map(|t| topics.iter().any(|wanted| wanted == t))
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacks_core::StoreConfig;
    use stacks_store::InMemoryBackend;

    struct StubEmbedder;

    impl EmbeddingProvider for StubEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, LibraryError> {
            // Deterministic stub: embed by character frequency of 'a'..'c'.
            let mut v = vec![0.0f32; 3];
            for c in text.chars() {
                match c {
                    'a' => v[0] += 1.0,
                    'b' => v[1] += 1.0,
                    'c' => v[2] += 1.0,
                    _ => {}
                }
            }
            if v.iter().all(|x| *x == 0.0) {
                v[0] = 1.0;
            }
            Ok(v)
        }
    }

    fn new_library() -> Library<InMemoryBackend, StubEmbedder> {
        let stacks = Arc::new(Stacks::new(InMemoryBackend::new(), StoreConfig::default()));
        stacks.load().unwrap();
        Library::new(stacks, Arc::new(StubEmbedder), LibraryConfig::default())
    }

    #[test]
    fn add_and_search_round_trip() {
        let lib = new_library();
        lib.add("aaa", None).unwrap();
        lib.add("ccc", None).unwrap();
        let hits = lib.search("aaa", 10, 0.0).unwrap();
        assert_eq!(hits[0].volume.text, "aaa");
    }

    #[test]
    fn check_duplicate_detects_near_identical_text() {
        let lib = new_library();
        lib.add("aaa", None).unwrap();
        let check = lib.check_duplicate("aaa", None).unwrap();
        assert!(check.is_duplicate);
        assert!(check.similarity > 0.9);
    }

    #[test]
    fn shelf_scopes_add_and_search() {
        let lib = new_library();
        let shelf_a = lib.shelf("agent-a");
        let shelf_b = lib.shelf("agent-b");
        shelf_a.add("aaa", None).unwrap();
        shelf_b.add("aaa", None).unwrap();

        let hits = shelf_a.search("aaa", 10, 0.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].volume.metadata.get("shelf").map(|s| s.as_str()),
            Some("agent-a")
        );
    }

    #[test]
    fn withdraw_removes_volume_and_is_idempotent() {
        let lib = new_library();
        let id = lib.add("aaa", None).unwrap();
        assert!(lib.withdraw(id).unwrap());
        assert!(lib.search("aaa", 10, 0.0).unwrap().is_empty());
        assert!(!lib.withdraw(id).unwrap());
    }

    #[test]
    fn withdraw_is_scoped_to_shelf() {
        let lib = new_library();
        let shelf_a = lib.shelf("agent-a");
        let shelf_b = lib.shelf("agent-b");
        let id = shelf_a.add("aaa", None).unwrap();
        assert!(!shelf_b.withdraw(id).unwrap());
        assert!(shelf_a.withdraw(id).unwrap());
    }

    #[test]
    fn filter_by_topic_matches_any_requested_topic() {
        let lib = new_library();
        let mut meta = IndexMap::new();
        meta.insert("topic".to_string(), "rust".to_string());
        lib.add("aaa", Some(meta)).unwrap();
        lib.add("bbb", None).unwrap();

        let hits = lib.filter_by_topic(&["rust".to_string()]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "aaa");
    }
}
