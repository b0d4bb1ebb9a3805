use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use indexmap::IndexMap;
use regex::Regex;

use stacks_core::StoreConfig;
use stacks_errors::{CodedError, StoreError};
use stacks_kernel::{cosine, fuzzy, token_overlap};

use crate::backend::StorageBackend;
use crate::codec::{decode_record, encode_record};
use crate::volume::{
    AdvancedLookup, AdvancedSearchParams, Lookup, MetadataFilter, MetadataFilterMode, RankBy,
    ScoreBreakdown, TextSearchMode, Volume,
};

struct Record {
    volume: Volume,
    access_count: u32,
    last_accessed_ms: u64,
}

/// A running periodic-flush thread, owned by the `Stacks` that spawned it.
struct FlushThread {
    stop: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
}

impl FlushThread {
    fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

/// An embedded, crash-safe, content-addressed vector and text store.
///
/// Single-writer discipline: mutations take an exclusive lock (`Mutex`) for
/// their duration; readers take a shared lock (`RwLock`) and observe a
/// stable snapshot. `dispose` cancels any running flush timer and flushes
/// if dirty; it is idempotent.
pub struct Stacks<B: StorageBackend> {
    backend: B,
    config: StoreConfig,
    records: RwLock<IndexMap<u64, Record>>,
    next_id: Mutex<u64>,
    loaded: Mutex<bool>,
    dirty: Mutex<bool>,
    flush_thread: Mutex<Option<FlushThread>>,
}

impl<B: StorageBackend> Stacks<B> {
    pub fn new(backend: B, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            records: RwLock::new(IndexMap::new()),
            next_id: Mutex::new(1),
            loaded: Mutex::new(false),
            dirty: Mutex::new(false),
            flush_thread: Mutex::new(None),
        }
    }

    pub fn is_dirty(&self) -> bool {
        *self.dirty.lock().expect("lock poisoned")
    }

    pub fn size(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    fn mark_dirty(&self) {
        *self.dirty.lock().expect("lock poisoned") = true;
    }

    fn maybe_auto_save(&self) -> Result<(), StoreError> {
        if self.config.auto_save {
            self.save()?;
        }
        Ok(())
    }

    /// Read the backend and populate the in-memory index. Per-record
    /// corruption (bad length prefixes, short reads, invalid UTF-8, invalid
    /// JSON) is tolerated: the record is dropped and the store becomes
    /// dirty. A backend failure that precludes reading any records at all
    /// is fatal and surfaces as `STACKS_CORRUPT`/`STACKS_IO`.
    pub fn load(&self) -> Result<(), StoreError> {
        let raw = self.backend.load()?;
        let mut records = IndexMap::new();
        let mut max_id = 0u64;
        let mut any_corrupt = false;

        for (key, bytes) in raw {
            if key.starts_with("__") {
                continue;
            }
            let id: u64 = match key.parse() {
                Ok(id) => id,
                Err(_) => {
                    any_corrupt = true;
                    continue;
                }
            };
            match decode_record(&bytes) {
                Ok(decoded) => {
                    max_id = max_id.max(id);
                    records.insert(
                        id,
                        Record {
                            volume: Volume {
                                id,
                                text: decoded.text,
                                embedding: decoded.embedding,
                                metadata: decoded.metadata,
                                timestamp_ms: decoded.timestamp_ms,
                            },
                            access_count: decoded.access_count,
                            last_accessed_ms: decoded.last_accessed_ms,
                        },
                    );
                }
                Err(_) => {
                    tracing::warn!(id, "dropping corrupt volume record at load");
                    any_corrupt = true;
                }
            }
        }

        *self.records.write().expect("lock poisoned") = records;
        *self.next_id.lock().expect("lock poisoned") = max_id + 1;
        *self.loaded.lock().expect("lock poisoned") = true;
        if any_corrupt {
            self.mark_dirty();
        }
        Ok(())
    }

    fn require_loaded(&self) -> Result<(), StoreError> {
        if *self.loaded.lock().expect("lock poisoned") {
            Ok(())
        } else {
            Err(StoreError::NotLoaded)
        }
    }

    pub fn add(
        &self,
        text: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Option<IndexMap<String, String>>,
    ) -> Result<u64, StoreError> {
        self.require_loaded()?;
        let text = text.into();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }
        if embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding);
        }
        let mut next_id = self.next_id.lock().expect("lock poisoned");
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        let timestamp_ms = now_ms();
        let mut records = self.records.write().expect("lock poisoned");
        records.insert(
            id,
            Record {
                volume: Volume {
                    id,
                    text,
                    embedding,
                    metadata: metadata.unwrap_or_default(),
                    timestamp_ms,
                },
                access_count: 0,
                last_accessed_ms: timestamp_ms,
            },
        );
        drop(records);
        self.mark_dirty();
        self.maybe_auto_save()?;
        Ok(id)
    }

    /// Validates every entry before mutating; on any violation the store is
    /// left untouched. Persists once (not once per entry) when `auto_save`.
    pub fn add_batch(
        &self,
        entries: Vec<(String, Vec<f32>, Option<IndexMap<String, String>>)>,
    ) -> Result<Vec<u64>, StoreError> {
        self.require_loaded()?;
        for (text, embedding, _) in &entries {
            if text.is_empty() {
                return Err(StoreError::EmptyText);
            }
            if embedding.is_empty() {
                return Err(StoreError::EmptyEmbedding);
            }
        }

        let mut ids = Vec::with_capacity(entries.len());
        let mut next_id = self.next_id.lock().expect("lock poisoned");
        let mut records = self.records.write().expect("lock poisoned");
        for (text, embedding, metadata) in entries {
            let id = *next_id;
            *next_id += 1;
            let timestamp_ms = now_ms();
            records.insert(
                id,
                Record {
                    volume: Volume {
                        id,
                        text,
                        embedding,
                        metadata: metadata.unwrap_or_default(),
                        timestamp_ms,
                    },
                    access_count: 0,
                    last_accessed_ms: timestamp_ms,
                },
            );
            ids.push(id);
        }
        drop(records);
        drop(next_id);
        self.mark_dirty();
        self.maybe_auto_save()?;
        Ok(ids)
    }

    pub fn delete(&self, id: u64) -> Result<bool, StoreError> {
        self.require_loaded()?;
        let removed = self
            .records
            .write()
            .expect("lock poisoned")
            .shift_remove(&id)
            .is_some();
        if removed {
            self.mark_dirty();
            self.maybe_auto_save()?;
        }
        Ok(removed)
    }

    pub fn delete_batch(&self, ids: &[u64]) -> Result<usize, StoreError> {
        self.require_loaded()?;
        let mut records = self.records.write().expect("lock poisoned");
        let mut count = 0;
        for id in ids {
            if records.shift_remove(id).is_some() {
                count += 1;
            }
        }
        drop(records);
        if count > 0 {
            self.mark_dirty();
            self.maybe_auto_save()?;
        }
        Ok(count)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.records.write().expect("lock poisoned").clear();
        self.mark_dirty();
        self.maybe_auto_save()
    }

    pub fn get_by_id(&self, id: u64) -> Option<Volume> {
        self.records
            .read()
            .expect("lock poisoned")
            .get(&id)
            .map(|r| r.volume.clone())
    }

    /// A stable snapshot, not a live view: later mutations don't affect the
    /// returned `Vec`.
    pub fn get_all(&self) -> Vec<Volume> {
        self.records
            .read()
            .expect("lock poisoned")
            .values()
            .map(|r| r.volume.clone())
            .collect()
    }

    /// Cosine search against every volume whose embedding dimension matches
    /// the query; mismatched-dimension volumes are silently skipped.
    pub fn search(
        &self,
        query_embedding: &[f32],
        max_results: usize,
        threshold: f32,
    ) -> Result<Vec<Lookup>, StoreError> {
        self.require_loaded()?;
        if query_embedding.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }
        let records = self.records.read().expect("lock poisoned");
        let mut hits: Vec<Lookup> = records
            .values()
            .filter(|r| r.volume.embedding.len() == query_embedding.len())
            .map(|r| Lookup {
                volume: r.volume.clone(),
                score: cosine(query_embedding, &r.volume.embedding),
            })
            .filter(|lookup| lookup.score >= threshold)
            .collect();
        sort_and_truncate(&mut hits, max_results);
        Ok(hits)
    }

    pub fn text_search(
        &self,
        query: &str,
        mode: TextSearchMode,
        threshold: f32,
        max_results: usize,
    ) -> Result<Vec<Lookup>, StoreError> {
        self.require_loaded()?;
        if query.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }
        let regex = if mode == TextSearchMode::Regex {
            Regex::new(query).ok()
        } else {
            None
        };
        let records = self.records.read().expect("lock poisoned");
        let mut hits: Vec<Lookup> = records
            .values()
            .map(|r| Lookup {
                volume: r.volume.clone(),
                score: text_score(query, &r.volume.text, mode, regex.as_ref()),
            })
            .filter(|lookup| lookup.score >= threshold)
            .collect();
        sort_and_truncate(&mut hits, max_results);
        Ok(hits)
    }

    pub fn filter_by_metadata(&self, filters: &[MetadataFilter]) -> Vec<Volume> {
        self.records
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|r| filters.iter().all(|f| metadata_matches(&r.volume, f)))
            .map(|r| r.volume.clone())
            .collect()
    }

    pub fn filter_by_date_range(&self, after_ms: Option<u64>, before_ms: Option<u64>) -> Vec<Volume> {
        self.records
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|r| {
                after_ms.map_or(true, |a| r.volume.timestamp_ms >= a)
                    && before_ms.map_or(true, |b| r.volume.timestamp_ms <= b)
            })
            .map(|r| r.volume.clone())
            .collect()
    }

    pub fn advanced_search(&self, params: AdvancedSearchParams) -> Result<Vec<AdvancedLookup>, StoreError> {
        self.require_loaded()?;
        let records = self.records.read().expect("lock poisoned");
        let candidates: Vec<&Record> = records
            .values()
            .filter(|r| params.metadata.iter().all(|f| metadata_matches(&r.volume, f)))
            .filter(|r| {
                params.after_ms.map_or(true, |a| r.volume.timestamp_ms >= a)
                    && params.before_ms.map_or(true, |b| r.volume.timestamp_ms <= b)
            })
            .collect();

        let regex = match &params.text {
            Some(q) => Regex::new(q).ok(),
            None => None,
        };

        let mut hits: Vec<AdvancedLookup> = candidates
            .into_iter()
            .map(|r| {
                let vector = params
                    .query_embedding
                    .as_ref()
                    .filter(|q| q.len() == r.volume.embedding.len())
                    .map(|q| cosine(q, &r.volume.embedding));
                let text = params
                    .text
                    .as_ref()
                    .map(|q| text_score(q, &r.volume.text, TextSearchMode::Fuzzy, regex.as_ref()));
                let score = composite_score(vector, text, params.rank_by);
                AdvancedLookup {
                    volume: r.volume.clone(),
                    score,
                    scores: ScoreBreakdown { vector, text },
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let max_results = if params.max_results == 0 {
            hits.len()
        } else {
            params.max_results
        };
        hits.truncate(max_results);
        Ok(hits)
    }

    /// Snapshot current volumes and write via the backend; clears dirty.
    pub fn save(&self) -> Result<(), StoreError> {
        self.require_loaded()?;
        let records = self.records.read().expect("lock poisoned");
        let mut blob_map = std::collections::HashMap::new();
        for (id, record) in records.iter() {
            let blob = encode_record(
                &record.volume.text,
                &record.volume.embedding,
                &record.volume.metadata,
                record.volume.timestamp_ms,
                record.access_count,
                record.last_accessed_ms,
            );
            blob_map.insert(id.to_string(), blob);
        }
        drop(records);
        self.backend.save(blob_map)?;
        *self.dirty.lock().expect("lock poisoned") = false;
        Ok(())
    }

    /// Cancels any running flush timer, flushes if dirty, and closes the
    /// backend. Idempotent: calling it again with no timer and a clean
    /// store is a no-op beyond `backend.close()`.
    pub fn dispose(&self) -> Result<(), StoreError> {
        if let Some(thread) = self.flush_thread.lock().expect("lock poisoned").take() {
            thread.stop();
        }
        if self.is_dirty() {
            self.save()?;
        }
        self.backend.close()
    }

    /// Spawns a background thread that saves on a fixed interval while the
    /// store is dirty, storing the handle on `self` so `dispose` can cancel
    /// it. Returns `false` if `flush_interval_ms` is 0 (the default;
    /// periodic flushing is opt-in) or a flush thread is already running.
    pub fn spawn_flush_task(self: &Arc<Self>) -> bool
    where
        B: 'static,
    {
        let interval_ms = self.config.flush_interval_ms;
        if interval_ms == 0 {
            return false;
        }
        let mut slot = self.flush_thread.lock().expect("lock poisoned");
        if slot.is_some() {
            return false;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let store = Arc::clone(self);
        let handle = std::thread::spawn(move || {
            let interval = Duration::from_millis(interval_ms);
            while !thread_stop.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                if thread_stop.load(Ordering::SeqCst) {
                    break;
                }
                if store.is_dirty() {
                    if let Err(err) = store.save() {
                        tracing::warn!(code = err.code(), "periodic flush failed");
                    }
                }
            }
        });
        *slot = Some(FlushThread { stop, handle });
        true
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn sort_and_truncate(hits: &mut Vec<Lookup>, max_results: usize) {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(max_results);
}

fn text_score(query: &str, text: &str, mode: TextSearchMode, regex: Option<&Regex>) -> f32 {
    match mode {
        TextSearchMode::Fuzzy => fuzzy(query, text) as f32,
        TextSearchMode::Substring => {
            if text.to_lowercase().contains(&query.to_lowercase()) {
                1.0
            } else {
                0.0
            }
        }
        TextSearchMode::Exact => {
            if query == text {
                1.0
            } else {
                0.0
            }
        }
        TextSearchMode::Regex => match regex {
            Some(re) => {
                if re.is_match(text) {
                    1.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        },
        TextSearchMode::Token => token_overlap(query, text) as f32,
    }
}

fn composite_score(vector: Option<f32>, text: Option<f32>, rank_by: RankBy) -> f32 {
    match rank_by {
        RankBy::Vector => vector.unwrap_or(0.0),
        RankBy::Text => text.unwrap_or(0.0),
        RankBy::Multiply => vector.unwrap_or(1.0) * text.unwrap_or(1.0),
        RankBy::Max => vector.unwrap_or(0.0).max(text.unwrap_or(0.0)),
    }
}

fn metadata_matches(volume: &Volume, filter: &MetadataFilter) -> bool {
    let value = volume.metadata.get(&filter.key);
    match &filter.mode {
        MetadataFilterMode::Exists => value.is_some(),
        MetadataFilterMode::NotExists => value.is_none(),
        MetadataFilterMode::Eq(expected) => value.map(|v| v == expected).unwrap_or(false),
        MetadataFilterMode::Neq(expected) => value.map(|v| v != expected).unwrap_or(true),
        MetadataFilterMode::Contains(needle) => value
            .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        MetadataFilterMode::StartsWith(prefix) => value
            .map(|v| v.to_lowercase().starts_with(&prefix.to_lowercase()))
            .unwrap_or(false),
        MetadataFilterMode::EndsWith(suffix) => value
            .map(|v| v.to_lowercase().ends_with(&suffix.to_lowercase()))
            .unwrap_or(false),
        MetadataFilterMode::Regex(pattern) => Regex::new(pattern)
            .ok()
            .and_then(|re| value.map(|v| re.is_match(v)))
            .unwrap_or(false),
    }
}
