//! Persistence backend contract (§6.2): three operations over an opaque
//! `key -> bytes` map. `Stacks` never interprets backend internals; any
//! implementation that honors `load`/`save`/`close` is interchangeable.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use stacks_errors::StoreError;

pub trait StorageBackend: Send + Sync {
    fn load(&self) -> Result<HashMap<String, Vec<u8>>, StoreError>;
    fn save(&self, data: HashMap<String, Vec<u8>>) -> Result<(), StoreError>;
    fn close(&self) -> Result<(), StoreError>;
}

/// A backend that keeps its map in process memory. Used by tests and by
/// anything that wants Stacks' search/filter semantics without durability.
#[derive(Default)]
pub struct InMemoryBackend {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend directly with raw blobs, bypassing `save` — used by
    /// tests that want to inject deliberately corrupt entries.
    pub fn seed(&self, data: HashMap<String, Vec<u8>>) {
        *self.data.lock().expect("lock poisoned") = data;
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&self) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        Ok(self.data.lock().expect("lock poisoned").clone())
    }

    fn save(&self, data: HashMap<String, Vec<u8>>) -> Result<(), StoreError> {
        *self.data.lock().expect("lock poisoned") = data;
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A backend that persists the map to a single file: a flat sequence of
/// `u32 key_len · key · u32 value_len · value` entries. `save` writes to a
/// sibling temp file and renames over the target for atomic replacement.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        decode_file(&bytes).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "backing file at {} could not be decoded",
                self.path.display()
            ))
        })
    }

    fn save(&self, data: HashMap<String, Vec<u8>>) -> Result<(), StoreError> {
        let encoded = encode_file(&data);
        let tmp_path = tmp_path_for(&self.path);
        let mut f = std::fs::File::create(&tmp_path).map_err(|e| StoreError::Io(e.to_string()))?;
        f.write_all(&encoded).map_err(|e| StoreError::Io(e.to_string()))?;
        f.sync_all().map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".tmp");
    PathBuf::from(p)
}

fn encode_file(data: &HashMap<String, Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in data {
        let key_bytes = key.as_bytes();
        out.extend_from_slice(&(key_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(key_bytes);
        out.extend_from_slice(&(value.len() as u32).to_be_bytes());
        out.extend_from_slice(value);
    }
    out
}

/// The file itself is a whole-file container: unlike a per-record blob,
/// the whole file failing to decode is the `STACKS_CORRUPT` case of
/// "the backend itself signals a decoding failure that precludes reading
/// any records" (§4.2) — it is not a per-volume corruption.
fn decode_file(bytes: &[u8]) -> Option<HashMap<String, Vec<u8>>> {
    let mut map = HashMap::new();
    let mut cursor = 0usize;
    while cursor < bytes.len() {
        let key_len = u32::from_be_bytes(bytes.get(cursor..cursor + 4)?.try_into().ok()?) as usize;
        cursor += 4;
        let key = String::from_utf8(bytes.get(cursor..cursor + key_len)?.to_vec()).ok()?;
        cursor += key_len;
        let value_len =
            u32::from_be_bytes(bytes.get(cursor..cursor + 4)?.try_into().ok()?) as usize;
        cursor += 4;
        let value = bytes.get(cursor..cursor + value_len)?.to_vec();
        cursor += value_len;
        map.insert(key, value);
    }
    Some(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_backend_round_trips() {
        let backend = InMemoryBackend::new();
        let mut data = HashMap::new();
        data.insert("1".to_string(), vec![1, 2, 3]);
        backend.save(data.clone()).unwrap();
        assert_eq!(backend.load().unwrap(), data);
    }

    #[test]
    fn file_backend_round_trips_and_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stacks.bin");
        let backend = FileBackend::new(&path);
        assert!(backend.load().unwrap().is_empty());

        let mut data = HashMap::new();
        data.insert("1".to_string(), vec![9, 9, 9]);
        data.insert("2".to_string(), b"hello".to_vec());
        backend.save(data.clone()).unwrap();
        assert_eq!(backend.load().unwrap(), data);
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn file_backend_reports_corrupt_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stacks.bin");
        std::fs::write(&path, b"not a valid container at all \xff\xfe").unwrap();
        let backend = FileBackend::new(&path);
        assert!(backend.load().is_err());
    }
}
