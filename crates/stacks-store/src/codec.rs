//! Reference binary record format (§6.2): a fixed-order sequence of
//! length-prefixed fields, all integers big-endian.
//!
//! `u32 text_len · text` `u32 emb_len · base64(le f32 bytes)`
//! `u32 meta_len · json` `u64 timestamp_ms` `u32 access_count`
//! `u64 last_accessed_ms`
//!
//! A record that fails to decode (bad length prefix, short read, invalid
//! UTF-8, invalid JSON, invalid base64) is corrupt; the caller drops it and
//! marks the store dirty rather than propagating an error for the whole
//! store.

use base64::Engine;
use indexmap::IndexMap;

pub struct DecodedRecord {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: IndexMap<String, String>,
    pub timestamp_ms: u64,
    pub access_count: u32,
    pub last_accessed_ms: u64,
}

#[derive(Debug)]
pub struct CorruptRecord;

pub fn encode_record(
    text: &str,
    embedding: &[f32],
    metadata: &IndexMap<String, String>,
    timestamp_ms: u64,
    access_count: u32,
    last_accessed_ms: u64,
) -> Vec<u8> {
    let mut emb_bytes = Vec::with_capacity(embedding.len() * 4);
    for f in embedding {
        emb_bytes.extend_from_slice(&f.to_le_bytes());
    }
    let emb_b64 = base64::engine::general_purpose::STANDARD.encode(&emb_bytes);
    let meta_json = serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string());

    let mut out = Vec::new();
    let text_bytes = text.as_bytes();
    out.extend_from_slice(&(text_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(text_bytes);
    let emb_b64_bytes = emb_b64.as_bytes();
    out.extend_from_slice(&(emb_b64_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(emb_b64_bytes);
    let meta_bytes = meta_json.as_bytes();
    out.extend_from_slice(&(meta_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(meta_bytes);
    out.extend_from_slice(&timestamp_ms.to_be_bytes());
    out.extend_from_slice(&access_count.to_be_bytes());
    out.extend_from_slice(&last_accessed_ms.to_be_bytes());
    out
}

pub fn decode_record(bytes: &[u8]) -> Result<DecodedRecord, CorruptRecord> {
    let mut cursor = 0usize;

    let text = read_len_prefixed_str(bytes, &mut cursor)?;

    let emb_b64 = read_len_prefixed_str(bytes, &mut cursor)?;
    let emb_bytes = base64::engine::general_purpose::STANDARD
        .decode(emb_b64.as_bytes())
        .map_err(|_| CorruptRecord)?;
    if emb_bytes.len() % 4 != 0 {
        return Err(CorruptRecord);
    }
    let embedding: Vec<f32> = emb_bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let meta_json = read_len_prefixed_str(bytes, &mut cursor)?;
    let metadata: IndexMap<String, String> =
        serde_json::from_str(&meta_json).map_err(|_| CorruptRecord)?;

    let timestamp_ms = read_u64(bytes, &mut cursor)?;
    let access_count = read_u32(bytes, &mut cursor)?;
    let last_accessed_ms = read_u64(bytes, &mut cursor)?;

    Ok(DecodedRecord {
        text,
        embedding,
        metadata,
        timestamp_ms,
        access_count,
        last_accessed_ms,
    })
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, CorruptRecord> {
    let slice = bytes.get(*cursor..*cursor + 4).ok_or(CorruptRecord)?;
    *cursor += 4;
    Ok(u32::from_be_bytes(slice.try_into().unwrap()))
}

fn read_u64(bytes: &[u8], cursor: &mut usize) -> Result<u64, CorruptRecord> {
    let slice = bytes.get(*cursor..*cursor + 8).ok_or(CorruptRecord)?;
    *cursor += 8;
    Ok(u64::from_be_bytes(slice.try_into().unwrap()))
}

fn read_len_prefixed_str(bytes: &[u8], cursor: &mut usize) -> Result<String, CorruptRecord> {
    let len = read_u32(bytes, cursor)? as usize;
    let slice = bytes.get(*cursor..*cursor + len).ok_or(CorruptRecord)?;
    *cursor += len;
    String::from_utf8(slice.to_vec()).map_err(|_| CorruptRecord)
}
