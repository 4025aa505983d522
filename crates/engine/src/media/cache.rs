//! Content-addressed media cache (spec §4.5, component C8): generated
//! images and music clips are keyed by `provider | style-or-mood |
//! description` hashed with SHA-1, so identical prompts are never
//! regenerated, and entries age out on a TTL plus a total-size bound.
//!
//! Grounded on the teacher's `infrastructure::cache::TtlCache`
//! (`sha1`/`hex`-keyed disk blobs, size eviction) generalized from a single
//! value type to images/music, stored under `<base_dir>/<key>.bin`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use base64::Engine;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error writing cache entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// `provider | style-or-mood | description` → content hash, truncated to the
/// first 12 hex characters (spec §4.5).
pub fn cache_key(provider: &str, style_or_mood: &str, description: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(provider.as_bytes());
    hasher.update(b"|");
    hasher.update(style_or_mood.as_bytes());
    hasher.update(b"|");
    hasher.update(description.as_bytes());
    hex::encode(hasher.finalize())[..12].to_string()
}

struct Entry {
    path: PathBuf,
    size_bytes: u64,
    inserted_at: Instant,
}

/// A TTL- and size-bounded disk cache of base64-encoded media blobs, indexed
/// in memory by content hash.
pub struct MediaCache {
    base_dir: PathBuf,
    ttl: Duration,
    max_total_bytes: u64,
    entries: HashMap<String, Entry>,
    total_bytes: u64,
}

impl MediaCache {
    pub fn new(base_dir: impl Into<PathBuf>, ttl: Duration, max_total_bytes: u64) -> Self {
        Self {
            base_dir: base_dir.into(),
            ttl,
            max_total_bytes,
            entries: HashMap::new(),
            total_bytes: 0,
        }
    }

    /// Looks up `key`, evicting it first if its TTL has elapsed.
    pub fn get(&mut self, key: &str) -> Option<PathBuf> {
        let expired = self
            .entries
            .get(key)
            .map(|e| e.inserted_at.elapsed() > self.ttl)
            .unwrap_or(false);
        if expired {
            self.evict(key);
            return None;
        }
        self.entries.get(key).map(|e| e.path.clone())
    }

    /// Stores `base64_payload` under `key`, evicting oldest entries first if
    /// the new entry would exceed `max_total_bytes`.
    pub fn put(&mut self, key: &str, base64_payload: &str) -> Result<PathBuf, CacheError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(base64_payload)?;
        std::fs::create_dir_all(&self.base_dir)?;
        let path = self.base_dir.join(format!("{key}.bin"));
        std::fs::write(&path, &bytes)?;

        let size = bytes.len() as u64;
        self.make_room_for(size);
        self.entries.insert(
            key.to_string(),
            Entry {
                path: path.clone(),
                size_bytes: size,
                inserted_at: Instant::now(),
            },
        );
        self.total_bytes += size;
        debug!(key, size, total_bytes = self.total_bytes, "media cache entry stored");
        Ok(path)
    }

    fn make_room_for(&mut self, incoming: u64) {
        if self.max_total_bytes == 0 {
            return;
        }
        let mut keys_oldest_first: Vec<String> = self.entries.keys().cloned().collect();
        keys_oldest_first.sort_by_key(|k| self.entries[k].inserted_at);
        let mut idx = 0;
        while self.total_bytes + incoming > self.max_total_bytes && idx < keys_oldest_first.len() {
            self.evict(&keys_oldest_first[idx]);
            idx += 1;
        }
    }

    fn evict(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.total_bytes = self.total_bytes.saturating_sub(entry.size_bytes);
            if let Err(err) = std::fs::remove_file(&entry.path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(key, error = %err, "failed to remove evicted media cache file");
                }
            }
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_and_order_sensitive() {
        let a = cache_key("openai", "exploration", "a dim hallway");
        let b = cache_key("openai", "exploration", "a dim hallway");
        let c = cache_key("openai", "combat", "a dim hallway");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12); // truncated SHA-1 hex digest
    }

    #[test]
    fn put_then_get_round_trips_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MediaCache::new(dir.path(), Duration::from_secs(60), 1024 * 1024);
        let key = cache_key("openai", "exploration", "a torchlit hall");
        let payload = base64::engine::general_purpose::STANDARD.encode(b"fake-image-bytes");
        let path = cache.put(&key, &payload).unwrap();
        assert!(path.exists());
        assert_eq!(cache.get(&key), Some(path));
    }

    #[test]
    fn expired_entry_is_evicted_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MediaCache::new(dir.path(), Duration::from_millis(0), 1024 * 1024);
        let key = cache_key("openai", "exploration", "fleeting");
        let payload = base64::engine::general_purpose::STANDARD.encode(b"bytes");
        cache.put(&key, &payload).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn size_bound_evicts_oldest_entry_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MediaCache::new(dir.path(), Duration::from_secs(60), 10);
        let payload_a = base64::engine::general_purpose::STANDARD.encode(b"12345");
        let payload_b = base64::engine::general_purpose::STANDARD.encode(b"67890");
        let payload_c = base64::engine::general_purpose::STANDARD.encode(b"abcde");

        let key_a = cache_key("p", "m", "a");
        let key_b = cache_key("p", "m", "b");
        let key_c = cache_key("p", "m", "c");

        cache.put(&key_a, &payload_a).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        cache.put(&key_b, &payload_b).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        cache.put(&key_c, &payload_c).unwrap();

        assert_eq!(cache.get(&key_a), None);
        assert!(cache.get(&key_b).is_some());
        assert!(cache.get(&key_c).is_some());
    }
}
