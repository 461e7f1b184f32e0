//! Content-addressed, TTL-based cache for OCR results.
//!
//! Entries are JSON files named by a fingerprint of (file content identity,
//! byte size, language). Caching is a pure optimization: every read or
//! write failure degrades to a cache miss and never surfaces to callers.

use crate::ocr::types::{OcrResult, WordBlock};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Entries older than this are treated as absent.
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Files at or above this size are fingerprinted by size+mtime metadata
/// instead of content. This is a deliberate performance/correctness
/// tradeoff: a large file rewritten with identical size and mtime but
/// different bytes would false-hit. Accepted heuristic, do not "fix"
/// by hashing large files.
const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Read buffer for content hashing (8KB)
const BUFFER_SIZE: usize = 8192;

/// Cached OCR output for one (document, language) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub text: String,
    pub blocks: Vec<WordBlock>,
    pub avg_confidence: f32,
    pub page_count: u32,
    pub timestamp_ms: i64,
    pub language: String,
}

impl CacheEntry {
    pub fn into_result(self) -> OcrResult {
        OcrResult {
            text: self.text,
            blocks: self.blocks,
            avg_confidence: self.avg_confidence,
            page_count: self.page_count,
            from_cache: true,
        }
    }
}

/// File-backed OCR result cache.
///
/// Last writer wins per key; concurrent reads of an entry being evicted
/// degrade to a miss, which is safe for a pure optimization.
pub struct OcrCache {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl OcrCache {
    /// Create a cache rooted at `cache_dir`, ensuring the directory exists.
    pub fn new(cache_dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            tracing::warn!("[OcrCache] Failed to create cache directory: {}", e);
        }
        Self {
            cache_dir,
            ttl: CACHE_TTL,
        }
    }

    #[cfg(test)]
    fn with_ttl(cache_dir: PathBuf, ttl: Duration) -> Self {
        let mut cache = Self::new(cache_dir);
        cache.ttl = ttl;
        cache
    }

    /// Look up a prior OCR result for (file, language).
    ///
    /// Stale entries are unlinked opportunistically and reported as absent.
    pub fn get(&self, path: &Path, language: &str) -> Option<CacheEntry> {
        let cache_path = self.entry_path(path, language)?;
        let data = fs::read_to_string(&cache_path).ok()?;
        let entry: CacheEntry = serde_json::from_str(&data).ok()?;

        let age_ms = Utc::now().timestamp_millis() - entry.timestamp_ms;
        if age_ms < 0 || age_ms as u128 > self.ttl.as_millis() {
            let _ = fs::remove_file(&cache_path);
            return None;
        }

        Some(entry)
    }

    /// Store an OCR result, overwriting any existing entry for the key.
    /// Failures are swallowed.
    pub fn put(&self, path: &Path, language: &str, result: &OcrResult) {
        let Some(cache_path) = self.entry_path(path, language) else {
            return;
        };

        let entry = CacheEntry {
            text: result.text.clone(),
            blocks: result.blocks.clone(),
            avg_confidence: result.avg_confidence,
            page_count: result.page_count,
            timestamp_ms: Utc::now().timestamp_millis(),
            language: language.to_string(),
        };

        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = fs::write(&cache_path, json) {
                    tracing::warn!("[OcrCache] Failed to write entry: {}", e);
                }
            }
            Err(e) => tracing::warn!("[OcrCache] Failed to serialize entry: {}", e),
        }
    }

    /// Remove all entries past TTL. Returns the number removed.
    pub fn evict_expired(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return 0;
        };

        let now_ms = Utc::now().timestamp_millis();
        let mut removed = 0;

        for dir_entry in entries.flatten() {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let stale = fs::read_to_string(&path)
                .ok()
                .and_then(|data| serde_json::from_str::<CacheEntry>(&data).ok())
                .map(|entry| {
                    let age_ms = now_ms - entry.timestamp_ms;
                    age_ms < 0 || age_ms as u128 > self.ttl.as_millis()
                })
                // Corrupt payloads are also evicted
                .unwrap_or(true);

            if stale && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        removed
    }

    /// Run periodic eviction on a background task, independent of request
    /// handling.
    pub fn spawn_maintenance(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately, so startup gets a sweep
            loop {
                ticker.tick().await;
                let removed = cache.evict_expired();
                if removed > 0 {
                    tracing::info!("[OcrCache] Evicted {} expired entries", removed);
                }
            }
        })
    }

    fn entry_path(&self, path: &Path, language: &str) -> Option<PathBuf> {
        let fingerprint = fingerprint(path, language)?;
        Some(self.cache_dir.join(format!("{}.json", fingerprint)))
    }
}

/// Compute the deterministic cache key for (file, language).
///
/// Small files hash full content; large files hash size+mtime only (see
/// [`LARGE_FILE_THRESHOLD`]). Byte size and language are always mixed in,
/// so identical bytes under different languages never collide.
fn fingerprint(path: &Path, language: &str) -> Option<String> {
    let metadata = fs::metadata(path).ok()?;
    let mut hasher = Sha256::new();

    if metadata.len() < LARGE_FILE_THRESHOLD {
        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        let mut buffer = [0u8; BUFFER_SIZE];
        loop {
            let read = reader.read(&mut buffer).ok()?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
    } else {
        hasher.update(metadata.len().to_string());
        hasher.update(mtime_millis(&metadata).to_string());
    }

    hasher.update(metadata.len().to_string());
    hasher.update(language);
    Some(hex::encode(hasher.finalize()))
}

fn mtime_millis(metadata: &fs::Metadata) -> u128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn sample_result(text: &str) -> OcrResult {
        OcrResult {
            text: text.to_string(),
            blocks: vec![WordBlock {
                text: text.to_string(),
                confidence: 0.9,
                bbox: [0.0, 10.0, 40.0, 20.0],
                page: 1,
            }],
            avg_confidence: 0.87,
            page_count: 1,
            from_cache: false,
        }
    }

    fn write_doc(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_put_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let doc = write_doc(&dir, "doc.pdf", b"pdf bytes");
        let cache = OcrCache::new(dir.path().join("cache"));

        cache.put(&doc, "rus", &sample_result("Дата: 12.05.2024"));
        let entry = cache.get(&doc, "rus").expect("entry should be present");

        assert_eq!(entry.text, "Дата: 12.05.2024");
        assert_eq!(entry.blocks.len(), 1);
        assert_eq!(entry.avg_confidence, 0.87);
        assert!(entry.into_result().from_cache);
    }

    #[test]
    fn test_language_changes_key() {
        let dir = TempDir::new().unwrap();
        let doc = write_doc(&dir, "doc.pdf", b"same bytes");
        let cache = OcrCache::new(dir.path().join("cache"));

        cache.put(&doc, "rus", &sample_result("русский"));
        cache.put(&doc, "eng", &sample_result("english"));

        assert_eq!(cache.get(&doc, "rus").unwrap().text, "русский");
        assert_eq!(cache.get(&doc, "eng").unwrap().text, "english");
    }

    #[test]
    fn test_identical_bytes_share_key() {
        let dir = TempDir::new().unwrap();
        let a = write_doc(&dir, "a.pdf", b"identical");
        let b = write_doc(&dir, "b.pdf", b"identical");

        assert_eq!(
            fingerprint(&a, "rus+eng").unwrap(),
            fingerprint(&b, "rus+eng").unwrap()
        );
    }

    #[test]
    fn test_expired_entry_is_absent_and_evictable() {
        let dir = TempDir::new().unwrap();
        let doc = write_doc(&dir, "doc.pdf", b"bytes");
        let cache_dir = dir.path().join("cache");
        let cache = OcrCache::new(cache_dir.clone());

        // Write an entry stamped 25 hours in the past
        let entry = CacheEntry {
            text: "old".to_string(),
            blocks: vec![],
            avg_confidence: 0.5,
            page_count: 1,
            timestamp_ms: Utc::now().timestamp_millis() - 25 * 60 * 60 * 1000,
            language: "rus".to_string(),
        };
        let key = fingerprint(&doc, "rus").unwrap();
        fs::write(
            cache_dir.join(format!("{}.json", key)),
            serde_json::to_string(&entry).unwrap(),
        )
        .unwrap();

        assert!(cache.get(&doc, "rus").is_none());

        // get() already unlinked it; a fresh stale entry is swept by eviction
        fs::write(
            cache_dir.join(format!("{}.json", key)),
            serde_json::to_string(&entry).unwrap(),
        )
        .unwrap();
        assert_eq!(cache.evict_expired(), 1);
        assert!(!cache_dir.join(format!("{}.json", key)).exists());
    }

    #[test]
    fn test_corrupt_entry_degrades_to_miss() {
        let dir = TempDir::new().unwrap();
        let doc = write_doc(&dir, "doc.pdf", b"bytes");
        let cache_dir = dir.path().join("cache");
        let cache = OcrCache::new(cache_dir.clone());

        let key = fingerprint(&doc, "rus").unwrap();
        fs::write(cache_dir.join(format!("{}.json", key)), b"{not json").unwrap();

        assert!(cache.get(&doc, "rus").is_none());
        assert_eq!(cache.evict_expired(), 1);
    }

    #[tokio::test]
    async fn test_maintenance_task_sweeps_expired_entries() {
        let dir = TempDir::new().unwrap();
        let doc = write_doc(&dir, "doc.pdf", b"bytes");
        let cache_dir = dir.path().join("cache");
        let cache = Arc::new(OcrCache::with_ttl(cache_dir.clone(), Duration::ZERO));
        cache.put(&doc, "rus", &sample_result("text"));

        let handle = cache.spawn_maintenance(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        let key = fingerprint(&doc, "rus").unwrap();
        assert!(!cache_dir.join(format!("{}.json", key)).exists());
    }

    #[test]
    fn test_zero_ttl_treats_everything_as_stale() {
        let dir = TempDir::new().unwrap();
        let doc = write_doc(&dir, "doc.pdf", b"bytes");
        let cache = OcrCache::with_ttl(dir.path().join("cache"), Duration::ZERO);

        cache.put(&doc, "rus", &sample_result("text"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&doc, "rus").is_none());
    }
}
