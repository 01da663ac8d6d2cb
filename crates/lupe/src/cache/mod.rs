//! Persistent, size-bounded blob cache keyed by content fingerprints.
//!
//! The store owns a root directory with exactly three category
//! subdirectories:
//!
//! ```text
//! <root>/
//!   metadata/    JSON-encoded FileMetadata records
//!   thumbnails/  raw image blobs copied in from a caller-provided source
//!   processed/   opaque length-prefixed blobs owned by the producing inspector
//! ```
//!
//! Keys are derived from `(path, mtime, category, variant)`, so any change to
//! a source file that updates its modification time invalidates every entry
//! derived from it automatically; there is no separate invalidation path.
//! Superseded blobs become orphans and are reclaimed by eviction or clear.
//!
//! Corrupt entries are never surfaced to callers: a blob that fails to
//! deserialize is deleted and treated as a miss. A poisoned cache entry must
//! never fail an inspection.
//!
//! Eviction approximates LRU with "last written" as the recency signal. A
//! cache hit does not refresh an entry's eviction priority; this is a
//! documented limitation of the design, kept deliberately.

use crate::error::{LupeError, Result};
use crate::types::FileMetadata;
use ahash::AHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Fingerprint format width (32 hex digits).
const FINGERPRINT_WIDTH: usize = 32;

/// Length header prepended to `processed` blobs, little-endian u64.
const PROCESSED_HEADER_LEN: usize = 8;

/// The three cache categories. Every entry belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCategory {
    Metadata,
    Thumbnail,
    Processed,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 3] = [
        CacheCategory::Metadata,
        CacheCategory::Thumbnail,
        CacheCategory::Processed,
    ];

    /// Subdirectory name under the cache root.
    pub fn dir_name(self) -> &'static str {
        match self {
            CacheCategory::Metadata => "metadata",
            CacheCategory::Thumbnail => "thumbnails",
            CacheCategory::Processed => "processed",
        }
    }

    /// Blob filename suffix for the category.
    fn suffix(self) -> &'static str {
        match self {
            CacheCategory::Metadata => "json",
            CacheCategory::Thumbnail => "png",
            CacheCategory::Processed => "bin",
        }
    }

    /// Tag hashed into the fingerprint so categories never collide.
    fn tag(self) -> &'static str {
        match self {
            CacheCategory::Metadata => "metadata",
            CacheCategory::Thumbnail => "thumbnail",
            CacheCategory::Processed => "processed",
        }
    }
}

/// Derive the cache fingerprint for a source file.
///
/// Hashes the path, the file's modification time (zero when the file is
/// missing), the category tag, and the caller-supplied variant, formatted as
/// 32 hex characters. `AHasher::default()` uses fixed keys, so fingerprints
/// are stable across processes.
pub fn fingerprint(path: &Path, category: CacheCategory, variant: &str) -> String {
    let mtime = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .unwrap_or(Duration::ZERO);

    let mut hasher = AHasher::default();
    path.to_string_lossy().hash(&mut hasher);
    mtime.as_secs().hash(&mut hasher);
    mtime.subsec_nanos().hash(&mut hasher);
    category.tag().hash(&mut hasher);
    variant.hash(&mut hasher);

    format!("{:0width$x}", hasher.finish(), width = FINGERPRINT_WIDTH)
}

#[derive(Debug)]
struct CacheEntry {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Persistent blob store partitioned into the three cache categories.
///
/// The store exclusively owns its on-disk representation; callers never
/// mutate cache files directly. Per-key operations are independent of keys
/// they do not touch. Concurrent writers to the same fingerprint may race
/// (last write wins), which is acceptable because cached data for a fixed
/// fingerprint is derived deterministically from the same source state.
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create the store, creating the root and category directories.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for category in CacheCategory::ALL {
            fs::create_dir_all(root.join(category.dir_name()))
                .map_err(|e| LupeError::cache(format!("failed to create cache directory: {e}")))?;
        }
        tracing::info!(root = %root.display(), "cache store initialised");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, source: &Path, category: CacheCategory, variant: &str) -> PathBuf {
        let key = fingerprint(source, category, variant);
        self.root
            .join(category.dir_name())
            .join(format!("{key}.{}", category.suffix()))
    }

    /// Retrieve cached metadata for a source file.
    ///
    /// Returns `None` on miss. A blob that cannot be read or deserialized is
    /// deleted and reported as a miss.
    pub fn get_metadata(&self, source: &Path) -> Option<FileMetadata> {
        let blob = self.blob_path(source, CacheCategory::Metadata, "");
        if !blob.exists() {
            return None;
        }
        let raw = match fs::read_to_string(&blob) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(blob = %blob.display(), "unreadable metadata entry, discarding: {e}");
                self.discard(&blob);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(metadata) => {
                tracing::debug!(source = %source.display(), "metadata cache hit");
                Some(metadata)
            }
            Err(e) => {
                tracing::debug!(blob = %blob.display(), "corrupt metadata entry, discarding: {e}");
                self.discard(&blob);
                None
            }
        }
    }

    /// Cache a metadata record for a source file.
    pub fn set_metadata(&self, source: &Path, metadata: &FileMetadata) -> Result<()> {
        let blob = self.blob_path(source, CacheCategory::Metadata, "");
        let encoded = serde_json::to_vec_pretty(metadata)?;
        fs::write(&blob, encoded).map_err(|e| LupeError::cache(format!("failed to write metadata blob: {e}")))?;
        tracing::debug!(source = %source.display(), "cached metadata");
        Ok(())
    }

    /// Retrieve an opaque processed blob for a source file.
    ///
    /// The `variant` tag disambiguates multiple processed representations of
    /// the same file. The store validates only the length header; payload
    /// interpretation belongs to the inspector that wrote it.
    pub fn get_processed(&self, source: &Path, variant: &str) -> Option<Vec<u8>> {
        let blob = self.blob_path(source, CacheCategory::Processed, variant);
        if !blob.exists() {
            return None;
        }
        let raw = match fs::read(&blob) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(blob = %blob.display(), "unreadable processed entry, discarding: {e}");
                self.discard(&blob);
                return None;
            }
        };
        let Some(payload) = decode_processed(&raw) else {
            tracing::debug!(blob = %blob.display(), "corrupt processed entry, discarding");
            self.discard(&blob);
            return None;
        };
        tracing::debug!(source = %source.display(), variant, "processed cache hit");
        Some(payload.to_vec())
    }

    /// Cache an opaque processed blob for a source file.
    pub fn set_processed(&self, source: &Path, variant: &str, payload: &[u8]) -> Result<()> {
        let blob = self.blob_path(source, CacheCategory::Processed, variant);
        let mut buf = Vec::with_capacity(PROCESSED_HEADER_LEN + payload.len());
        buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        buf.extend_from_slice(payload);
        fs::write(&blob, buf).map_err(|e| LupeError::cache(format!("failed to write processed blob: {e}")))?;
        tracing::debug!(source = %source.display(), variant, "cached processed data");
        Ok(())
    }

    /// Path of the cached thumbnail for a source file, if one exists.
    pub fn get_thumbnail_path(&self, source: &Path) -> Option<PathBuf> {
        let blob = self.blob_path(source, CacheCategory::Thumbnail, "");
        blob.exists().then_some(blob)
    }

    /// Cache a thumbnail by copying in a caller-provided image file.
    pub fn set_thumbnail(&self, source: &Path, thumbnail: &Path) -> Result<()> {
        let blob = self.blob_path(source, CacheCategory::Thumbnail, "");
        fs::copy(thumbnail, &blob).map_err(|e| LupeError::cache(format!("failed to copy thumbnail: {e}")))?;
        tracing::debug!(source = %source.display(), "cached thumbnail");
        Ok(())
    }

    /// Total size in bytes across all three categories.
    ///
    /// Sums on-disk file sizes; directory overhead is not counted. The
    /// directory listing is the source of truth; there is no index file.
    pub fn size(&self) -> u64 {
        self.scan_entries().iter().map(|e| e.size).sum()
    }

    /// Evict oldest-written entries until total size is within `max_bytes`.
    ///
    /// No-op when already within bounds. Returns the number of entries
    /// removed. Recency is the blob's own modification time, i.e. its write
    /// time: a cache hit does not protect an entry from eviction.
    pub fn enforce_size_limit(&self, max_bytes: u64) -> usize {
        let mut entries = self.scan_entries();
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        if total <= max_bytes {
            return 0;
        }

        tracing::info!(total, max_bytes, "cache over size limit, evicting oldest entries");
        entries.sort_by_key(|e| e.modified);

        let mut removed = 0;
        for entry in entries {
            if total <= max_bytes {
                break;
            }
            match fs::remove_file(&entry.path) {
                Ok(()) => {
                    total = total.saturating_sub(entry.size);
                    removed += 1;
                }
                Err(e) => {
                    tracing::debug!(path = %entry.path.display(), "failed to evict entry: {e}");
                }
            }
        }

        tracing::info!(removed, remaining = total, "cache eviction complete");
        removed
    }

    /// Delete cache entries, optionally only those older than a duration.
    ///
    /// With `older_than = None` every entry in all three categories is
    /// deleted. Returns the number of entries removed.
    pub fn clear(&self, older_than: Option<Duration>) -> usize {
        let cutoff = older_than.map(|age| SystemTime::now() - age);
        let mut removed = 0;

        for entry in self.scan_entries() {
            if let Some(cutoff) = cutoff
                && entry.modified >= cutoff
            {
                continue;
            }
            match fs::remove_file(&entry.path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::debug!(path = %entry.path.display(), "failed to remove entry: {e}");
                }
            }
        }

        tracing::info!(removed, "cleared cache entries");
        removed
    }

    fn scan_entries(&self) -> Vec<CacheEntry> {
        let mut entries = Vec::new();
        for category in CacheCategory::ALL {
            let dir = self.root.join(category.dir_name());
            let read_dir = match fs::read_dir(&dir) {
                Ok(read_dir) => read_dir,
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), "failed to read cache directory: {e}");
                    continue;
                }
            };
            for entry in read_dir.flatten() {
                let metadata = match entry.metadata() {
                    Ok(m) if m.is_file() => m,
                    _ => continue,
                };
                let modified = match metadata.modified() {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::debug!("no modification time for {:?}: {e}", entry.path());
                        continue;
                    }
                };
                entries.push(CacheEntry {
                    path: entry.path(),
                    size: metadata.len(),
                    modified,
                });
            }
        }
        entries
    }

    fn discard(&self, blob: &Path) {
        if let Err(e) = fs::remove_file(blob) {
            tracing::debug!(blob = %blob.display(), "failed to remove cache file: {e}");
        }
    }
}

/// Validate the length header of a processed blob and return the payload.
fn decode_processed(raw: &[u8]) -> Option<&[u8]> {
    if raw.len() < PROCESSED_HEADER_LEN {
        return None;
    }
    let (header, payload) = raw.split_at(PROCESSED_HEADER_LEN);
    let declared = u64::from_le_bytes(header.try_into().ok()?);
    (declared == payload.len() as u64).then_some(payload)
}
