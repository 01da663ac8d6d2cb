//! The inspector capability trait.

use crate::Result;
use crate::types::FileMetadata;
use std::path::Path;

/// Capability module able to interpret one family of file formats.
///
/// Inspectors are constructed once at discovery time, live for the process
/// lifetime behind `Arc<dyn Inspector>`, and are released on shutdown via
/// [`cleanup`](Inspector::cleanup).
///
/// # Thread Safety
///
/// Inspectors must be `Send + Sync`; extraction runs on executor worker
/// threads while resolution queries run on the caller's thread.
pub trait Inspector: Send + Sync {
    /// Unique inspector name (lowercase, no whitespace).
    fn name(&self) -> &str;

    /// Semantic version of the inspector.
    fn version(&self) -> &str;

    /// Coarse category label (e.g. "Images", "Documents") used for grouping,
    /// orthogonal to extension dispatch.
    fn domain(&self) -> &str;

    /// Supported extensions: lowercase, each including its leading dot.
    fn extensions(&self) -> &[&str];

    /// Optional plugin description for listings and logging.
    fn description(&self) -> &str {
        ""
    }

    /// Optional author information.
    fn author(&self) -> &str {
        ""
    }

    /// Upper bound on handled file size in bytes; `None` means unbounded.
    fn max_file_size(&self) -> Option<u64> {
        None
    }

    /// Whether extraction results may be served from the metadata cache.
    fn supports_caching(&self) -> bool {
        true
    }

    /// Whether the inspector reads input incrementally rather than whole.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Cheap format sniff used when extension dispatch is ambiguous or has
    /// failed. The default checks extension membership; inspectors for
    /// binary formats should override this with a magic-byte check.
    fn probe(&self, path: &Path) -> bool {
        let Some(ext) = extension_of(path) else {
            return false;
        };
        self.extensions().iter().any(|e| *e == ext.as_str())
    }

    /// Whether the inspector accepts this file, combining the format probe
    /// with the declared size bound.
    fn can_handle(&self, path: &Path, size_bytes: u64) -> bool {
        if let Some(limit) = self.max_file_size()
            && size_bytes > limit
        {
            tracing::warn!(
                inspector = self.name(),
                size_bytes,
                limit,
                "file exceeds inspector size limit"
            );
            return false;
        }
        self.probe(path)
    }

    /// Extract structured metadata from the file.
    ///
    /// An `Err` is converted into an error-shaped [`FileMetadata`] record at
    /// the orchestrator boundary, so extraction failure degrades into a
    /// partial result rather than aborting the inspection.
    fn extract(&self, path: &Path) -> Result<FileMetadata>;

    /// Release any held resources. Must be idempotent; called on shutdown
    /// and safe to invoke multiple times.
    fn cleanup(&self) {}
}

/// Lowercase extension of a path, including the leading dot.
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}
