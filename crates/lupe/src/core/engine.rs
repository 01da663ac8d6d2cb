//! Inspection orchestration.
//!
//! The engine is the composition root: it owns the registry, the cache
//! store, and the task executor, and wires them into the single
//! `inspect` entry point. Registry resolution and cache lookup run
//! synchronously on the calling thread (pure lookups plus one stat and at
//! most one small read); only extraction, the one unbounded-cost operation,
//! is routed through the executor.
//!
//! Extraction is strictly single-flight per fingerprint: concurrent
//! inspections of the same file state share one in-flight extraction and
//! receive the same record. A cache hit that appears while a flight is in
//! progress is authoritative for later callers.

use crate::cache::{CacheCategory, CacheStore, fingerprint};
use crate::core::config::EngineConfig;
use crate::core::sniff;
use crate::error::LupeError;
use crate::executor::TaskExecutor;
use crate::plugins::registry::InspectorRegistry;
use crate::plugins::traits::{Inspector, extension_of};
use crate::types::{FileMetadata, Inspection};
use crate::Result;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cache writes between opportunistic size-limit enforcement passes.
const SIZE_ENFORCE_INTERVAL: usize = 32;

/// An in-flight extraction shared by concurrent requesters of one fingerprint.
struct Flight {
    result: Mutex<Option<FileMetadata>>,
    ready: Condvar,
}

/// File inspection engine.
///
/// # Example
///
/// ```rust,no_run
/// use lupe::{Engine, EngineConfig, Inspection};
///
/// # fn main() -> lupe::Result<()> {
/// let engine = Engine::new(EngineConfig::default())?;
/// match engine.inspect("photo.png", false)? {
///     Inspection::Report { metadata, inspector } => {
///         println!("[{inspector}] {}", metadata.summary);
///     }
///     Inspection::Unsupported { type_label, .. } => println!("unsupported: {type_label}"),
///     Inspection::NotFound => println!("no such file"),
/// }
/// engine.shutdown(true);
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    registry: InspectorRegistry,
    cache: Option<CacheStore>,
    executor: TaskExecutor,
    flights: Mutex<HashMap<String, Arc<Flight>>>,
    write_counter: AtomicUsize,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine with the builtin inspectors.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_registry(InspectorRegistry::with_builtins(), config)
    }

    /// Build an engine around an already-populated registry.
    pub fn with_registry(registry: InspectorRegistry, config: EngineConfig) -> Result<Self> {
        let cache = if config.use_cache {
            Some(CacheStore::new(config.resolved_cache_dir())?)
        } else {
            None
        };
        let executor = TaskExecutor::new(config.max_workers)?;

        Ok(Self {
            registry,
            cache,
            executor,
            flights: Mutex::new(HashMap::new()),
            write_counter: AtomicUsize::new(1),
            config,
        })
    }

    pub fn registry(&self) -> &InspectorRegistry {
        &self.registry
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Inspect a file.
    ///
    /// Resolves an inspector, serves the metadata cache when possible, and
    /// otherwise runs extraction on the worker pool. `force_refresh` skips
    /// the cache read but still writes the fresh result back.
    ///
    /// Resolution failure is not an error: it yields
    /// [`Inspection::Unsupported`] with the extension, a sniffed type label,
    /// and the size, or [`Inspection::NotFound`] for a missing path.
    pub fn inspect(&self, path: impl AsRef<Path>, force_refresh: bool) -> Result<Inspection> {
        let path = path.as_ref();
        let Ok(stat) = fs::metadata(path) else {
            return Ok(Inspection::NotFound);
        };
        if !stat.is_file() {
            return Ok(Inspection::NotFound);
        }
        let size = stat.len();

        // Canonical paths keep fingerprints stable across ways of naming the
        // same file.
        let path: PathBuf = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if size > self.config.max_file_size_bytes() {
            tracing::warn!(path = %path.display(), size, "file exceeds the engine size cap");
            return Ok(self.unsupported(&path, size));
        }

        let Some(inspector) = self.registry.resolve(&path) else {
            tracing::debug!(path = %path.display(), "no inspector accepted the file");
            return Ok(self.unsupported(&path, size));
        };

        let cacheable = inspector.supports_caching() && self.cache.is_some();
        if cacheable
            && !force_refresh
            && let Some(cache) = &self.cache
            && let Some(metadata) = cache.get_metadata(&path)
        {
            return Ok(Inspection::Report {
                metadata,
                inspector: inspector.name().to_string(),
            });
        }

        let metadata = self.extract_single_flight(&path, size, &inspector, cacheable);
        Ok(Inspection::Report {
            metadata,
            inspector: inspector.name().to_string(),
        })
    }

    /// Run extraction for one fingerprint, deduplicating concurrent callers.
    ///
    /// The first caller becomes the flight leader, submits the work, waits
    /// for it, writes the cache, and publishes the record to any followers
    /// blocked on the flight.
    fn extract_single_flight(
        &self,
        path: &Path,
        size: u64,
        inspector: &Arc<dyn Inspector>,
        cacheable: bool,
    ) -> FileMetadata {
        let key = fingerprint(path, CacheCategory::Metadata, "");

        let (flight, leader) = {
            let mut flights = self.flights.lock();
            match flights.get(&key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight {
                        result: Mutex::new(None),
                        ready: Condvar::new(),
                    });
                    flights.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            tracing::debug!(path = %path.display(), "joining in-flight extraction");
            let mut result = flight.result.lock();
            loop {
                if let Some(metadata) = result.as_ref() {
                    return metadata.clone();
                }
                flight.ready.wait(&mut result);
            }
        }

        let metadata = self.run_extraction(path, size, inspector, &key);

        if cacheable
            && !metadata.is_error()
            && let Some(cache) = &self.cache
        {
            if let Err(e) = cache.set_metadata(path, &metadata) {
                // Caching is optional; a full disk must not fail the inspection.
                tracing::warn!(path = %path.display(), "failed to cache metadata: {e}");
            } else {
                self.maybe_enforce_cache_limit(cache);
            }
        }

        {
            let mut result = flight.result.lock();
            *result = Some(metadata.clone());
            flight.ready.notify_all();
        }
        self.flights.lock().remove(&key);

        metadata
    }

    /// Submit the extraction to the worker pool and wait for its single-shot
    /// result. Every failure mode (work error, panic, executor shutdown)
    /// degrades into an error-shaped record.
    fn run_extraction(&self, path: &Path, size: u64, inspector: &Arc<dyn Inspector>, task_id: &str) -> FileMetadata {
        let work_path = path.to_path_buf();
        let work_inspector = Arc::clone(inspector);

        let outcome = self
            .executor
            .submit(task_id, move || work_inspector.extract(&work_path))
            .and_then(|handle| handle.wait());

        match outcome {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %path.display(), inspector = inspector.name(), "extraction failed: {e}");
                error_record(path, size, &e)
            }
        }
    }

    fn maybe_enforce_cache_limit(&self, cache: &CacheStore) {
        let count = self.write_counter.fetch_add(1, Ordering::Relaxed);
        if count % SIZE_ENFORCE_INTERVAL == 0 {
            cache.enforce_size_limit(self.config.cache_max_size_bytes());
        }
    }

    fn unsupported(&self, path: &Path, size: u64) -> Inspection {
        Inspection::Unsupported {
            extension: extension_of(path),
            type_label: sniff::type_label(path),
            size,
        }
    }

    /// Stop the executor and release every inspector.
    ///
    /// With `wait = true`, blocks until in-flight extractions finish.
    pub fn shutdown(&self, wait: bool) {
        self.executor.shutdown(wait);
        self.registry.cleanup_all();
    }
}

fn error_record(path: &Path, size: u64, error: &LupeError) -> FileMetadata {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    FileMetadata::failure(file_name, size, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn test_config(dir: &Path) -> EngineConfig {
        EngineConfig {
            cache_dir: Some(dir.join("cache")),
            ..Default::default()
        }
    }

    struct FailingInspector;

    impl Inspector for FailingInspector {
        fn name(&self) -> &str {
            "failing"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn domain(&self) -> &str {
            "Testing"
        }
        fn extensions(&self) -> &[&str] {
            &[".fail"]
        }
        fn extract(&self, _path: &Path) -> Result<FileMetadata> {
            Err(LupeError::parsing("synthetic failure"))
        }
    }

    #[test]
    fn test_inspect_not_found() {
        let dir = tempdir().unwrap();
        let engine = Engine::new(test_config(dir.path())).unwrap();
        let outcome = engine.inspect(dir.path().join("missing.txt"), false).unwrap();
        assert!(matches!(outcome, Inspection::NotFound));
        engine.shutdown(true);
    }

    #[test]
    fn test_inspect_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let engine = Engine::new(test_config(dir.path())).unwrap();
        let outcome = engine.inspect(dir.path(), false).unwrap();
        assert!(matches!(outcome, Inspection::NotFound));
        engine.shutdown(true);
    }

    #[test]
    fn test_inspect_unsupported_reports_label_and_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.qqq");
        std::fs::write(&path, b"0123456789").unwrap();

        let engine = Engine::new(test_config(dir.path())).unwrap();
        match engine.inspect(&path, false).unwrap() {
            Inspection::Unsupported {
                extension,
                type_label,
                size,
            } => {
                assert_eq!(extension.as_deref(), Some(".qqq"));
                assert_eq!(size, 10);
                assert!(!type_label.is_empty());
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
        engine.shutdown(true);
    }

    #[test]
    fn test_inspect_oversized_file_is_unsupported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, b"tiny but capped").unwrap();

        let config = EngineConfig {
            cache_dir: Some(dir.path().join("cache")),
            max_file_size_mb: 0,
            ..Default::default()
        };
        let engine = Engine::new(config).unwrap();
        assert!(matches!(
            engine.inspect(&path, false).unwrap(),
            Inspection::Unsupported { .. }
        ));
        engine.shutdown(true);
    }

    #[test]
    fn test_extraction_error_degrades_to_error_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.fail");
        std::fs::write(&path, b"payload").unwrap();

        let mut registry = InspectorRegistry::new();
        registry.register(Arc::new(FailingInspector)).unwrap();
        let engine = Engine::with_registry(registry, test_config(dir.path())).unwrap();

        match engine.inspect(&path, false).unwrap() {
            Inspection::Report { metadata, inspector } => {
                assert_eq!(inspector, "failing");
                assert!(metadata.is_error());
                assert!(metadata.error.as_deref().unwrap().contains("synthetic failure"));
                assert_eq!(metadata.file_size, 7);
            }
            other => panic!("expected Report, got {other:?}"),
        }

        // Error records are not cached; a retry extracts again.
        assert_eq!(engine.cache().unwrap().size(), 0);
        engine.shutdown(true);
    }

    #[test]
    fn test_cache_disabled_engine_has_no_store() {
        let dir = tempdir().unwrap();
        let config = EngineConfig {
            use_cache: false,
            cache_dir: Some(dir.path().join("cache")),
            ..Default::default()
        };
        let engine = Engine::new(config).unwrap();
        assert!(engine.cache().is_none());

        let path = dir.path().join("note.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"one line\n").unwrap();
        drop(f);

        assert!(matches!(
            engine.inspect(&path, false).unwrap(),
            Inspection::Report { .. }
        ));
        engine.shutdown(true);
    }
}
