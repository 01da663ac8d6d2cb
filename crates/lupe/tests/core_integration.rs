//! Integration tests for end-to-end inspection.
//!
//! These tests verify the full pipeline: registry resolution, cache reads
//! and writes, background extraction, and the orchestrator's outcome
//! reporting, using the builtin inspectors against real files on disk.

use lupe::{Engine, EngineConfig, FileMetadata, Inspection, Inspector, InspectorRegistry, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn engine_config(dir: &Path) -> EngineConfig {
    EngineConfig {
        cache_dir: Some(dir.join("cache")),
        ..Default::default()
    }
}

fn write_text(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn expect_report(outcome: Inspection) -> (FileMetadata, String) {
    match outcome {
        Inspection::Report { metadata, inspector } => (metadata, inspector),
        other => panic!("expected Report, got {other:?}"),
    }
}

#[test]
fn test_inspect_text_file_end_to_end() {
    let dir = tempdir().unwrap();
    let path = write_text(dir.path(), "notes.txt", "alpha beta\ngamma\n");

    let engine = Engine::new(engine_config(dir.path())).unwrap();
    let (metadata, inspector) = expect_report(engine.inspect(&path, false).unwrap());

    assert_eq!(inspector, "text");
    assert_eq!(metadata.file_name, "notes.txt");
    assert_eq!(metadata.summary, "2 lines, 3 words");
    assert!(!metadata.is_error());
    engine.shutdown(true);
}

#[test]
fn test_second_inspect_is_served_from_cache() {
    let dir = tempdir().unwrap();
    let path = write_text(dir.path(), "notes.txt", "cached content\n");

    let engine = Engine::new(engine_config(dir.path())).unwrap();
    let (first, _) = expect_report(engine.inspect(&path, false).unwrap());

    // One metadata blob should now exist on disk.
    let metadata_dir = engine.cache().unwrap().root().join("metadata");
    assert_eq!(fs::read_dir(&metadata_dir).unwrap().count(), 1);

    let (second, _) = expect_report(engine.inspect(&path, false).unwrap());
    assert_eq!(first, second);
    // Still exactly one blob; the hit wrote nothing new.
    assert_eq!(fs::read_dir(&metadata_dir).unwrap().count(), 1);
    engine.shutdown(true);
}

#[test]
fn test_mtime_change_invalidates_cached_metadata() {
    let dir = tempdir().unwrap();
    let path = write_text(dir.path(), "notes.txt", "one line\n");

    let engine = Engine::new(engine_config(dir.path())).unwrap();
    let (first, _) = expect_report(engine.inspect(&path, false).unwrap());
    assert_eq!(first.summary, "1 lines, 2 words");

    // Rewrite the file and force a distinct mtime.
    fs::write(&path, "first\nsecond\nthird\n").unwrap();
    let later = SystemTime::now() + Duration::from_secs(120);
    filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(later)).unwrap();

    let (second, _) = expect_report(engine.inspect(&path, false).unwrap());
    assert_eq!(second.summary, "3 lines, 3 words");
    engine.shutdown(true);
}

#[test]
fn test_force_refresh_bypasses_cache_read() {
    let dir = tempdir().unwrap();
    let path = write_text(dir.path(), "notes.txt", "original\n");

    let engine = Engine::new(engine_config(dir.path())).unwrap();
    expect_report(engine.inspect(&path, false).unwrap());

    // Rewrite the content while keeping the mtime fixed, so the stale cache
    // entry still matches the fingerprint.
    let stat_mtime = filetime::FileTime::from_last_modification_time(&fs::metadata(&path).unwrap());
    fs::write(&path, "rewritten longer content\n").unwrap();
    filetime::set_file_mtime(&path, stat_mtime).unwrap();

    let (stale, _) = expect_report(engine.inspect(&path, false).unwrap());
    assert_eq!(stale.summary, "1 lines, 1 words");

    let (fresh, _) = expect_report(engine.inspect(&path, true).unwrap());
    assert_eq!(fresh.summary, "1 lines, 3 words");
    engine.shutdown(true);
}

#[test]
fn test_unsupported_file_reports_fallback_details() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("firmware.qqq");
    fs::write(&path, b"\x00\x01\x02\x03").unwrap();

    let engine = Engine::new(engine_config(dir.path())).unwrap();
    match engine.inspect(&path, false).unwrap() {
        Inspection::Unsupported {
            extension,
            type_label,
            size,
        } => {
            assert_eq!(extension.as_deref(), Some(".qqq"));
            assert_eq!(size, 4);
            assert_eq!(type_label, "application/octet-stream");
        }
        other => panic!("expected Unsupported, got {other:?}"),
    }
    engine.shutdown(true);
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = tempdir().unwrap();
    let engine = Engine::new(engine_config(dir.path())).unwrap();
    assert!(matches!(
        engine.inspect(dir.path().join("gone.txt"), false).unwrap(),
        Inspection::NotFound
    ));
    engine.shutdown(true);
}

#[test]
fn test_extension_misdirection_falls_back_to_probe() {
    let dir = tempdir().unwrap();
    // The extension-bound inspector wins when it accepts the file.
    let path = write_text(dir.path(), "notes.txt", "plain text after all\n");

    let engine = Engine::new(engine_config(dir.path())).unwrap();
    let (_, inspector) = expect_report(engine.inspect(&path, false).unwrap());
    assert_eq!(inspector, "text");

    // And a LAS file with no extension resolves purely via the magic probe.
    let mut las = vec![0u8; 227];
    las[..4].copy_from_slice(b"LASF");
    las[24] = 1;
    las[25] = 2;
    las[105] = 20;
    let bare = dir.path().join("scan_no_extension");
    fs::write(&bare, &las).unwrap();

    let (metadata, inspector) = expect_report(engine.inspect(&bare, false).unwrap());
    assert_eq!(inspector, "point-cloud");
    assert_eq!(metadata.file_type, "LAS Point Cloud");
    engine.shutdown(true);
}

struct CountingInspector {
    extractions: Arc<AtomicUsize>,
}

impl Inspector for CountingInspector {
    fn name(&self) -> &str {
        "counting"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn domain(&self) -> &str {
        "Testing"
    }
    fn extensions(&self) -> &[&str] {
        &[".cnt"]
    }
    fn extract(&self, path: &Path) -> Result<FileMetadata> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        // Long enough that concurrent callers overlap the flight.
        std::thread::sleep(Duration::from_millis(100));
        Ok(FileMetadata::new(
            path.file_name().unwrap().to_string_lossy(),
            0,
            "Counted",
            "counted",
        ))
    }
}

#[test]
fn test_single_flight_extraction_under_concurrent_inspects() {
    let dir = tempdir().unwrap();
    let path = write_text(dir.path(), "shared.cnt", "payload");

    let extractions = Arc::new(AtomicUsize::new(0));
    let mut registry = InspectorRegistry::new();
    registry
        .register(Arc::new(CountingInspector {
            extractions: Arc::clone(&extractions),
        }))
        .unwrap();

    let engine = Arc::new(Engine::with_registry(registry, engine_config(dir.path())).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let path = path.clone();
            std::thread::spawn(move || expect_report(engine.inspect(&path, false).unwrap()).0)
        })
        .collect();

    let results: Vec<FileMetadata> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(
        extractions.load(Ordering::SeqCst),
        1,
        "concurrent inspects of one fingerprint must share a single extraction"
    );
    for metadata in &results {
        assert_eq!(metadata, &results[0]);
    }
    engine.shutdown(true);
}

#[test]
fn test_tabular_and_image_inspectors_through_engine() {
    let dir = tempdir().unwrap();
    let engine = Engine::new(engine_config(dir.path())).unwrap();

    let csv = write_text(dir.path(), "table.csv", "a,b\n1,2\n3,4\n");
    let (metadata, inspector) = expect_report(engine.inspect(&csv, false).unwrap());
    assert_eq!(inspector, "tabular");
    assert_eq!(metadata.summary, "2 rows x 2 columns");

    // A corrupt image extracts into an error record, not a failure.
    let broken = dir.path().join("broken.png");
    fs::write(&broken, b"not really a png").unwrap();
    let (metadata, inspector) = expect_report(engine.inspect(&broken, false).unwrap());
    assert_eq!(inspector, "image");
    assert!(metadata.is_error());
    engine.shutdown(true);
}

#[test]
fn test_registry_introspection_through_engine() {
    let dir = tempdir().unwrap();
    let engine = Engine::new(engine_config(dir.path())).unwrap();

    let registry = engine.registry();
    assert_eq!(registry.domains(), vec!["Data", "Documents", "Geospatial", "Images"]);
    assert!(registry.extensions().contains(&".las".to_string()));

    let info = registry.inspector_info();
    assert_eq!(info.len(), 4);
    assert!(info.iter().any(|i| i.name == "point-cloud"));
    engine.shutdown(true);
}

#[test]
fn test_shutdown_then_inspect_degrades_to_error_record() {
    let dir = tempdir().unwrap();
    let path = write_text(dir.path(), "late.txt", "content\n");

    let engine = Engine::new(engine_config(dir.path())).unwrap();
    engine.shutdown(true);

    // The executor rejects new work; the engine reports it as a failed
    // extraction rather than crashing or hanging.
    let (metadata, _) = expect_report(engine.inspect(&path, false).unwrap());
    assert!(metadata.is_error());
}
