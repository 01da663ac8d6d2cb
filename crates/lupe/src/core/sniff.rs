//! File-type sniffing for unsupported-file reporting.
//!
//! When no inspector accepts a file, the engine still reports a MIME-ish
//! type label so callers can render a useful fallback message. Detection
//! uses the extension table first, then magic bytes, then `mime_guess`.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Label reported when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Bytes read from the head of a file for magic-number sniffing.
const SNIFF_LEN: usize = 16;

static EXT_TO_LABEL: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("txt", "text/plain");
    m.insert("log", "text/plain");
    m.insert("ini", "text/plain");
    m.insert("cfg", "text/plain");
    m.insert("md", "text/markdown");
    m.insert("rst", "text/x-rst");
    m.insert("html", "text/html");
    m.insert("htm", "text/html");

    m.insert("csv", "text/csv");
    m.insert("tsv", "text/tab-separated-values");
    m.insert("json", "application/json");
    m.insert("yaml", "application/x-yaml");
    m.insert("yml", "application/x-yaml");
    m.insert("toml", "application/toml");
    m.insert("xml", "application/xml");

    m.insert("bmp", "image/bmp");
    m.insert("gif", "image/gif");
    m.insert("jpg", "image/jpeg");
    m.insert("jpeg", "image/jpeg");
    m.insert("png", "image/png");
    m.insert("tiff", "image/tiff");
    m.insert("tif", "image/tiff");
    m.insert("webp", "image/webp");

    m.insert("las", "application/vnd.las");
    m.insert("laz", "application/vnd.laszip");

    m.insert("pdf", "application/pdf");
    m.insert("zip", "application/zip");
    m.insert("gz", "application/gzip");
    m.insert("tar", "application/x-tar");
    m.insert("7z", "application/x-7z-compressed");

    m
});

/// Magic-number table checked against the first bytes of a file.
const MAGIC_SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"II*\0", "image/tiff"),
    (b"MM\0*", "image/tiff"),
    (b"BM", "image/bmp"),
    (b"LASF", "application/vnd.las"),
    (b"%PDF", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
];

/// Match the head of a file against the magic-number table.
pub fn sniff_bytes(head: &[u8]) -> Option<&'static str> {
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    MAGIC_SIGNATURES
        .iter()
        .find(|(magic, _)| head.starts_with(magic))
        .map(|(_, label)| *label)
}

/// Best-effort MIME-ish label for a file.
///
/// Extension table first, then a small head read against the magic table,
/// then `mime_guess`, then `application/octet-stream`.
pub fn type_label(path: &Path) -> String {
    if let Some(ext) = path.extension().and_then(|e| e.to_str())
        && let Some(label) = EXT_TO_LABEL.get(ext.to_lowercase().as_str())
    {
        return (*label).to_string();
    }

    if let Ok(mut file) = File::open(path) {
        let mut head = [0u8; SNIFF_LEN];
        if let Ok(n) = file.read(&mut head)
            && let Some(label) = sniff_bytes(&head[..n])
        {
            return label.to_string();
        }
    }

    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
