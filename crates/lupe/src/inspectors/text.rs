//! Plain-text inspector.

use crate::Result;
use crate::plugins::traits::Inspector;
use crate::types::FileMetadata;
use std::fs;
use std::path::Path;

/// Lines included in the metadata preview field.
pub const PREVIEW_LINES: usize = 50;

const EXTENSIONS: &[&str] = &[".txt", ".log", ".md", ".ini", ".cfg", ".rst"];

const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Inspector for plain and lightly structured text files.
///
/// Reads the whole file, falling back to lossy decoding for non-UTF-8
/// content, and reports line/word/character counts plus a bounded preview.
#[derive(Debug, Default)]
pub struct TextInspector;

impl TextInspector {
    pub fn new() -> Self {
        Self
    }
}

impl Inspector for TextInspector {
    fn name(&self) -> &str {
        "text"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn domain(&self) -> &str {
        "Documents"
    }

    fn extensions(&self) -> &[&str] {
        EXTENSIONS
    }

    fn description(&self) -> &str {
        "Line, word, and character statistics with a bounded preview"
    }

    fn author(&self) -> &str {
        "lupe developers"
    }

    fn max_file_size(&self) -> Option<u64> {
        Some(MAX_FILE_SIZE)
    }

    fn extract(&self, path: &Path) -> Result<FileMetadata> {
        let raw = fs::read(path)?;
        let file_size = raw.len() as u64;

        let (content, encoding) = match String::from_utf8(raw) {
            Ok(content) => (content, "utf-8"),
            Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), "utf-8 (lossy)"),
        };

        let line_count = content.lines().count();
        let word_count = content.split_whitespace().count();
        let character_count = content.chars().count();
        let preview: String = content
            .lines()
            .take(PREVIEW_LINES)
            .collect::<Vec<_>>()
            .join("\n");

        let file_name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
        Ok(
            FileMetadata::new(file_name, file_size, "Text File", format!("{line_count} lines, {word_count} words"))
                .with("encoding", encoding)
                .with("line_count", line_count as u64)
                .with("word_count", word_count as u64)
                .with("character_count", character_count as u64)
                .with("preview", preview),
        )
    }
}
