//! Delimited-table inspector (CSV/TSV).

use crate::Result;
use crate::plugins::traits::{Inspector, extension_of};
use crate::types::FileMetadata;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Data rows scanned per file; anything beyond is reported as truncated.
pub const SCAN_ROW_LIMIT: usize = 1000;

const EXTENSIONS: &[&str] = &[".csv", ".tsv"];

const MAX_FILE_SIZE: u64 = 200 * 1024 * 1024;

/// Inspector for delimited tabular data.
///
/// Scans up to [`SCAN_ROW_LIMIT`] data rows incrementally (the file is never
/// read whole), reporting the column list and min/max/mean for columns whose
/// every non-empty value parses as a number.
#[derive(Debug, Default)]
pub struct TabularInspector;

impl TabularInspector {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
struct ColumnStats {
    count: usize,
    min: f64,
    max: f64,
    sum: f64,
    numeric: bool,
}

impl ColumnStats {
    fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            numeric: true,
        }
    }

    fn record(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        match value.parse::<f64>() {
            Ok(number) if number.is_finite() => {
                self.count += 1;
                self.min = self.min.min(number);
                self.max = self.max.max(number);
                self.sum += number;
            }
            _ => self.numeric = false,
        }
    }
}

impl Inspector for TabularInspector {
    fn name(&self) -> &str {
        "tabular"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn domain(&self) -> &str {
        "Data"
    }

    fn extensions(&self) -> &[&str] {
        EXTENSIONS
    }

    fn description(&self) -> &str {
        "Column structure and numeric statistics for delimited tables"
    }

    fn author(&self) -> &str {
        "lupe developers"
    }

    fn max_file_size(&self) -> Option<u64> {
        Some(MAX_FILE_SIZE)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn extract(&self, path: &Path) -> Result<FileMetadata> {
        let file_size = std::fs::metadata(path)?.len();
        let file_name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let extension = extension_of(path).unwrap_or_default();
        let delimiter = if extension == ".tsv" { b'\t' } else { b',' };
        let label = if extension == ".tsv" { "TSV" } else { "CSV" };

        let mut reader = BufReader::new(File::open(path)?);
        let mut line = Vec::new();

        let columns: Vec<String> = match read_record(&mut reader, &mut line)? {
            Some(record) => split_fields(&record, delimiter),
            None => Vec::new(),
        };

        let mut stats: Vec<ColumnStats> = columns.iter().map(|_| ColumnStats::new()).collect();
        let mut row_count = 0usize;
        let mut truncated = false;

        while let Some(record) = read_record(&mut reader, &mut line)? {
            if row_count >= SCAN_ROW_LIMIT {
                truncated = true;
                break;
            }
            row_count += 1;
            for (index, value) in split_fields(&record, delimiter).iter().enumerate() {
                if let Some(column) = stats.get_mut(index) {
                    column.record(value);
                }
            }
        }

        let mut numeric_stats = BTreeMap::new();
        for (column, stat) in columns.iter().zip(&stats) {
            if stat.numeric && stat.count > 0 {
                numeric_stats.insert(
                    column.clone(),
                    json!({
                        "min": stat.min,
                        "max": stat.max,
                        "mean": stat.sum / stat.count as f64,
                    }),
                );
            }
        }

        Ok(FileMetadata::new(
            file_name,
            file_size,
            format!("Data Table ({label})"),
            format!("{row_count} rows x {} columns", columns.len()),
        )
        .with("row_count", row_count as u64)
        .with("column_count", columns.len() as u64)
        .with("columns", columns)
        .with("stats", serde_json::Value::Object(numeric_stats.into_iter().collect()))
        .with("truncated", truncated))
    }
}

/// Read one line as lossily-decoded text; `None` at EOF.
fn read_record(reader: &mut impl BufRead, buf: &mut Vec<u8>) -> Result<Option<String>> {
    buf.clear();
    let n = reader.read_until(b'\n', buf)?;
    if n == 0 {
        return Ok(None);
    }
    let mut record = String::from_utf8_lossy(buf).into_owned();
    while record.ends_with('\n') || record.ends_with('\r') {
        record.pop();
    }
    Ok(Some(record))
}

fn split_fields(record: &str, delimiter: u8) -> Vec<String> {
    record
        .split(delimiter as char)
        .map(|field| field.trim().to_string())
        .collect()
}
