use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured metadata record produced by an inspector for a single file.
///
/// Every extraction yields at least a display name, the byte size, a type
/// label, and a one-line human-readable summary. Inspector-specific fields
/// live in the flattened `extra` map so the record serializes as a single
/// flat JSON object. A failed extraction is represented by the same shape
/// with the `error` field populated, so downstream display degrades into a
/// partial result instead of aborting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub summary: String,

    /// Populated when extraction failed; the rest of the record stays usable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Inspector-specific fields, merged at the root level on serialization.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FileMetadata {
    /// Create a metadata record with the four required fields.
    pub fn new(
        file_name: impl Into<String>,
        file_size: u64,
        file_type: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            file_type: file_type.into(),
            summary: summary.into(),
            error: None,
            extra: BTreeMap::new(),
        }
    }

    /// Create an error-shaped record for a failed extraction.
    pub fn failure(file_name: impl Into<String>, file_size: u64, error: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            file_type: "Unknown".to_string(),
            summary: "extraction failed".to_string(),
            error: Some(error.into()),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an inspector-specific field (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Whether this record represents a failed extraction.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Read-only descriptor of a registered inspector.
#[derive(Debug, Clone, Serialize)]
pub struct InspectorInfo {
    pub name: String,
    pub version: String,
    pub domain: String,
    pub extensions: Vec<String>,
    pub description: String,
    pub author: String,
    pub supports_caching: bool,
    pub supports_streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
}

/// Outcome of [`Engine::inspect`](crate::Engine::inspect).
///
/// `Unsupported` carries enough context (extension, a MIME-ish type label,
/// the byte size) for a caller to render a fallback message; the core itself
/// renders nothing.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Inspection {
    /// A resolved inspector produced a metadata record.
    Report {
        metadata: FileMetadata,
        inspector: String,
    },
    /// No registered inspector accepted the file.
    Unsupported {
        #[serde(skip_serializing_if = "Option::is_none")]
        extension: Option<String>,
        type_label: String,
        size: u64,
    },
    /// The path does not exist or is not a regular file.
    NotFound,
}
