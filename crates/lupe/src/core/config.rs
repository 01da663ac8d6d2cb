//! Engine configuration loading.
//!
//! Configuration can be created programmatically, loaded from a TOML file,
//! or discovered by walking parent directories for a `lupe.toml`.

use crate::error::{LupeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name searched for by [`EngineConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "lupe.toml";

/// Engine configuration.
///
/// # Example
///
/// ```rust
/// use lupe::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert!(config.use_cache);
/// assert_eq!(config.max_workers, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Enable the persistent metadata cache.
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Cache root directory. `None` resolves to the user cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum cache size in megabytes.
    #[serde(default = "default_cache_max_size_mb")]
    pub cache_max_size_mb: u64,

    /// Worker threads in the extraction pool.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Files larger than this are reported as unsupported outright.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_max_size_mb() -> u64 {
    500
}

fn default_max_workers() -> usize {
    crate::executor::DEFAULT_MAX_WORKERS
}

fn default_max_file_size_mb() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_dir: None,
            cache_max_size_mb: default_cache_max_size_mb(),
            max_workers: default_max_workers(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            LupeError::validation(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| LupeError::validation(format!("invalid TOML in {}: {e}", path.as_ref().display())))
    }

    /// Discover a `lupe.toml` in the current directory or any parent.
    ///
    /// Returns `Ok(None)` when no config file is found.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(LupeError::Io)?;

        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// The cache root, falling back to the user cache directory.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("lupe"))
    }

    pub fn cache_max_size_bytes(&self) -> u64 {
        self.cache_max_size_mb * 1024 * 1024
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}
