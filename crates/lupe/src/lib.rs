//! Lupe - Pluggable File Inspection Engine
//!
//! Lupe inspects arbitrary files by dispatching to capability modules
//! ("inspectors"), caching extracted metadata in a persistent
//! content-addressed store, and running extraction work on a bounded
//! background pool so callers never block on expensive parsing.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lupe::{Engine, EngineConfig, Inspection};
//!
//! # fn main() -> lupe::Result<()> {
//! let engine = Engine::new(EngineConfig::default())?;
//! if let Inspection::Report { metadata, inspector } = engine.inspect("survey.las", false)? {
//!     println!("[{inspector}] {}", metadata.summary);
//! }
//! engine.shutdown(true);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Plugins** (`plugins`): the `Inspector` trait and the registry that
//!   resolves files to inspectors (extension dispatch with a format-sniff
//!   fallback, last registration winning shared extensions)
//! - **Cache** (`cache`): a flat per-category blob store keyed by a
//!   fingerprint of path and modification time; corrupt entries degrade to
//!   misses, eviction is oldest-written-first
//! - **Executor** (`executor`): a fixed worker pool with id-tracked tasks,
//!   pre-start cancellation, and exactly-once result delivery
//! - **Core** (`core`): the engine that wires the three together behind a
//!   single `inspect` call with single-flight extraction, plus config
//!   loading and type sniffing
//! - **Inspectors** (`inspectors`): builtin text, image, tabular, and
//!   point-cloud modules

#![deny(unsafe_code)]

pub mod cache;
pub mod core;
pub mod error;
pub mod executor;
pub mod inspectors;
pub mod plugins;
pub mod types;

pub use error::{LupeError, Result};
pub use types::{FileMetadata, Inspection, InspectorInfo};

pub use cache::{CacheCategory, CacheStore, fingerprint};
pub use core::config::EngineConfig;
pub use core::engine::Engine;
pub use executor::{DEFAULT_MAX_WORKERS, TaskExecutor, TaskHandle};
pub use plugins::registry::{InspectorCtor, InspectorRegistry};
pub use plugins::traits::Inspector;
