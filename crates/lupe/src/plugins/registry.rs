//! Inspector registration and resolution.
//!
//! The registry is populated during a single discovery pass and read-only
//! afterwards; queries after discovery need no locking. Extension bindings
//! follow "last registered wins" with a warning logged on override, because
//! a later registration is assumed to be the more specific handler.

use crate::error::{LupeError, Result};
use crate::plugins::traits::{Inspector, extension_of};
use crate::types::InspectorInfo;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Constructor for a discovery candidate. A failing constructor is recorded
/// and skipped; it never aborts the discovery pass.
pub type InspectorCtor = fn() -> Result<Arc<dyn Inspector>>;

/// Registry of all loaded inspectors, indexed by extension and by domain.
pub struct InspectorRegistry {
    /// Registration order; used for fallback probing.
    inspectors: Vec<Arc<dyn Inspector>>,
    /// Extension (lowercase, with dot) to the inspector currently owning it.
    by_extension: HashMap<String, Arc<dyn Inspector>>,
    /// Domain name to inspectors in that domain, in insertion order.
    by_domain: HashMap<String, Vec<Arc<dyn Inspector>>>,
    /// Candidates that failed to construct, with their error messages.
    failed: Vec<(String, String)>,
}

fn validate_inspector_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LupeError::validation("inspector name cannot be empty"));
    }
    if name.contains(char::is_whitespace) {
        return Err(LupeError::validation(format!(
            "inspector name '{name}' cannot contain whitespace"
        )));
    }
    Ok(())
}

impl InspectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inspectors: Vec::new(),
            by_extension: HashMap::new(),
            by_domain: HashMap::new(),
            failed: Vec::new(),
        }
    }

    /// Create a registry populated with the builtin inspectors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.discover(crate::inspectors::builtin_candidates());
        registry
    }

    /// Run a discovery pass over candidate constructors.
    ///
    /// A candidate whose constructor (or registration) fails is recorded in
    /// [`failed`](Self::failed) with its error message and excluded;
    /// discovery continues for the remaining candidates.
    pub fn discover<I>(&mut self, candidates: I)
    where
        I: IntoIterator<Item = (&'static str, InspectorCtor)>,
    {
        for (label, ctor) in candidates {
            match ctor().and_then(|inspector| self.register(inspector)) {
                Ok(()) => {}
                Err(e) => {
                    tracing::error!(candidate = label, "failed to load inspector: {e}");
                    self.failed.push((label.to_string(), e.to_string()));
                }
            }
        }
        tracing::info!(
            loaded = self.inspectors.len(),
            failed = self.failed.len(),
            "inspector discovery complete"
        );
    }

    /// Register an inspector instance.
    ///
    /// Rejects empty, whitespace-containing, and already-claimed names. Each
    /// declared extension is bound to this inspector, overriding (and
    /// logging) any previous binding.
    pub fn register(&mut self, inspector: Arc<dyn Inspector>) -> Result<()> {
        let name = inspector.name().to_string();
        validate_inspector_name(&name)?;
        if self.inspectors.iter().any(|existing| existing.name() == name) {
            return Err(LupeError::validation(format!(
                "inspector '{name}' is already registered"
            )));
        }

        for ext in inspector.extensions() {
            let ext = ext.to_lowercase();
            if let Some(previous) = self.by_extension.get(&ext) {
                tracing::warn!(
                    extension = %ext,
                    previous = previous.name(),
                    replacement = %name,
                    "extension already registered, overriding"
                );
            }
            self.by_extension.insert(ext, Arc::clone(&inspector));
        }

        self.by_domain
            .entry(inspector.domain().to_string())
            .or_default()
            .push(Arc::clone(&inspector));

        tracing::info!(inspector = %name, version = inspector.version(), "registered inspector");
        self.inspectors.push(inspector);
        Ok(())
    }

    /// Resolve the inspector for a file.
    ///
    /// Tier 1: the inspector bound to the lowercase extension, if it accepts
    /// the file (`can_handle` = probe + size bound). Tier 2: probe every
    /// inspector in registration order; the extension is an unreliable
    /// signal, and a cheap bit-signature probe disambiguates wrong, missing,
    /// or shared extensions. Returns `None` when nothing matches.
    ///
    /// Deterministic: the same content, extension, and size always resolve
    /// to the same inspector.
    pub fn resolve(&self, path: &Path) -> Option<Arc<dyn Inspector>> {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        if let Some(ext) = extension_of(path)
            && let Some(candidate) = self.by_extension.get(&ext)
            && candidate.can_handle(path, size)
        {
            return Some(Arc::clone(candidate));
        }

        self.inspectors
            .iter()
            .find(|inspector| inspector.can_handle(path, size))
            .cloned()
    }

    /// Inspectors in a domain, in registration order.
    pub fn inspectors_for_domain(&self, domain: &str) -> &[Arc<dyn Inspector>] {
        self.by_domain.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sorted list of all domain names.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.by_domain.keys().cloned().collect();
        domains.sort();
        domains
    }

    /// Sorted list of all bound extensions.
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.by_extension.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    /// Read-only descriptors for every registered inspector.
    pub fn inspector_info(&self) -> Vec<InspectorInfo> {
        self.inspectors
            .iter()
            .map(|inspector| InspectorInfo {
                name: inspector.name().to_string(),
                version: inspector.version().to_string(),
                domain: inspector.domain().to_string(),
                extensions: inspector.extensions().iter().map(|e| e.to_string()).collect(),
                description: inspector.description().to_string(),
                author: inspector.author().to_string(),
                supports_caching: inspector.supports_caching(),
                supports_streaming: inspector.supports_streaming(),
                max_file_size: inspector.max_file_size(),
            })
            .collect()
    }

    /// Discovery candidates that failed to load, with error messages.
    pub fn failed(&self) -> &[(String, String)] {
        &self.failed
    }

    pub fn len(&self) -> usize {
        self.inspectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inspectors.is_empty()
    }

    /// Release every inspector's resources. Individual cleanups are
    /// infallible and idempotent, so this is safe to call more than once.
    pub fn cleanup_all(&self) {
        for inspector in &self.inspectors {
            inspector.cleanup();
        }
        tracing::info!(count = self.inspectors.len(), "inspectors cleaned up");
    }
}

impl Default for InspectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
