//! Inspector plugin system.
//!
//! An inspector is a capability module bound to a domain and a set of file
//! extensions. The registry indexes inspectors by extension and by domain
//! and resolves "which inspector handles this file" queries with a two-tier
//! strategy: extension dispatch first, format-sniff probing as the fallback.

pub mod registry;
pub mod traits;

pub use registry::{InspectorCtor, InspectorRegistry};
pub use traits::Inspector;
