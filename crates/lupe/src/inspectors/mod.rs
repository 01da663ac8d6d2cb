//! Builtin inspectors.
//!
//! Each inspector is a self-contained capability module registered through
//! the same `register` entry point external inspectors would use. The
//! candidate list below is the explicit, registration-time-built variant
//! list; there is no runtime module scanning.

pub mod image;
pub mod point_cloud;
pub mod tabular;
pub mod text;

pub use image::ImageInspector;
pub use point_cloud::PointCloudInspector;
pub use tabular::TabularInspector;
pub use text::TextInspector;

use crate::plugins::registry::InspectorCtor;
use crate::plugins::traits::Inspector;
use std::sync::Arc;

/// Discovery candidates consumed by `InspectorRegistry::with_builtins`.
pub fn builtin_candidates() -> Vec<(&'static str, InspectorCtor)> {
    vec![
        ("text", || Ok(Arc::new(TextInspector::new()) as Arc<dyn Inspector>)),
        ("image", || Ok(Arc::new(ImageInspector::new()) as Arc<dyn Inspector>)),
        ("tabular", || Ok(Arc::new(TabularInspector::new()) as Arc<dyn Inspector>)),
        ("point-cloud", || {
            Ok(Arc::new(PointCloudInspector::new()) as Arc<dyn Inspector>)
        }),
    ]
}
