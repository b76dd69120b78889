//! Module registry
//!
//! Artifact manifests, platform target selection, scanning and the catalog
//! of scanned modules.

pub mod catalog;
pub mod discovery;
pub mod manifest;
pub mod targets;

pub use catalog::Catalog;
pub use discovery::{record_from_manifest, Scanner};
pub use manifest::{ArtifactManifest, ManifestIntrospector};
pub use targets::{HostRuntime, PlatformTarget};
