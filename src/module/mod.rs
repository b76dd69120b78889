//! Module system for modcat
//!
//! Catalogs the callable surface of dynamically loaded modules and invokes
//! members by name.
//!
//! ## Architecture
//!
//! - **Scanner**: introspects a module directory into a `ModuleRecord`
//! - **Catalog**: concurrency-safe store of records with multi-index queries
//! - **Host modules**: in-process registrations that execute invoked members
//! - **Engine**: name -> member -> handle -> call, with actionable errors

pub mod api;
pub mod engine;
pub mod loader;
pub mod metadata;
pub mod registry;
pub mod suggest;
pub mod traits;
pub mod value;

pub use api::{DiagnosticEvent, EventKind, EventManager};
pub use engine::Engine;
pub use loader::{HostModules, ModuleHandle, TypeHandle};
pub use metadata::{MemberRecord, ModuleRecord, ParameterRecord, TypeRecord};
pub use registry::{ArtifactManifest, Catalog, Scanner};
pub use traits::{ArtifactIntrospector, KnownModule, ModuleError, ModuleResult};
pub use value::{Instance, PendingValue, Value};
