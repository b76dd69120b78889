//! modcat - module catalog and dynamic invocation
//!
//! Scans modules placed on disk into normalized metadata, keeps that
//! metadata in a thread-safe catalog, and invokes members by name against
//! modules registered in the running process.
//!
//! ## Flow
//!
//! 1. A collaborator places a module on disk
//! 2. `Scanner::scan` produces a `ModuleRecord`
//! 3. `Catalog::add_or_update` stores it
//! 4. `Engine::invoke_by_name` resolves the name and calls the member
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use modcat::config::EngineConfig;
//! use modcat::module::{Catalog, Engine, HostModules, ModuleHandle, ModuleRecord, TypeHandle, Value};
//!
//! let hosts = Arc::new(HostModules::new());
//! let module = ModuleHandle::builder("Sample")
//!     .with_type(
//!         TypeHandle::builder("Sample", "Greeter")
//!             .static_method("Greet", &[("name", "string")], "string", |args| {
//!                 Ok(Value::from(format!("Hello, {}!", args[0].as_str().unwrap_or_default())))
//!             })
//!             .build(),
//!     )
//!     .build();
//!
//! // Normally the scanner builds this record from the module's artifacts
//! let manifest = module.describe();
//! hosts.register(module);
//! let record = modcat::module::registry::record_from_manifest("Sample", "1.0.0", "/modules/sample", &manifest);
//!
//! let catalog = Arc::new(Catalog::new());
//! catalog.add_or_update(record).unwrap();
//!
//! let engine = Engine::new(catalog, hosts, EngineConfig::default());
//! let greeting = engine.invoke_by_name("Greet", &[Value::from("world")], None).unwrap();
//! assert_eq!(greeting.as_str(), Some("Hello, world!"));
//! ```

pub mod config;
pub mod module;
pub mod utils;

pub use config::CatalogConfig;
pub use module::{Catalog, Engine, HostModules, ModuleError, ModuleResult, Scanner, Value};
