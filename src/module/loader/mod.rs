//! In-process module loading
//!
//! Host registrations that stand in for runtime reflection, and the cache
//! of resolved module handles.

pub mod cache;
pub mod host;

pub use cache::HandleCache;
pub use host::{
    normalize_module_name, Callable, ConstructorHandle, HostModules, MethodHandle, ModuleHandle,
    TypeHandle,
};
