//! Module handle cache
//!
//! Maps a catalog module id to the resolved in-process handle. Population is
//! first-wins: when two callers resolve the same id concurrently, the later
//! insert is discarded and both use the handle already stored.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::module::loader::host::ModuleHandle;
use crate::utils::recover_lock;

#[derive(Debug, Default)]
pub struct HandleCache {
    handles: RwLock<HashMap<String, Arc<ModuleHandle>>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, module_id: &str) -> Option<Arc<ModuleHandle>> {
        recover_lock(self.handles.read()).get(module_id).cloned()
    }

    /// Store `handle` unless one is already cached
    ///
    /// Returns the cached handle and whether this call stored it.
    pub fn insert_if_absent(&self, module_id: &str, handle: Arc<ModuleHandle>) -> (Arc<ModuleHandle>, bool) {
        match recover_lock(self.handles.write()).entry(module_id.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => (Arc::clone(entry.insert(handle)), true),
        }
    }

    /// Drop the cached handle of `module_id`
    ///
    /// Calls already holding the handle keep it alive until they finish.
    pub fn evict(&self, module_id: &str) -> bool {
        let evicted = recover_lock(self.handles.write()).remove(module_id).is_some();
        if evicted {
            debug!("Evicted cached handle for module {}", module_id);
        }
        evicted
    }

    /// Drop every cached handle; returns how many were dropped
    pub fn clear(&self) -> usize {
        let mut handles = recover_lock(self.handles.write());
        let dropped = handles.len();
        handles.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        recover_lock(self.handles.read()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
