//! Module catalog
//!
//! Thread-safe store of scanned module records keyed by module id. Writes
//! swap whole records; reads hand out `Arc` snapshots, so a reader never
//! observes a half-applied update.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::module::api::events::{DiagnosticEvent, EventManager};
use crate::module::metadata::{MemberRecord, ModuleRecord, TypeRecord};
use crate::module::traits::{KnownModule, ModuleError, ModuleResult};
use crate::utils::{ensure_not_blank, recover_lock};

/// Catalog of scanned modules
#[derive(Debug, Default)]
pub struct Catalog {
    records: RwLock<BTreeMap<String, Arc<ModuleRecord>>>,
    events: EventManager,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish catalog writes through `events`
    pub fn with_events(mut self, events: EventManager) -> Self {
        self.events = events;
        self
    }

    /// Insert `record`, replacing any record with the same id as a whole
    pub fn add_or_update(&self, record: ModuleRecord) -> ModuleResult<()> {
        ensure_key(&record.id, "module id")?;
        ensure_key(&record.version, "module version")?;
        validate_ownership(&record)?;

        let id = record.id.clone();
        let version = record.version.clone();
        let previous = self.write().insert(id.clone(), Arc::new(record));

        match previous {
            Some(previous) => {
                info!(
                    "Replaced module {} {} with version {}",
                    id, previous.version, version
                );
                self.events.publish(DiagnosticEvent::RecordReplaced {
                    module_id: id,
                    previous_version: previous.version.clone(),
                    version,
                });
            }
            None => {
                info!("Added module {} {}", id, version);
                self.events.publish(DiagnosticEvent::RecordAdded {
                    module_id: id,
                    version,
                });
            }
        }
        Ok(())
    }

    /// Record stored under `id`
    pub fn get_by_id(&self, id: &str) -> ModuleResult<Option<Arc<ModuleRecord>>> {
        let id = ensure_not_blank(id, "module id")?;
        Ok(self.read().get(id).cloned())
    }

    /// Record matching both `id` and `version`, compared case-insensitively
    pub fn get_by_id_and_version(&self, id: &str, version: &str) -> ModuleResult<Option<Arc<ModuleRecord>>> {
        let id = ensure_not_blank(id, "module id")?;
        let version = ensure_not_blank(version, "module version")?;
        Ok(self
            .read()
            .values()
            .find(|record| {
                record.id.eq_ignore_ascii_case(id) && record.version.eq_ignore_ascii_case(version)
            })
            .cloned())
    }

    /// Snapshot of every record in id order
    pub fn get_all(&self) -> ModuleResult<Vec<Arc<ModuleRecord>>> {
        Ok(self.snapshot())
    }

    /// Members named `name` (case-insensitive), in catalog order
    ///
    /// The iterator walks a snapshot taken at call time; later writes do
    /// not affect it.
    pub fn find_members_by_name(&self, name: &str) -> ModuleResult<impl Iterator<Item = MemberRecord>> {
        let name = ensure_not_blank(name, "member name")?.to_string();
        Ok(self.snapshot().into_iter().flat_map(move |record| {
            let name = name.clone();
            (0..record.members.len()).filter_map(move |i| {
                let member = &record.members[i];
                member
                    .name
                    .eq_ignore_ascii_case(&name)
                    .then(|| member.clone())
            })
        }))
    }

    /// Members declared by the type `type_full_name` (case-insensitive)
    pub fn find_members_by_owner_type(&self, type_full_name: &str) -> ModuleResult<Vec<MemberRecord>> {
        let type_full_name = ensure_not_blank(type_full_name, "type name")?;
        Ok(self
            .read()
            .values()
            .flat_map(|record| record.members_of(type_full_name).cloned())
            .collect())
    }

    /// Types whose simple or full name equals `name` (case-insensitive)
    pub fn find_types_by_name(&self, name: &str) -> ModuleResult<Vec<TypeRecord>> {
        let name = ensure_not_blank(name, "type name")?;
        Ok(self
            .read()
            .values()
            .flat_map(|record| record.types.iter())
            .filter(|ty| ty.name.eq_ignore_ascii_case(name) || ty.full_name.eq_ignore_ascii_case(name))
            .cloned()
            .collect())
    }

    /// Remove the record stored under `id`; returns whether one existed
    pub fn remove(&self, id: &str) -> ModuleResult<bool> {
        let id = ensure_not_blank(id, "module id")?;
        let removed = self.write().remove(id).is_some();
        if removed {
            info!("Removed module {}", id);
            self.events.publish(DiagnosticEvent::RecordRemoved {
                module_id: id.to_string(),
            });
        } else {
            debug!("Module {} not in catalog, nothing removed", id);
        }
        Ok(removed)
    }

    /// Remove every record
    pub fn clear(&self) -> ModuleResult<()> {
        let removed = {
            let mut records = self.write();
            let removed = records.len();
            records.clear();
            removed
        };
        info!("Cleared catalog ({} modules)", removed);
        self.events.publish(DiagnosticEvent::CatalogCleared { removed });
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Distinct member names across the catalog, sorted
    pub fn member_names(&self) -> Vec<String> {
        let records = self.read();
        let names: BTreeSet<&str> = records
            .values()
            .flat_map(|record| record.members.iter().map(|m| m.name.as_str()))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Distinct type names (simple and full) across the catalog, sorted
    pub fn type_names(&self) -> Vec<String> {
        let records = self.read();
        let names: BTreeSet<&str> = records
            .values()
            .flat_map(|record| record.types.iter())
            .flat_map(|ty| [ty.name.as_str(), ty.full_name.as_str()])
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Id, version and artifacts of every record
    pub fn known_modules(&self) -> Vec<KnownModule> {
        self.read()
            .values()
            .map(|record| KnownModule {
                id: record.id.clone(),
                version: record.version.clone(),
                artifacts: record.artifacts.clone(),
            })
            .collect()
    }

    fn snapshot(&self) -> Vec<Arc<ModuleRecord>> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<ModuleRecord>>> {
        recover_lock(self.records.read())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<ModuleRecord>>> {
        recover_lock(self.records.write())
    }
}

/// Every type and member must belong to the record's module
fn validate_ownership(record: &ModuleRecord) -> ModuleResult<()> {
    if let Some(ty) = record.types.iter().find(|ty| ty.module_id != record.id) {
        return Err(ModuleError::Validation(format!(
            "type {} belongs to module {}, not {}",
            ty.full_name, ty.module_id, record.id
        )));
    }
    if let Some(member) = record.members.iter().find(|m| m.module_id != record.id) {
        return Err(ModuleError::Validation(format!(
            "member {} belongs to module {}, not {}",
            member.qualified_name(),
            member.module_id,
            record.id
        )));
    }
    Ok(())
}

/// Stored ids and versions must already be trimmed
fn ensure_key(value: &str, name: &str) -> ModuleResult<()> {
    if ensure_not_blank(value, name)? != value {
        return Err(ModuleError::Validation(format!(
            "{} '{}' has surrounding whitespace",
            name, value
        )));
    }
    Ok(())
}
