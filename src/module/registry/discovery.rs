//! Module scanner
//!
//! Walks a module directory, picks the best platform target of every package
//! it contains and introspects each artifact of that target into a
//! `ModuleRecord`. Per-artifact failures are reported and skipped; a scan
//! never fails because of module content.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::module::api::events::{DiagnosticEvent, EventManager};
use crate::module::metadata::{
    is_async_return_type, is_synthetic_name, MemberFlags, MemberRecord, ModuleRecord,
    ParameterRecord, TypeFlags, TypeRecord,
};
use crate::module::registry::manifest::{ArtifactManifest, ManifestIntrospector, TypeKind};
use crate::module::registry::targets::{HostRuntime, PlatformTarget};
use crate::module::traits::{ArtifactIntrospector, ModuleResult};
use crate::utils::ensure_not_blank;

/// Folder holding the per-target subfolders of a package
const LIB_DIR: &str = "lib";

/// Module scanner
pub struct Scanner {
    host: HostRuntime,
    allowed_targets: Option<Vec<String>>,
    introspector: Arc<dyn ArtifactIntrospector>,
    events: EventManager,
}

impl Scanner {
    /// Create a scanner reading `*.artifact.toml` manifests
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            host: HostRuntime::from_config(config),
            allowed_targets: config.allowed_targets.clone(),
            introspector: Arc::new(ManifestIntrospector),
            events: EventManager::new(),
        }
    }

    /// Replace the artifact introspector
    pub fn with_introspector(mut self, introspector: Arc<dyn ArtifactIntrospector>) -> Self {
        self.introspector = introspector;
        self
    }

    /// Publish scan diagnostics through `events`
    pub fn with_events(mut self, events: EventManager) -> Self {
        self.events = events;
        self
    }

    pub fn host(&self) -> &HostRuntime {
        &self.host
    }

    /// Scan `module_path` using the configured target filter
    pub fn scan<P: AsRef<Path>>(&self, module_path: P, id: &str, version: &str) -> ModuleResult<ModuleRecord> {
        self.scan_with_targets(module_path, id, version, self.allowed_targets.as_deref())
    }

    /// Scan `module_path`, only considering target folders in `allowed_targets`
    ///
    /// Fails only when `id` or `version` is blank. A path with nothing
    /// recognizable yields an empty record.
    pub fn scan_with_targets<P: AsRef<Path>>(
        &self,
        module_path: P,
        id: &str,
        version: &str,
        allowed_targets: Option<&[String]>,
    ) -> ModuleResult<ModuleRecord> {
        let id = ensure_not_blank(id, "module id")?;
        let version = ensure_not_blank(version, "module version")?;
        let root = module_path.as_ref();

        info!("Scanning module {} {} at {:?}", id, version, root);
        self.events.publish(DiagnosticEvent::ScanStarted {
            module_id: id.to_string(),
            path: root.to_path_buf(),
        });

        let mut record = ModuleRecord::new(id, version, root);
        for package in package_dirs(root) {
            let Some(target_dir) = self.select_target(&package, allowed_targets) else {
                continue;
            };
            for artifact in self.artifacts_in(&target_dir) {
                self.absorb_artifact(&mut record, &artifact);
            }
        }

        info!(
            "Scanned module {}: {} artifacts, {} types, {} members",
            id,
            record.artifacts.len(),
            record.types.len(),
            record.members.len()
        );
        self.events.publish(DiagnosticEvent::ScanCompleted {
            module_id: id.to_string(),
            types: record.types.len(),
            members: record.members.len(),
        });
        Ok(record)
    }

    /// Pick the single best target folder of `package`
    fn select_target(&self, package: &Path, allowed_targets: Option<&[String]>) -> Option<PathBuf> {
        let lib = package.join(LIB_DIR);
        let candidates: Vec<PlatformTarget> = subdirectories(&lib)
            .iter()
            .filter_map(|dir| dir.file_name().and_then(|n| n.to_str()))
            .filter(|name| is_allowed(name, allowed_targets))
            .filter_map(PlatformTarget::parse)
            .collect();

        match self.host.select_best(&candidates) {
            Some(target) => {
                debug!("Selected target {} for package {:?}", target.folder, package);
                self.events.publish(DiagnosticEvent::TargetSelected {
                    package: package.to_path_buf(),
                    target: target.folder.clone(),
                });
                Some(lib.join(&target.folder))
            }
            None => {
                let reason = if candidates.is_empty() {
                    "no allowed platform target folders".to_string()
                } else {
                    format!(
                        "none of {} target(s) is compatible with {}{}.{}",
                        candidates.len(),
                        self.host.family,
                        self.host.version.0,
                        self.host.version.1
                    )
                };
                debug!("Skipping package {:?}: {}", package, reason);
                self.events.publish(DiagnosticEvent::TargetSkipped {
                    package: package.to_path_buf(),
                    reason,
                });
                None
            }
        }
    }

    /// Artifacts inside a target folder, in file name order
    fn artifacts_in(&self, target_dir: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(target_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read target folder {:?}: {}", target_dir, e);
                return Vec::new();
            }
        };
        let mut artifacts: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| self.introspector.is_artifact(path))
            .collect();
        artifacts.sort();
        artifacts
    }

    /// Introspect one artifact and merge its surface into `record`
    fn absorb_artifact(&self, record: &mut ModuleRecord, artifact: &Path) {
        let manifest = match self.introspector.introspect(artifact) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Failed to introspect artifact {:?}: {}", artifact, e);
                self.events.publish(DiagnosticEvent::ArtifactFailed {
                    module_id: record.id.clone(),
                    artifact: artifact.to_path_buf(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let name = manifest
            .name
            .clone()
            .or_else(|| self.introspector.artifact_name(artifact))
            .unwrap_or_else(|| artifact.display().to_string());
        if record.artifacts.iter().any(|a| a.eq_ignore_ascii_case(&name)) {
            debug!("Artifact {} already scanned, skipping {:?}", name, artifact);
            return;
        }
        record.artifacts.push(name);
        append_surface(record, &manifest);
    }
}

/// Build a record from a single in-memory manifest
///
/// Applies the same filtering as a scan; used when metadata comes from
/// `ModuleHandle::describe` rather than from disk.
pub fn record_from_manifest<P: AsRef<Path>>(
    id: &str,
    version: &str,
    source_path: P,
    manifest: &ArtifactManifest,
) -> ModuleRecord {
    let mut record = ModuleRecord::new(id, version, source_path.as_ref());
    if let Some(name) = &manifest.name {
        record.artifacts.push(name.clone());
    }
    append_surface(&mut record, manifest);
    record
}

/// Append the non-synthetic types and public members of `manifest`
fn append_surface(record: &mut ModuleRecord, manifest: &ArtifactManifest) {
    let mut seen: HashSet<String> = record.types.iter().map(|t| t.full_name.clone()).collect();

    for ty in &manifest.types {
        if is_synthetic_name(&ty.name) {
            debug!("Skipping synthetic type {}", ty.name);
            continue;
        }
        let flags = TypeFlags {
            is_class: matches!(ty.kind, TypeKind::Class),
            is_interface: matches!(ty.kind, TypeKind::Interface),
            is_abstract: ty.is_abstract,
            is_static: ty.is_static,
        };
        let type_record = TypeRecord::new(ty.namespace.trim(), ty.name.trim(), flags, record.id.clone());
        if !seen.insert(type_record.full_name.clone()) {
            warn!(
                "Type {} declared by more than one artifact of module {}; keeping the first",
                type_record.full_name, record.id
            );
            continue;
        }

        for member in ty.members.iter().filter(|m| m.is_public) {
            if is_synthetic_name(&member.name) {
                continue;
            }
            let parameters = member
                .params
                .iter()
                .map(|p| ParameterRecord {
                    name: p.name.clone(),
                    type_name: p.type_name.trim().to_string(),
                    optional: p.optional,
                    default_value: p.default.clone(),
                })
                .collect();
            record.members.push(MemberRecord {
                owner_type: type_record.full_name.clone(),
                name: member.name.trim().to_string(),
                return_type: member.returns.trim().to_string(),
                parameters,
                flags: MemberFlags {
                    is_static: member.is_static,
                    is_public: true,
                    is_async: is_async_return_type(&member.returns),
                },
                module_id: record.id.clone(),
            });
        }
        record.types.push(type_record);
    }
}

fn is_allowed(folder: &str, allowed_targets: Option<&[String]>) -> bool {
    match allowed_targets {
        Some(allowed) => allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(folder)),
        None => true,
    }
}

/// Package directories under `root`: `root` itself and each child with `lib/`
fn package_dirs(root: &Path) -> Vec<PathBuf> {
    let mut packages = Vec::new();
    if root.join(LIB_DIR).is_dir() {
        packages.push(root.to_path_buf());
    }
    packages.extend(
        subdirectories(root)
            .into_iter()
            .filter(|dir| dir.join(LIB_DIR).is_dir()),
    );
    packages
}

/// Sorted child directories; unreadable or missing directories yield none
fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Not scanning {:?}: {}", dir, e);
            return Vec::new();
        }
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}
