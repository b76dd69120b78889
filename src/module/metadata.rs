//! Normalized metadata model
//!
//! Describes the public surface of a scanned module: its types, their
//! members and each member's ordered parameters. Records are plain data;
//! the catalog stores them behind `Arc` and never mutates them afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::current_timestamp;

/// Return-type identifiers that wrap an asynchronous result
const ASYNC_WRAPPERS: &[&str] = &["Future", "Task", "ValueTask"];

/// Scanned description of one module version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Module identifier (catalog key)
    pub id: String,
    /// Module version string
    pub version: String,
    /// Directory the module was scanned from
    pub source_path: PathBuf,
    /// Unix timestamp (seconds) of the scan
    pub loaded_at: u64,
    /// Names of the artifacts that were introspected successfully
    pub artifacts: Vec<String>,
    pub types: Vec<TypeRecord>,
    /// Members in declaration order
    pub members: Vec<MemberRecord>,
}

impl ModuleRecord {
    /// Create an empty record stamped with the current time
    pub fn new(id: impl Into<String>, version: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            source_path: source_path.into(),
            loaded_at: current_timestamp(),
            artifacts: Vec::new(),
            types: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.members.is_empty()
    }

    /// Members declared by `type_full_name`, in declaration order
    pub fn members_of<'a>(&'a self, type_full_name: &'a str) -> impl Iterator<Item = &'a MemberRecord> + 'a {
        self.members
            .iter()
            .filter(move |member| member.owner_type.eq_ignore_ascii_case(type_full_name))
    }
}

/// Kind flags of a type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFlags {
    pub is_class: bool,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_static: bool,
}

/// A public type exported by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRecord {
    /// Namespace-qualified name, e.g. `Sample.Widget`
    pub full_name: String,
    pub namespace: String,
    /// Simple name, e.g. `Widget`
    pub name: String,
    pub flags: TypeFlags,
    pub module_id: String,
}

impl TypeRecord {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        flags: TypeFlags,
        module_id: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        Self {
            full_name: qualify(&namespace, &name),
            namespace,
            name,
            flags,
            module_id: module_id.into(),
        }
    }
}

/// Member flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFlags {
    pub is_static: bool,
    pub is_public: bool,
    pub is_async: bool,
}

/// A callable member (method) of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Full name of the declaring type
    pub owner_type: String,
    pub name: String,
    pub return_type: String,
    /// Ordered parameters; order is part of the member's identity
    pub parameters: Vec<ParameterRecord>,
    pub flags: MemberFlags,
    pub module_id: String,
}

impl MemberRecord {
    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Ordered parameter type names
    pub fn parameter_types(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.type_name.as_str()).collect()
    }

    /// Fully qualified member name, `Type.Member`
    pub fn qualified_name(&self) -> String {
        qualify(&self.owner_type, &self.name)
    }

    /// Human-readable signature, e.g. `Sample.Greeter.Greet(string name) -> string`
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.type_name, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        let prefix = if self.flags.is_static { "static " } else { "" };
        format!("{}{}({}) -> {}", prefix, self.qualified_name(), params, self.return_type)
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub type_name: String,
    pub optional: bool,
    /// Default value as declared, `None` when the parameter has none
    pub default_value: Option<String>,
}

impl ParameterRecord {
    pub fn required(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            optional: false,
            default_value: None,
        }
    }
}

/// Whether a return type name denotes an async-result wrapper
///
/// Matches `Future`, `Task` and `ValueTask`, bare or generic (`Task<string>`),
/// with or without a path prefix (`std::future::Future`).
pub fn is_async_return_type(type_name: &str) -> bool {
    let trimmed = type_name.trim();
    let head = trimmed.split('<').next().unwrap_or(trimmed).trim();
    let ident = head
        .rsplit(|c: char| c == '.' || c == ':')
        .next()
        .unwrap_or(head);
    ASYNC_WRAPPERS.contains(&ident)
}

/// Marker convention for compiler-generated types and members
pub fn is_synthetic_name(name: &str) -> bool {
    name.starts_with('<') || name.starts_with("__") || name.contains('$')
}

/// Join a namespace (or owner) and a name with a dot
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}
