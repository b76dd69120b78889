//! Module system traits and error taxonomy
//!
//! Defines the seam the scanner uses to introspect artifacts and the error
//! type shared by the scanner, the catalog and the invocation engine.

use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::module::registry::manifest::ArtifactManifest;

/// Result alias used across the module system
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Error raised by invoked module code, boxed so any error type can travel
pub type InvocationCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Introspects one loadable artifact into its declared surface
///
/// The scanner calls this once per artifact in the selected platform target.
/// Implementations must not panic; a failure is reported as an error and the
/// scanner moves on to the next artifact.
pub trait ArtifactIntrospector: Send + Sync {
    /// Whether `path` looks like an artifact this introspector understands
    fn is_artifact(&self, path: &Path) -> bool;

    /// Artifact name recorded in the module record (usually the file stem)
    fn artifact_name(&self, path: &Path) -> Option<String>;

    /// Read the artifact's declared types and members
    fn introspect(&self, path: &Path) -> ModuleResult<ArtifactManifest>;
}

/// A module the catalog knows about, reported when resolution fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownModule {
    pub id: String,
    pub version: String,
    pub artifacts: Vec<String>,
}

impl fmt::Display for KnownModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artifacts.is_empty() {
            write!(f, "{} {} [no artifacts]", self.id, self.version)
        } else {
            write!(f, "{} {} [{}]", self.id, self.version, self.artifacts.join(", "))
        }
    }
}

/// Module system errors
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Member not found: {name}{}{}", scope_note(.scope), hint_note(.suggestions))]
    MemberNotFound {
        name: String,
        /// Type the lookup was scoped to, `None` for catalog-wide lookups
        scope: Option<String>,
        suggestions: Vec<String>,
    },

    #[error("Type not found: {name}{}", hint_note(.suggestions))]
    TypeNotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("No overload of {name} takes {arg_count} argument(s); candidates: {}", join_or_none(.candidates, "; "))]
    OverloadMismatch {
        name: String,
        arg_count: usize,
        /// Full signatures of every candidate with the requested name
        candidates: Vec<String>,
    },

    #[error("Module {module_id} is not loaded in this process; catalog knows: {}", known_list(.known))]
    ModuleNotResolved {
        module_id: String,
        known: Vec<KnownModule>,
    },

    #[error("Parameter '{parameter}' of {member} has unresolved type {type_name}")]
    ParameterTypeNotFound {
        member: String,
        parameter: String,
        type_name: String,
    },

    #[error("{0} is an instance member; an instance is required")]
    InstanceRequired(String),

    #[error("{0} is static; no instance may be supplied")]
    UnexpectedInstance(String),

    #[error("{0} does not return an async result")]
    NotAsync(String),

    #[error("Invocation of {member} failed: {source}")]
    InvocationFailed {
        member: String,
        #[source]
        source: InvocationCause,
    },

    #[error("Cannot construct {type_name}: {reason}; attempted ({}); declared constructors: {}", join_or_none(.attempted, ", "), join_or_none(.declared, "; "))]
    ConstructionFailed {
        type_name: String,
        reason: String,
        /// Type names of the supplied constructor arguments
        attempted: Vec<String>,
        /// Signatures of every constructor the type declares
        declared: Vec<String>,
    },

    #[error("Invocation of {0} was cancelled")]
    Cancelled(String),

    #[error("Invalid artifact manifest: {0}")]
    Manifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModuleError {
    /// Suggestions or hints attached to a not-found error
    pub fn suggestions(&self) -> &[String] {
        match self {
            ModuleError::MemberNotFound { suggestions, .. }
            | ModuleError::TypeNotFound { suggestions, .. } => suggestions,
            ModuleError::OverloadMismatch { candidates, .. } => candidates,
            _ => &[],
        }
    }

    pub(crate) fn invocation_failed(member: impl Into<String>, cause: anyhow::Error) -> Self {
        ModuleError::InvocationFailed {
            member: member.into(),
            source: cause.into(),
        }
    }
}

fn scope_note(scope: &Option<String>) -> String {
    match scope {
        Some(type_name) => format!(" on type {}", type_name),
        None => String::new(),
    }
}

fn hint_note(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

fn join_or_none(items: &[String], separator: &str) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(separator)
    }
}

fn known_list(known: &[KnownModule]) -> String {
    if known.is_empty() {
        return "no modules".to_string();
    }
    known
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
