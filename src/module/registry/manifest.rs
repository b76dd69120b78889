//! Artifact manifest parsing
//!
//! An artifact is a `<name>.artifact.toml` file shipped inside a platform
//! target folder. It carries the metadata a runtime with reflection would
//! read from the binary itself: the exported types, their members and
//! constructors.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::module::traits::{ArtifactIntrospector, ModuleError, ModuleResult};

/// File suffix identifying artifact manifests
pub const ARTIFACT_EXTENSION: &str = ".artifact.toml";

/// Artifact manifest (`*.artifact.toml` structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Artifact name, defaults to the file name without the suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeManifest>,
}

/// Declared kind of an exported type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Struct,
    Enum,
}

/// One exported type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeManifest {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub members: Vec<MemberManifest>,
    #[serde(default)]
    pub constructors: Vec<ConstructorManifest>,
}

/// One method of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberManifest {
    pub name: String,
    #[serde(default = "default_return_type")]
    pub returns: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default = "default_true", rename = "public")]
    pub is_public: bool,
    #[serde(default)]
    pub params: Vec<ParamManifest>,
}

/// One constructor of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorManifest {
    #[serde(default = "default_true", rename = "public")]
    pub is_public: bool,
    #[serde(default)]
    pub params: Vec<ParamManifest>,
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_return_type() -> String {
    "void".to_string()
}

fn default_true() -> bool {
    true
}

impl ArtifactManifest {
    /// Load manifest from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ModuleResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate manifest TOML
    pub fn from_toml_str(contents: &str) -> ModuleResult<Self> {
        let manifest: ArtifactManifest = toml::from_str(contents).map_err(|e| {
            ModuleError::Manifest(format!("Failed to parse manifest TOML: {}", e))
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Render as TOML, the inverse of `from_toml_str`
    pub fn to_toml_string(&self) -> ModuleResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ModuleError::Manifest(format!("Failed to render manifest TOML: {}", e)))
    }

    /// Check required names are present
    pub fn validate(&self) -> ModuleResult<()> {
        for ty in &self.types {
            if ty.name.trim().is_empty() {
                return Err(ModuleError::Manifest("Type name cannot be empty".to_string()));
            }
            for member in &ty.members {
                if member.name.trim().is_empty() {
                    return Err(ModuleError::Manifest(format!(
                        "Member of type {} has an empty name",
                        ty.name
                    )));
                }
                validate_params(&ty.name, &member.name, &member.params)?;
            }
            for ctor in &ty.constructors {
                validate_params(&ty.name, "constructor", &ctor.params)?;
            }
        }
        Ok(())
    }
}

fn validate_params(type_name: &str, owner: &str, params: &[ParamManifest]) -> ModuleResult<()> {
    for param in params {
        if param.name.trim().is_empty() || param.type_name.trim().is_empty() {
            return Err(ModuleError::Manifest(format!(
                "Parameter of {}.{} needs both a name and a type",
                type_name, owner
            )));
        }
    }
    Ok(())
}

/// Artifact name for `path`: its file name without the manifest suffix
pub fn artifact_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let lowered = file_name.to_ascii_lowercase();
    if !lowered.ends_with(ARTIFACT_EXTENSION) || lowered.len() == ARTIFACT_EXTENSION.len() {
        return None;
    }
    Some(file_name[..file_name.len() - ARTIFACT_EXTENSION.len()].to_string())
}

/// Default introspector reading `*.artifact.toml` manifests from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestIntrospector;

impl ArtifactIntrospector for ManifestIntrospector {
    fn is_artifact(&self, path: &Path) -> bool {
        path.is_file() && artifact_name(path).is_some()
    }

    fn artifact_name(&self, path: &Path) -> Option<String> {
        artifact_name(path)
    }

    fn introspect(&self, path: &Path) -> ModuleResult<ArtifactManifest> {
        ArtifactManifest::from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"
name = "Sample"

[[types]]
name = "Greeter"
namespace = "Sample"
static = true

[[types.members]]
name = "Greet"
returns = "string"
static = true

[[types.members.params]]
name = "name"
type = "string"

[[types]]
name = "Widget"
namespace = "Sample"

[[types.constructors]]
params = [
    { name = "width", type = "int" },
    { name = "height", type = "int" },
]
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ArtifactManifest::from_toml_str(SAMPLE).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("Sample"));
        assert_eq!(manifest.types.len(), 2);

        let greeter = &manifest.types[0];
        assert!(greeter.is_static);
        assert_eq!(greeter.kind, TypeKind::Class);
        let greet = &greeter.members[0];
        assert!(greet.is_public);
        assert!(greet.is_static);
        assert_eq!(greet.params[0].type_name, "string");

        let widget = &manifest.types[1];
        assert_eq!(widget.constructors[0].params.len(), 2);
    }

    #[test]
    fn test_member_defaults() {
        let manifest = ArtifactManifest::from_toml_str(
            r#"
[[types]]
name = "Counter"

[[types.members]]
name = "Reset"
"#,
        )
        .unwrap();
        let reset = &manifest.types[0].members[0];
        assert_eq!(reset.returns, "void");
        assert!(reset.is_public);
        assert!(!reset.is_static);
        assert!(reset.params.is_empty());
    }

    #[test]
    fn test_rejects_invalid_toml() {
        let err = ArtifactManifest::from_toml_str("[[types]\nname = ").unwrap_err();
        assert!(matches!(err, ModuleError::Manifest(_)));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactManifest::from_file(dir.path().join("Missing.artifact.toml")).unwrap_err();
        assert!(matches!(err, ModuleError::Io(_)));

        let broken = dir.path().join("Broken.artifact.toml");
        std::fs::write(&broken, "[[types]\nname = ").unwrap();
        assert!(matches!(
            ArtifactManifest::from_file(&broken),
            Err(ModuleError::Manifest(_))
        ));
    }

    #[test]
    fn test_rejects_empty_type_name() {
        let err = ArtifactManifest::from_toml_str("[[types]]\nname = \"  \"\n").unwrap_err();
        assert!(matches!(err, ModuleError::Manifest(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let manifest = ArtifactManifest::from_toml_str(SAMPLE).unwrap();
        let rendered = manifest.to_toml_string().unwrap();
        assert_eq!(ArtifactManifest::from_toml_str(&rendered).unwrap(), manifest);
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_name(&PathBuf::from("lib/host1.0/Sample.Core.artifact.toml")),
            Some("Sample.Core".to_string())
        );
        assert_eq!(artifact_name(&PathBuf::from("lib/host1.0/readme.toml")), None);
        assert_eq!(artifact_name(&PathBuf::from(".artifact.toml")), None);
    }
}
