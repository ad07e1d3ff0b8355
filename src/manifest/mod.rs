// src/manifest/mod.rs

//! Package descriptor extraction and serialization
//!
//! The descriptor is read from the build script's globals after the
//! build function has run, validated field by field, and written as
//! `package.toml` into the staging directory. Extraction fails fast: the
//! first missing or malformed required field aborts before any archive
//! is written.

use crate::error::Result;
use crate::script::ScriptHost;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Manifest format version written to `package.toml`
pub const SPEC_VERSION: u32 = 1;

/// The complete serialized package descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRoot {
    pub spec: u32,
    pub package: Package,
    pub dependencies: Dependencies,
    /// Installed path -> source path within the package tree
    pub files: BTreeMap<String, String>,
    pub hooks: Hooks,
}

/// Core package metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub description: String,
    pub authors: Vec<String>,
    pub maintainers: Vec<String>,
}

/// Runtime dependencies as `name@version` references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

/// Lifecycle hook scripts; empty string means absent
///
/// The four fields are read and defaulted independently of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    pub preinstall: String,
    pub postinstall: String,
    pub preremove: String,
    pub postremove: String,
}

impl PackageRoot {
    /// Build a validated descriptor from the script's globals
    ///
    /// Required fields: `name`, `version`, `description` (strings),
    /// `authors` and `maintainers` (lists of strings),
    /// `dependencies.required` and `dependencies.optional` (name->version
    /// mappings, flattened to `name@version`), and `files`. The `hooks`
    /// table and each of its fields are optional.
    pub fn extract(host: &ScriptHost) -> Result<Self> {
        let name = host.global_string("name")?;
        let version = host.global_string("version")?;
        let description = host.global_string("description")?;
        let authors = host.global_string_list("authors")?;
        let maintainers = host.global_string_list("maintainers")?;

        let required = flatten_refs(host.nested_string_map("dependencies", "required")?);
        let optional = flatten_refs(host.nested_string_map("dependencies", "optional")?);

        let files = host.global_string_map("files")?;

        let hooks = Hooks {
            preinstall: host
                .optional_nested_string("hooks", "preinstall")
                .unwrap_or_default(),
            postinstall: host
                .optional_nested_string("hooks", "postinstall")
                .unwrap_or_default(),
            preremove: host
                .optional_nested_string("hooks", "preremove")
                .unwrap_or_default(),
            postremove: host
                .optional_nested_string("hooks", "postremove")
                .unwrap_or_default(),
        };

        Ok(Self {
            spec: SPEC_VERSION,
            package: Package {
                name,
                version,
                description,
                authors,
                maintainers,
            },
            dependencies: Dependencies { required, optional },
            files,
            hooks,
        })
    }

    /// Serialize the descriptor as `package.toml` inside `dir`
    pub fn write(&self, dir: &Path) -> Result<()> {
        let encoded = toml::to_string_pretty(self)?;
        let path = dir.join("package.toml");
        fs::write(&path, encoded)?;
        debug!("Wrote manifest to {}", path.display());
        Ok(())
    }
}

/// Flatten a name->version mapping to sorted `name@version` references
///
/// Source iteration order is not significant; sorting keeps the written
/// manifest deterministic.
fn flatten_refs(map: BTreeMap<String, String>) -> Vec<String> {
    map.into_iter()
        .map(|(name, version)| format!("{}@{}", name, version))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const COMPLETE: &str = r#"
        name = "foo"
        version = "1.0.0"
        description = "d"
        authors = {"a"}
        maintainers = {"m"}
        dependencies = { required = { libc = "2.39" }, optional = {} }
        files = { ["/bin/foo"] = "foo" }
        hooks = {}
    "#;

    fn host(source: &str) -> ScriptHost {
        let file = tempfile::NamedTempFile::with_suffix(".lua").unwrap();
        fs::write(file.path(), source).unwrap();
        ScriptHost::load(file.path()).unwrap()
    }

    #[test]
    fn test_extract_complete_script() {
        let pkg = PackageRoot::extract(&host(COMPLETE)).unwrap();
        assert_eq!(pkg.spec, SPEC_VERSION);
        assert_eq!(pkg.package.name, "foo");
        assert_eq!(pkg.package.version, "1.0.0");
        assert_eq!(pkg.package.authors, vec!["a"]);
        assert_eq!(pkg.package.maintainers, vec!["m"]);
        assert_eq!(pkg.dependencies.required, vec!["libc@2.39"]);
        assert!(pkg.dependencies.optional.is_empty());
        assert_eq!(pkg.files.get("/bin/foo").map(String::as_str), Some("foo"));
        assert_eq!(pkg.hooks, Hooks::default());
    }

    #[test]
    fn test_extract_fails_naming_each_missing_field() {
        let cases = [
            ("name", "name = \"foo\"\n"),
            ("version", "version = \"1.0.0\"\n"),
            ("description", "description = \"d\"\n"),
            ("authors", "authors = {\"a\"}\n"),
            ("maintainers", "maintainers = {\"m\"}\n"),
            (
                "dependencies",
                "dependencies = { required = {}, optional = {} }\n",
            ),
            ("files", "files = {}\n"),
        ];

        for (field, _) in &cases {
            // Rebuild the script leaving exactly this declaration out
            let source: String = cases
                .iter()
                .filter(|(f, _)| f != field)
                .map(|(_, decl)| *decl)
                .collect();
            let err = PackageRoot::extract(&host(&source)).unwrap_err();
            match err {
                Error::MissingField(f) => assert_eq!(&f, field),
                other => panic!("expected MissingField for {}, got {}", field, other),
            }
        }
    }

    #[test]
    fn test_extract_fails_on_missing_dependency_subtables() {
        let source = r#"
            name = "foo"
            version = "1.0.0"
            description = "d"
            authors = {}
            maintainers = {}
            dependencies = { required = {} }
            files = {}
        "#;
        let err = PackageRoot::extract(&host(source)).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField(f) if f == "dependencies.optional"
        ));
    }

    #[test]
    fn test_hooks_are_independent() {
        let source = r#"
            name = "foo"
            version = "1.0.0"
            description = "d"
            authors = {}
            maintainers = {}
            dependencies = { required = {}, optional = {} }
            files = {}
            hooks = { postinstall = "echo post" }
        "#;
        let pkg = PackageRoot::extract(&host(source)).unwrap();
        assert_eq!(pkg.hooks.preinstall, "");
        assert_eq!(pkg.hooks.postinstall, "echo post");
        assert_eq!(pkg.hooks.preremove, "");
        assert_eq!(pkg.hooks.postremove, "");
    }

    #[test]
    fn test_missing_hooks_table_is_not_fatal() {
        let source = r#"
            name = "foo"
            version = "1.0.0"
            description = "d"
            authors = {}
            maintainers = {}
            dependencies = { required = {}, optional = {} }
            files = {}
        "#;
        let pkg = PackageRoot::extract(&host(source)).unwrap();
        assert_eq!(pkg.hooks, Hooks::default());
    }

    #[test]
    fn test_write_round_trips_through_toml() {
        let pkg = PackageRoot::extract(&host(COMPLETE)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        pkg.write(dir.path()).unwrap();

        let raw = fs::read_to_string(dir.path().join("package.toml")).unwrap();
        let decoded: PackageRoot = toml::from_str(&raw).unwrap();
        assert_eq!(decoded, pkg);
        assert!(raw.contains("spec = 1"));
    }
}
