//! package.json reading and node_modules path parsing

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// The subset of package.json the planner cares about
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    pub name: Option<String>,

    pub version: Option<String>,

    pub main: Option<String>,

    pub exports: Option<Value>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    /// Read `package.json` from a package directory
    pub fn read(package_dir: &Path) -> Result<Self> {
        let path = package_dir.join("package.json");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Runtime dependencies followed by optional ones
    pub fn runtime_dependencies(&self) -> impl Iterator<Item = (&String, bool)> {
        self.dependencies
            .keys()
            .map(|name| (name, false))
            .chain(self.optional_dependencies.keys().map(|name| (name, true)))
    }
}

/// A path split at its innermost `node_modules` package boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeModulePath {
    /// Directory containing the `node_modules` folder entry
    pub base_dir: PathBuf,
    /// Package name, including scope
    pub name: String,
    /// Path inside the package, with a leading `./`
    pub subpath: String,
}

impl NodeModulePath {
    /// Absolute directory of the package
    pub fn package_dir(&self) -> PathBuf {
        self.base_dir.join(&self.name)
    }
}

/// Split a resolved path at its innermost `node_modules/<package>` segment
pub fn parse_node_module_path(path: &str) -> Option<NodeModulePath> {
    let marker = "node_modules/";
    let idx = path.rfind(marker)?;
    let base_dir = PathBuf::from(&path[..idx + marker.len()]);
    let rest = &path[idx + marker.len()..];

    let (name, remainder) = split_bare_specifier(rest)?;

    Some(NodeModulePath {
        base_dir,
        name,
        subpath: match remainder {
            Some(sub) => format!("./{}", sub),
            None => ".".to_string(),
        },
    })
}

/// Split a bare specifier into package name and optional subpath
pub fn split_bare_specifier(specifier: &str) -> Option<(String, Option<String>)> {
    if specifier.is_empty() || specifier.starts_with('.') || specifier.starts_with('/') {
        return None;
    }

    if specifier.starts_with('@') {
        // Scoped package: @scope/name or @scope/name/subpath
        let parts: Vec<&str> = specifier.splitn(3, '/').collect();
        if parts.len() < 2 || parts[1].is_empty() {
            return None;
        }
        let name = format!("{}/{}", parts[0], parts[1]);
        let sub = parts.get(2).filter(|s| !s.is_empty()).map(|s| s.to_string());
        Some((name, sub))
    } else {
        let parts: Vec<&str> = specifier.splitn(2, '/').collect();
        let sub = parts.get(1).filter(|s| !s.is_empty()).map(|s| s.to_string());
        Some((parts[0].to_string(), sub))
    }
}

/// Resolve a package `exports` field for a subpath (`.` or `./sub`)
pub fn resolve_exports(exports: &Value, subpath: &str, conditions: &[String]) -> Option<String> {
    match exports {
        Value::Object(map) if map.keys().any(|k| k.starts_with('.')) => {
            map.get(subpath).and_then(|target| resolve_condition(target, conditions))
        }
        _ if subpath == "." => resolve_condition(exports, conditions),
        _ => None,
    }
}

fn resolve_condition(value: &Value, conditions: &[String]) -> Option<String> {
    match value {
        Value::String(target) => Some(target.clone()),
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| conditions.iter().any(|c| c == *key))
            .find_map(|(_, target)| resolve_condition(target, conditions)),
        Value::Array(targets) => targets.iter().find_map(|t| resolve_condition(t, conditions)),
        _ => None,
    }
}
