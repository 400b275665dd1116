//! Module resolution
//!
//! Resolves import specifiers to files on disk the way the server runtime
//! would: relative files, absolute files, and packages found in module
//! directories.

mod package;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::utils::{clean_path, path_to_module_id};

pub use package::{
    parse_node_module_path, resolve_exports, split_bare_specifier, NodeModulePath, PackageJson,
};

/// Extensions tried when an import omits one, in priority order
pub const EXTENSIONS: [&str; 5] = ["ts", "mjs", "js", "json", "node"];

/// Module resolver
#[derive(Debug, Clone)]
pub struct Resolver {
    /// Module directories searched after walking up from the importer
    module_directories: Vec<PathBuf>,

    /// Export conditions, matched against package `exports`
    conditions: Vec<String>,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(module_directories: Vec<PathBuf>, conditions: Vec<String>) -> Self {
        Self {
            module_directories,
            conditions,
        }
    }

    /// Export conditions for a development or production build
    pub fn export_conditions(dev: bool) -> Vec<String> {
        let mode = if dev { "development" } else { "production" };
        ["default", mode, "module", "node", "import"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    pub fn module_directories(&self) -> &[PathBuf] {
        &self.module_directories
    }

    /// Resolve an import specifier to an absolute file path
    pub fn resolve(&self, specifier: &str, importer: Option<&Path>) -> Result<Option<PathBuf>> {
        debug!("Resolving '{}' from {:?}", specifier, importer);

        if specifier.starts_with('.') {
            let Some(base_dir) = importer.and_then(Path::parent) else {
                return Ok(None);
            };
            let joined = clean_path(&path_to_module_id(&base_dir.join(specifier)));
            return Ok(self.resolve_file(Path::new(&joined)));
        }

        if Path::new(specifier).is_absolute() {
            return Ok(self.resolve_file(Path::new(specifier)));
        }

        if let Some(from) = importer.and_then(Path::parent) {
            if let Some(resolved) = self.resolve_bare(specifier, from)? {
                return Ok(Some(resolved));
            }
        }

        self.resolve_in_module_directories(specifier)
    }

    /// Resolve a bare specifier against the configured module directories only
    pub fn resolve_in_module_directories(&self, specifier: &str) -> Result<Option<PathBuf>> {
        for dir in &self.module_directories {
            if let Some(resolved) = self.resolve_in_node_modules(dir, specifier)? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    /// Locate the directory of package `name`, walking up from `from` and then
    /// through the module directories
    pub fn find_package_dir(&self, name: &str, from: &Path) -> Option<PathBuf> {
        let mut current = from.to_path_buf();
        loop {
            let candidate = current.join("node_modules").join(name);
            if candidate.join("package.json").is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        self.module_directories
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.join("package.json").is_file())
    }

    /// Resolve the main entry of a package directory
    pub fn package_entry(&self, package_dir: &Path) -> Result<Option<PathBuf>> {
        self.resolve_package_subpath(package_dir, None)
    }

    /// Try a file path as-is, with extensions, then as a directory index
    fn resolve_file(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return Some(target.to_path_buf());
        }

        for ext in &EXTENSIONS {
            let with_ext = PathBuf::from(format!("{}.{}", target.display(), ext));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if target.is_dir() {
            for ext in &EXTENSIONS {
                let index = target.join(format!("index.{}", ext));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    /// Resolve a bare import by walking up node_modules directories
    fn resolve_bare(&self, specifier: &str, from: &Path) -> Result<Option<PathBuf>> {
        let mut current = from.to_path_buf();

        loop {
            let node_modules = current.join("node_modules");

            if node_modules.is_dir() {
                if let Some(resolved) = self.resolve_in_node_modules(&node_modules, specifier)? {
                    return Ok(Some(resolved));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve a module within a node_modules directory
    fn resolve_in_node_modules(&self, node_modules: &Path, specifier: &str) -> Result<Option<PathBuf>> {
        let Some((package_name, subpath)) = split_bare_specifier(specifier) else {
            return Ok(None);
        };

        let package_dir = node_modules.join(&package_name);

        if !package_dir.is_dir() {
            return Ok(None);
        }

        self.resolve_package_subpath(&package_dir, subpath.as_deref())
    }

    fn resolve_package_subpath(&self, package_dir: &Path, subpath: Option<&str>) -> Result<Option<PathBuf>> {
        let package_json = package_dir.join("package.json");
        let pkg = if package_json.is_file() {
            Some(PackageJson::read(package_dir)?)
        } else {
            None
        };

        let export_key = match subpath {
            Some(sub) => format!("./{}", sub),
            None => ".".to_string(),
        };

        if let Some(exports) = pkg.as_ref().and_then(|p| p.exports.as_ref()) {
            if let Some(target) = resolve_exports(exports, &export_key, &self.conditions) {
                if let Some(resolved) = self.resolve_file(&package_dir.join(target.trim_start_matches("./"))) {
                    return Ok(Some(resolved));
                }
            }
        }

        if let Some(sub) = subpath {
            return Ok(self.resolve_file(&package_dir.join(sub)));
        }

        // `module` is intentionally not consulted: externals must stay loadable by the runtime
        if let Some(main) = pkg.as_ref().and_then(|p| p.main.as_deref()) {
            if let Some(resolved) = self.resolve_file(&package_dir.join(main.trim_start_matches("./"))) {
                return Ok(Some(resolved));
            }
        }

        Ok(self.resolve_file(&package_dir.join("index")))
    }
}
