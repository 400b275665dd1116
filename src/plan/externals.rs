//! Externalization decisions
//!
//! Decides, per import, whether a module is bundled or left to be loaded by
//! the server runtime from a module directory. Decisions are memoized for the
//! lifetime of the tracer.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use semver::Version;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{PlanError, PlanResult, PlanWarning, WarningKind, Warnings};
use crate::resolver::{parse_node_module_path, split_bare_specifier, PackageJson, Resolver};
use crate::utils::{clean_path, is_under, normalize_id, path_to_module_id, without_node_modules};

use super::preset::EnvPreset;
use super::roots::INTERNAL_PREFIX;

/// Extensions the server runtime can load directly
const RUNTIME_EXTENSIONS: [&str; 5] = ["js", "mjs", "cjs", "json", "node"];

/// Outcome of an externalization decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum ExternalizationVerdict {
    /// Bundle the module
    Inline,
    /// Leave the import in place; `id` is what the output imports at runtime
    External { id: String },
}

impl ExternalizationVerdict {
    pub fn external(id: impl Into<String>) -> Self {
        Self::External { id: id.into() }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }
}

/// Inputs of the tracer, fixed before the build starts
#[derive(Debug, Clone, Default)]
pub struct ExternalsOptions {
    /// Prefixes that are always bundled
    pub inline: Vec<String>,

    /// Prefixes that are always external
    pub external: Vec<String>,

    /// Map resolved files back to package names
    pub trace: bool,

    /// Runtime preset; its externals are provided by the runtime itself
    pub preset: Arc<EnvPreset>,
}

/// Memoized externalization decisions for one build
pub struct ExternalsTracer {
    options: ExternalsOptions,
    resolver: Arc<Resolver>,
    verdicts: DashMap<String, ExternalizationVerdict>,

    /// Externalized package directories and their package names
    packages: DashMap<String, String>,

    warnings: Arc<Warnings>,
    traced: OnceCell<TracedPackages>,
}

impl ExternalsTracer {
    pub fn new(options: ExternalsOptions, resolver: Arc<Resolver>, warnings: Arc<Warnings>) -> Self {
        Self {
            options,
            resolver,
            verdicts: DashMap::new(),
            packages: DashMap::new(),
            warnings,
            traced: OnceCell::new(),
        }
    }

    /// Decide whether `id`, imported from `importer`, is bundled or external.
    ///
    /// The first decision stored for an id wins; concurrent callers racing on
    /// the same id all observe that decision.
    pub fn decide(&self, id: &str, importer: Option<&str>) -> ExternalizationVerdict {
        let id = normalize_id(id);
        if is_internal(&id) {
            return ExternalizationVerdict::Inline;
        }

        let key = memo_key(&id, importer);
        if let Some(verdict) = self.verdicts.get(&key) {
            return verdict.clone();
        }

        let verdict = self.compute(&id, &key, importer);
        let stored = self.verdicts.entry(key.clone()).or_insert(verdict).clone();
        debug!("Externals: {} -> {:?}", key, stored);
        stored
    }

    fn compute(&self, id: &str, key: &str, importer: Option<&str>) -> ExternalizationVerdict {
        if self.options.preset.is_external(id) {
            return ExternalizationVerdict::external(id);
        }

        if self.is_inlined(key) {
            return ExternalizationVerdict::Inline;
        }

        if let Some(verdict) = self.package_file_verdict(key) {
            return verdict;
        }

        if importer.map_or(false, |i| self.package_file_verdict(i).is_some()) {
            return ExternalizationVerdict::external(key);
        }

        if id.starts_with('.') {
            return ExternalizationVerdict::Inline;
        }

        if self.options.external.iter().any(|prefix| key.starts_with(prefix.as_str())) {
            return ExternalizationVerdict::external(key);
        }

        let resolved = match self.resolver.resolve(key, None) {
            Ok(Some(path)) => path_to_module_id(&path),
            Ok(None) => {
                self.trace_failure(key, "could not be resolved from the module directories");
                return ExternalizationVerdict::Inline;
            }
            Err(err) => {
                self.trace_failure(key, &format!("{:#}", err));
                return ExternalizationVerdict::Inline;
            }
        };

        let runtime_loadable = Path::new(&resolved)
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| RUNTIME_EXTENSIONS.contains(&ext));
        if !runtime_loadable {
            return ExternalizationVerdict::Inline;
        }

        if !self.options.trace {
            return ExternalizationVerdict::external(resolved);
        }

        let Some(boundary) = parse_node_module_path(&resolved) else {
            return ExternalizationVerdict::Inline;
        };
        let package_dir = path_to_module_id(&boundary.package_dir());

        if boundary.name != id {
            if split_bare_specifier(id).map_or(false, |(name, _)| name == boundary.name) {
                self.record_package(package_dir, &boundary.name);
                return ExternalizationVerdict::external(id);
            }

            if Path::new(id).is_absolute() && self.is_package_entry(&package_dir, &resolved) {
                self.record_package(package_dir, &boundary.name);
                return ExternalizationVerdict::external(boundary.name);
            }

            return ExternalizationVerdict::Inline;
        }

        self.record_package(package_dir, &boundary.name);
        ExternalizationVerdict::external(boundary.name)
    }

    /// Verdict for a file inside an installed package whose bare name is
    /// external. Follows from the package itself, never from the order in
    /// which packages were first seen.
    fn package_file_verdict(&self, path: &str) -> Option<ExternalizationVerdict> {
        if !self.options.trace || !Path::new(path).is_absolute() {
            return None;
        }
        let boundary = parse_node_module_path(path)?;
        if !self.decide(&boundary.name, None).is_external() {
            return None;
        }

        let package_dir = path_to_module_id(&boundary.package_dir());
        let verdict = if self.is_package_entry(&package_dir, path) {
            ExternalizationVerdict::external(boundary.name.as_str())
        } else {
            ExternalizationVerdict::external(path)
        };
        self.record_package(package_dir, &boundary.name);
        Some(verdict)
    }

    fn is_inlined(&self, key: &str) -> bool {
        let bare = without_node_modules(key);
        self.options.inline.iter().any(|prefix| {
            if Path::new(prefix).is_absolute() {
                is_path_prefix(key, prefix)
            } else {
                key.starts_with(prefix.as_str()) || bare.starts_with(prefix.as_str())
            }
        })
    }

    fn is_package_entry(&self, package_dir: &str, resolved: &str) -> bool {
        match self.resolver.package_entry(Path::new(package_dir)) {
            Ok(Some(entry)) => path_to_module_id(&entry) == resolved,
            _ => false,
        }
    }

    fn record_package(&self, dir: String, name: &str) {
        if !self.packages.contains_key(&dir) {
            debug!("Externalized package {} at {}", name, dir);
            self.packages.entry(dir).or_insert_with(|| name.to_string());
        }
    }

    fn trace_failure(&self, id: &str, reason: &str) {
        self.warnings.push(PlanWarning::new(
            WarningKind::ExternalizationTraceFailure,
            id,
            format!("Falling back to inline: {}", reason),
        ));
    }

    /// Directories of the packages externalized so far, sorted
    pub fn external_packages(&self) -> BTreeMap<String, String> {
        self.packages
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of memoized decisions
    pub fn decided(&self) -> usize {
        self.verdicts.len()
    }

    /// Walk the dependency closure of every externalized package.
    ///
    /// Runs once per tracer; later calls return the first result.
    pub fn trace_packages(&self) -> &TracedPackages {
        self.traced.get_or_init(|| {
            let traced = self.walk_dependencies();
            info!("Traced {} external packages", traced.packages.len());
            traced
        })
    }

    fn walk_dependencies(&self) -> TracedPackages {
        let mut traced = TracedPackages::default();
        let mut visited: BTreeSet<PathBuf> = BTreeSet::new();
        let mut queue: VecDeque<PathBuf> = self
            .external_packages()
            .into_keys()
            .map(PathBuf::from)
            .collect();

        while let Some(dir) = queue.pop_front() {
            if !visited.insert(dir.clone()) {
                continue;
            }

            let pkg = match PackageJson::read(&dir) {
                Ok(pkg) => pkg,
                Err(err) => {
                    self.trace_failure(&path_to_module_id(&dir), &format!("{:#}", err));
                    continue;
                }
            };

            let name = match pkg.name.clone() {
                Some(name) => name,
                None => match parse_node_module_path(&format!("{}/", path_to_module_id(&dir))) {
                    Some(boundary) => boundary.name,
                    None => continue,
                },
            };

            for (dep, optional) in pkg.runtime_dependencies() {
                match self.resolver.find_package_dir(dep, &dir) {
                    Some(dep_dir) => queue.push_back(dep_dir),
                    None if optional => debug!("Optional dependency {} of {} is not installed", dep, name),
                    None => self.trace_failure(dep, &format!("dependency of {} is not installed", name)),
                }
            }

            let candidate = TracedPackage {
                name: name.clone(),
                dir: path_to_module_id(&dir),
                version: pkg.version.clone(),
            };
            if let Some(existing) = traced.packages.get(&name) {
                self.warnings.push(PlanWarning::new(
                    WarningKind::DuplicatePackage,
                    name.as_str(),
                    format!("Found in {} and {}", existing.dir, candidate.dir),
                ));
                if !candidate.is_newer_than(existing) {
                    continue;
                }
            }
            traced.packages.insert(name, candidate);
        }

        traced
    }
}

/// No-externals guard: every import must be bundled from disk
pub struct NoExternalsGuard {
    resolver: Arc<Resolver>,
    preset: Arc<EnvPreset>,
}

impl NoExternalsGuard {
    pub fn new(resolver: Arc<Resolver>, preset: Arc<EnvPreset>) -> Self {
        Self { resolver, preset }
    }

    /// Resolve `id` to a file, failing when it cannot be bundled
    pub fn check(&self, id: &str, importer: Option<&str>) -> PlanResult<String> {
        let unresolvable = || PlanError::UnresolvableModule {
            id: id.to_string(),
            importer: importer.unwrap_or_default().to_string(),
        };

        if self.preset.is_external(id) {
            return Err(unresolvable());
        }

        match self.resolver.resolve(id, importer.map(Path::new)) {
            Ok(Some(path)) => Ok(path_to_module_id(&path)),
            Ok(None) | Err(_) => Err(unresolvable()),
        }
    }
}

/// A package reached by the dependency walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TracedPackage {
    pub name: String,
    pub dir: String,
    pub version: Option<String>,
}

impl TracedPackage {
    fn is_newer_than(&self, other: &TracedPackage) -> bool {
        let parse = |v: &Option<String>| v.as_deref().and_then(|v| Version::parse(v).ok());
        match (parse(&self.version), parse(&other.version)) {
            (Some(mine), Some(theirs)) => mine > theirs,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// Closure of externalized packages, one directory per package name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TracedPackages {
    pub packages: BTreeMap<String, TracedPackage>,
}

impl TracedPackages {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// package.json written beside the server bundle
    pub fn manifest(&self) -> Value {
        json!({
            "private": true,
            "bundledDependencies": self.names().collect::<Vec<_>>(),
        })
    }
}

/// Absolute allow-list entries match whole path segments; extensionless
/// handler paths also match the file they name
fn is_path_prefix(id: &str, prefix: &str) -> bool {
    is_under(id, prefix) || id.strip_prefix(prefix).map_or(false, |rest| rest.starts_with('.') && !rest.contains('/'))
}

fn is_internal(id: &str) -> bool {
    id.starts_with(INTERNAL_PREFIX) || id.starts_with('#') || id.contains('?')
}

/// Relative ids are memoized by the absolute path they point at
fn memo_key(id: &str, importer: Option<&str>) -> String {
    match importer {
        Some(importer) if id.starts_with('.') => {
            let base = importer.rsplit_once('/').map_or("", |(dir, _)| dir);
            clean_path(&format!("{}/{}", base, id))
        }
        _ => id.to_string(),
    }
}
