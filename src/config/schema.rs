//! Configuration schema definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Project layout and build flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Application source directory, relative to the project root
    #[serde(default = "default_src_dir")]
    pub src_dir: String,

    /// Build directory holding generated build artifacts
    #[serde(default = "default_build_dir")]
    pub build_dir: String,

    /// Framework runtime directory
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: String,

    /// Chunk group name used for framework runtime chunks
    #[serde(default = "default_runtime_name")]
    pub runtime_name: String,

    /// Bundle entry module
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Module bound to the internal error-handler slot
    #[serde(default)]
    pub error_handler: Option<String>,

    /// Deployment preset name (`node`, `nitro-prerender`, ...)
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Development build
    #[serde(default)]
    pub dev: bool,

    /// Target a Node.js runtime (otherwise node built-ins are polyfilled)
    #[serde(default = "default_true")]
    pub node: bool,

    /// Emit source maps
    #[serde(default)]
    pub source_map: bool,

    /// Minify output
    #[serde(default)]
    pub minify: bool,

    /// Inline dynamic imports into a single chunk
    #[serde(default)]
    pub inline_dynamic_imports: bool,

    /// Enable WASM imports
    #[serde(default)]
    pub wasm: bool,

    /// Emit bundle statistics
    #[serde(default)]
    pub analyze: bool,

    /// Record per-stage timings
    #[serde(default)]
    pub timing: bool,
}

fn default_src_dir() -> String {
    ".".to_string()
}

fn default_build_dir() -> String {
    ".build".to_string()
}

fn default_runtime_dir() -> String {
    "runtime".to_string()
}

fn default_runtime_name() -> String {
    "nitro".to_string()
}

fn default_entry() -> String {
    "runtime/entries/node.mjs".to_string()
}

fn default_preset() -> String {
    "node".to_string()
}

fn default_true() -> bool {
    true
}

/// How the chunk namer picks a chunk's representative module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkOrdering {
    /// Trust the order in which the host presents chunk members
    #[default]
    Host,
    /// Sort members before picking the representative
    Sorted,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Server bundle output directory
    #[serde(default = "default_server_dir")]
    pub server_dir: String,

    /// Extension of emitted files, without the dot
    #[serde(default = "default_ext")]
    pub ext: String,

    /// Representative selection for chunk naming
    #[serde(default)]
    pub chunk_ordering: ChunkOrdering,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            server_dir: default_server_dir(),
            ext: default_ext(),
            chunk_ordering: ChunkOrdering::default(),
        }
    }
}

fn default_server_dir() -> String {
    ".output/server".to_string()
}

fn default_ext() -> String {
    "mjs".to_string()
}

/// A declared route handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Route pattern; empty for catch-all middleware
    #[serde(default)]
    pub route: String,

    /// Handler module path, relative to the source directory
    pub handler: String,

    /// HTTP method restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Import lazily on first request
    #[serde(default)]
    pub lazy: bool,

    /// Run as middleware for every request
    #[serde(default)]
    pub middleware: bool,
}

/// Handler discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Discover handlers from the source directory
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory mounted under `/api`
    #[serde(default = "default_api_dir")]
    pub api_dir: String,

    /// Directory mounted under `/`
    #[serde(default = "default_routes_dir")]
    pub routes_dir: String,

    /// Glob patterns of files to skip
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_dir: default_api_dir(),
            routes_dir: default_routes_dir(),
            ignore: Vec::new(),
        }
    }
}

fn default_api_dir() -> String {
    "api".to_string()
}

fn default_routes_dir() -> String {
    "routes".to_string()
}

/// Externals configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalsConfig {
    /// Allow external dependencies at all; `false` selects no-externals mode
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Trace package boundaries; `false` externalizes by full path
    #[serde(default = "default_true")]
    pub trace: bool,

    /// Extra prefixes that are always inlined
    #[serde(default)]
    pub inline: Vec<String>,

    /// Extra prefixes that are always external
    #[serde(default)]
    pub external: Vec<String>,

    /// Module directories searched for packages, in order
    #[serde(default = "default_module_directories")]
    pub module_directories: Vec<String>,
}

impl Default for ExternalsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trace: true,
            inline: Vec::new(),
            external: Vec::new(),
            module_directories: default_module_directories(),
        }
    }
}

fn default_module_directories() -> Vec<String> {
    vec!["node_modules".to_string()]
}

/// Global injected by the inject collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InjectSpec {
    /// Default export of a module
    Default(String),
    /// `[module, export]` pair
    Named(Vec<String>),
}

/// User overrides for the runtime environment preset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnenvConfig {
    #[serde(default)]
    pub alias: BTreeMap<String, String>,

    #[serde(default)]
    pub polyfill: Vec<String>,

    #[serde(default)]
    pub external: Vec<String>,

    #[serde(default)]
    pub inject: BTreeMap<String, InjectSpec>,
}
