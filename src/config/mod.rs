//! Configuration handling for Bundleplan
//!
//! Parses and manages bundleplan.toml configuration files.

mod schema;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Declared plugin modules, in load order
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Prefixes of modules whose side effects must be kept
    #[serde(default = "default_module_side_effects")]
    pub module_side_effects: Vec<String>,

    /// Project layout and flags
    pub project: ProjectConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Declared route handlers
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,

    /// Handler discovery
    #[serde(default)]
    pub scan: ScanConfig,

    /// User virtual modules (id -> source)
    #[serde(default, rename = "virtual")]
    pub virtual_modules: BTreeMap<String, String>,

    /// User aliases
    #[serde(default)]
    pub alias: BTreeMap<String, String>,

    /// Externals policy
    #[serde(default)]
    pub externals: ExternalsConfig,

    /// Environment preset overrides
    #[serde(default)]
    pub unenv: UnenvConfig,

    /// Runtime configuration object exposed to the bundle
    #[serde(default)]
    pub runtime_config: toml::Table,

    /// Extra build-time replacements
    #[serde(default)]
    pub replace: BTreeMap<String, String>,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

fn default_module_side_effects() -> Vec<String> {
    vec![
        "unenv/runtime/polyfill/".to_string(),
        "node-fetch-native/polyfill".to_string(),
    ]
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self::from_toml(&content, root)
    }

    /// Parse configuration text, treating `root` as the project root
    pub fn from_toml(content: &str, root: PathBuf) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse bundleplan.toml")?;

        config.root = root;
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            plugins: Vec::new(),
            module_side_effects: default_module_side_effects(),
            project: ProjectConfig {
                name: "my-server".to_string(),
                src_dir: ".".to_string(),
                build_dir: ".build".to_string(),
                runtime_dir: "runtime".to_string(),
                runtime_name: "nitro".to_string(),
                entry: "runtime/entries/node.mjs".to_string(),
                error_handler: None,
                preset: "node".to_string(),
                dev: false,
                node: true,
                source_map: false,
                minify: false,
                inline_dynamic_imports: false,
                wasm: false,
                analyze: false,
                timing: false,
            },
            output: OutputConfig::default(),
            handlers: Vec::new(),
            scan: ScanConfig::default(),
            virtual_modules: BTreeMap::new(),
            alias: BTreeMap::new(),
            externals: ExternalsConfig::default(),
            unenv: UnenvConfig::default(),
            runtime_config: toml::Table::new(),
            replace: BTreeMap::new(),
            root: PathBuf::from("/"),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.project.entry.trim().is_empty() {
            anyhow::bail!("project.entry must not be empty in bundleplan.toml");
        }

        if self.project.runtime_name.trim().is_empty() {
            anyhow::bail!("project.runtime_name must not be empty in bundleplan.toml");
        }

        if self.output.ext.is_empty() || self.output.ext.starts_with('.') {
            anyhow::bail!(
                "output.ext must be a bare extension such as \"mjs\", got {:?}",
                self.output.ext
            );
        }

        for (index, handler) in self.handlers.iter().enumerate() {
            if handler.handler.trim().is_empty() {
                anyhow::bail!("handlers[{}] has an empty handler path", index);
            }
        }

        Ok(())
    }

    /// Resolve a project-relative path against the root directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Get the absolute source directory
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.project.src_dir)
    }

    /// Get the absolute build directory
    pub fn build_dir(&self) -> PathBuf {
        self.resolve_path(&self.project.build_dir)
    }

    /// Get the absolute framework runtime directory
    pub fn runtime_dir(&self) -> PathBuf {
        self.resolve_path(&self.project.runtime_dir)
    }

    /// Get the absolute server output directory
    pub fn server_output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output.server_dir)
    }

    /// Get the absolute bundle entry path
    pub fn entry_path(&self) -> PathBuf {
        self.resolve_path(&self.project.entry)
    }

    /// Get the module bound to the error-handler slot
    pub fn error_handler_path(&self) -> PathBuf {
        match &self.project.error_handler {
            Some(handler) => self.resolve_path(handler),
            None => self.runtime_dir().join("error"),
        }
    }

    /// Get the absolute module directories, in lookup order
    pub fn module_directories(&self) -> Vec<PathBuf> {
        self.externals
            .module_directories
            .iter()
            .map(|dir| self.resolve_path(dir))
            .collect()
    }
}
