//! Root directory tables shared by every planning decision

use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::utils::{clean_path, path_to_module_id};

/// Prefix of every module id that does not correspond to a file
pub const INTERNAL_PREFIX: &str = "\0";

/// Prefix of ids served by the virtual module overlay
pub const VIRTUAL_PREFIX: &str = "\0virtual:";

/// Prefix of ids produced by the raw asset loader
pub const RAW_PREFIX: &str = "\0raw:";

/// Absolute, `/`-separated root directories. Built once per plan and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Roots {
    pub root_dir: String,
    pub src_dir: String,
    pub build_dir: String,
    pub build_server_dir: String,
    pub runtime_dir: String,
    pub runtime_app_dir: String,
    pub runtime_name: String,
    pub handler_paths: Vec<String>,
}

impl Roots {
    pub fn new(
        root_dir: impl AsRef<Path>,
        src_dir: impl AsRef<Path>,
        build_dir: impl AsRef<Path>,
        runtime_dir: impl AsRef<Path>,
        runtime_name: impl Into<String>,
    ) -> Self {
        let dir = |path: &Path| clean_path(&path_to_module_id(path));
        let build_dir = dir(build_dir.as_ref());
        let runtime_dir = dir(runtime_dir.as_ref());

        Self {
            root_dir: dir(root_dir.as_ref()),
            src_dir: dir(src_dir.as_ref()),
            build_server_dir: format!("{}/dist/server", build_dir),
            runtime_app_dir: format!("{}/app", runtime_dir),
            build_dir,
            runtime_dir,
            runtime_name: runtime_name.into(),
            handler_paths: Vec::new(),
        }
    }

    pub fn from_config(config: &Config, handler_paths: Vec<String>) -> Self {
        Self::new(
            &config.root,
            config.src_dir(),
            config.build_dir(),
            config.runtime_dir(),
            config.project.runtime_name.clone(),
        )
        .with_handlers(handler_paths)
    }

    pub fn with_handlers(mut self, handler_paths: Vec<String>) -> Self {
        self.handler_paths = handler_paths;
        self
    }
}
