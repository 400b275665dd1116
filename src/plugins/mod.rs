//! Hook pipeline
//!
//! Rollup-style resolve/load hooks. The planner's own stages (virtual
//! modules, aliases, externals, node resolution) run here; the host bundler
//! drives the pipeline and consults it for chunk names, warnings and side
//! effects.

mod builtin;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::{PlanWarning, Warnings};
use crate::plan::chunk::ChunkNamer;
use crate::plan::classify::{classify, OriginCategory};
use crate::plan::externals::{ExternalizationVerdict, ExternalsTracer, TracedPackages};
use crate::plan::roots::Roots;
use crate::utils::{normalize_id, without_node_modules};

pub use builtin::{AliasStage, ExternalsStage, NoExternalsStage, NodeResolveStage, VirtualStage};

/// Host warning codes that are never surfaced
const SILENCED_WARNINGS: [&str; 2] = ["CIRCULAR_DEPENDENCY", "EVAL"];

/// Plugin hook context
pub struct PluginContext {
    /// Project root directory; entries without an importer resolve from here
    pub root: PathBuf,
}

/// Result of a resolve hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// Continue to next stage
    Skip,
    /// Resolve this id instead, starting over without the rewriting stage
    Rewrite(String),
    /// Resolved id
    Resolved(String),
    /// Leave the import to the runtime under this id
    External(String),
}

/// Result of a load hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    /// Continue to next stage
    Skip,
    /// Loaded content
    Loaded {
        content: Arc<str>,
        /// Optional loader type (js, json, etc.)
        loader: Option<String>,
    },
}

/// A pipeline stage
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name for logging and debugging
    fn name(&self) -> &str;

    /// Called when the build ends
    async fn build_end(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Resolve an import specifier
    /// Return ResolveResult::Skip to let later stages handle it
    async fn resolve_id(
        &self,
        _specifier: &str,
        _importer: Option<&str>,
        _ctx: &PluginContext,
    ) -> Result<ResolveResult> {
        Ok(ResolveResult::Skip)
    }

    /// Load the content of a module
    /// Return LoadResult::Skip to let later stages handle it
    async fn load(&self, _id: &str, _ctx: &PluginContext) -> Result<LoadResult> {
        Ok(LoadResult::Skip)
    }
}

/// Outcome of resolving one import through the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedModule {
    /// Resolved module id, or the runtime import name for externals
    pub id: String,
    /// Specifier as written by the importer
    pub specifier: String,
    pub external: bool,
    pub category: OriginCategory,
}

/// Runs the planner's stages and answers the host's policy questions
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    context: PluginContext,
    roots: Arc<Roots>,
    chunks: ChunkNamer,
    tracer: Option<Arc<ExternalsTracer>>,
    module_side_effects: Vec<String>,
    warnings: Arc<Warnings>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(roots: Arc<Roots>, chunks: ChunkNamer, warnings: Arc<Warnings>) -> Self {
        Self {
            stages: Vec::new(),
            context: PluginContext {
                root: PathBuf::from(&roots.root_dir),
            },
            roots,
            chunks,
            tracer: None,
            module_side_effects: Vec::new(),
            warnings,
        }
    }

    /// Register a stage; stages run in registration order
    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        debug!("Registered stage '{}'", stage.name());
        self.stages.push(stage);
    }

    /// Attach the tracer consulted by `decide`
    pub fn with_tracer(mut self, tracer: Arc<ExternalsTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_module_side_effects(mut self, prefixes: Vec<String>) -> Self {
        self.module_side_effects = prefixes;
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// Run build_end hooks
    pub async fn run_build_end(&self) -> Result<()> {
        for stage in &self.stages {
            stage.build_end(&self.context).await?;
        }
        Ok(())
    }

    /// Run resolve_id hooks
    pub async fn resolve_id(&self, specifier: &str, importer: Option<&str>) -> Result<Option<ResolvedModule>> {
        let mut current = normalize_id(specifier);
        let mut skipped: Vec<usize> = Vec::new();

        'restart: loop {
            for (idx, stage) in self.stages.iter().enumerate() {
                if skipped.contains(&idx) {
                    continue;
                }

                match stage.resolve_id(&current, importer, &self.context).await? {
                    ResolveResult::Skip => continue,
                    ResolveResult::Rewrite(id) => {
                        debug!("{}: '{}' -> '{}'", stage.name(), current, id);
                        skipped.push(idx);
                        current = id;
                        continue 'restart;
                    }
                    ResolveResult::Resolved(id) => {
                        return Ok(Some(self.resolved(id, specifier, false)));
                    }
                    ResolveResult::External(id) => {
                        return Ok(Some(self.resolved(id, specifier, true)));
                    }
                }
            }

            return Ok(None);
        }
    }

    fn resolved(&self, id: String, specifier: &str, external: bool) -> ResolvedModule {
        ResolvedModule {
            category: classify(&id, &self.roots),
            id,
            specifier: specifier.to_string(),
            external,
        }
    }

    /// Run load hooks
    pub async fn load(&self, id: &str) -> Result<Option<(Arc<str>, Option<String>)>> {
        for stage in &self.stages {
            match stage.load(id, &self.context).await? {
                LoadResult::Skip => continue,
                LoadResult::Loaded { content, loader } => {
                    return Ok(Some((content, loader)));
                }
            }
        }
        Ok(None)
    }

    /// Externalization verdict for an import, when externals are traced
    pub fn decide(&self, id: &str, importer: Option<&str>) -> Option<ExternalizationVerdict> {
        self.tracer.as_ref().map(|tracer| tracer.decide(id, importer))
    }

    pub fn is_external(&self, id: &str, importer: Option<&str>) -> bool {
        self.decide(id, importer).map_or(false, |v| v.is_external())
    }

    pub fn classify(&self, id: &str) -> OriginCategory {
        classify(&normalize_id(id), &self.roots)
    }

    /// Output file template for a chunk with these members, `[name]` left
    /// for the host
    pub fn chunk_file_name(&self, members: &[String]) -> String {
        self.chunks.file_template(members)
    }

    pub fn entry_file_name(&self) -> String {
        self.chunks.entry_file_name()
    }

    /// Whether tree shaking must keep the module's top-level side effects
    pub fn has_side_effects(&self, id: &str) -> bool {
        let id = normalize_id(id);
        let bare = without_node_modules(&id);
        self.module_side_effects
            .iter()
            .any(|prefix| id.starts_with(prefix.as_str()) || bare.starts_with(prefix.as_str()))
    }

    /// Whether a host warning should be surfaced
    pub fn on_warn(&self, code: Option<&str>, message: &str) -> bool {
        if code.map_or(false, |c| SILENCED_WARNINGS.contains(&c)) {
            return false;
        }
        !message.contains("Unsupported source map comment")
    }

    /// Warnings raised by the stages so far
    pub fn warnings(&self) -> Vec<PlanWarning> {
        self.warnings.snapshot()
    }

    /// Dependency closure of the externalized packages
    pub fn traced_packages(&self) -> Option<&TracedPackages> {
        self.tracer.as_ref().map(|tracer| tracer.trace_packages())
    }
}
