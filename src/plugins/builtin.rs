//! Stages the planner runs itself

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{LoadResult, PluginContext, ResolveResult, Stage};
use crate::plan::alias::AliasTable;
use crate::plan::externals::{ExternalizationVerdict, ExternalsTracer, NoExternalsGuard};
use crate::plan::roots::INTERNAL_PREFIX;
use crate::plan::virtual_fs::VirtualOverlay;
use crate::resolver::Resolver;
use crate::utils::{clean_path, path_to_module_id};

/// Serves modules registered in the frozen overlay
pub struct VirtualStage {
    overlay: Arc<VirtualOverlay>,
}

impl VirtualStage {
    pub fn new(overlay: Arc<VirtualOverlay>) -> Self {
        Self { overlay }
    }
}

#[async_trait]
impl Stage for VirtualStage {
    fn name(&self) -> &str {
        "virtual"
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&str>,
        _ctx: &PluginContext,
    ) -> Result<ResolveResult> {
        if self.overlay.contains(specifier) {
            Ok(ResolveResult::Resolved(VirtualOverlay::virtual_id(specifier)))
        } else {
            Ok(ResolveResult::Skip)
        }
    }

    async fn load(&self, id: &str, _ctx: &PluginContext) -> Result<LoadResult> {
        match self.overlay.load(id) {
            Some(content) => Ok(LoadResult::Loaded {
                content,
                loader: Some("js".to_string()),
            }),
            None => Ok(LoadResult::Skip),
        }
    }
}

/// Rewrites symbolic prefixes
pub struct AliasStage {
    table: Arc<AliasTable>,
}

impl AliasStage {
    pub fn new(table: Arc<AliasTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Stage for AliasStage {
    fn name(&self) -> &str {
        "alias"
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&str>,
        _ctx: &PluginContext,
    ) -> Result<ResolveResult> {
        let rewritten = self.table.resolve(specifier);
        if rewritten == specifier {
            Ok(ResolveResult::Skip)
        } else {
            Ok(ResolveResult::Rewrite(rewritten.into_owned()))
        }
    }
}

/// Leaves packages to the runtime's module directories
pub struct ExternalsStage {
    tracer: Arc<ExternalsTracer>,
}

impl ExternalsStage {
    pub fn new(tracer: Arc<ExternalsTracer>) -> Self {
        Self { tracer }
    }
}

#[async_trait]
impl Stage for ExternalsStage {
    fn name(&self) -> &str {
        "externals"
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        _ctx: &PluginContext,
    ) -> Result<ResolveResult> {
        match self.tracer.decide(specifier, importer) {
            ExternalizationVerdict::External { id } => Ok(ResolveResult::External(id)),
            ExternalizationVerdict::Inline => Ok(ResolveResult::Skip),
        }
    }

    async fn build_end(&self, _ctx: &PluginContext) -> Result<()> {
        let traced = self.tracer.trace_packages();
        info!(
            "{} external packages: {}",
            traced.packages.len(),
            traced.names().collect::<Vec<_>>().join(", ")
        );
        Ok(())
    }
}

/// Fails the build on any import that cannot be bundled from disk
pub struct NoExternalsStage {
    guard: NoExternalsGuard,
}

impl NoExternalsStage {
    pub fn new(guard: NoExternalsGuard) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Stage for NoExternalsStage {
    fn name(&self) -> &str {
        "no-externals"
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        ctx: &PluginContext,
    ) -> Result<ResolveResult> {
        if specifier.starts_with(INTERNAL_PREFIX) {
            return Ok(ResolveResult::Skip);
        }
        let specifier = entry_specifier(specifier, importer, ctx);
        let resolved = self.guard.check(&specifier, importer)?;
        Ok(ResolveResult::Resolved(resolved))
    }
}

/// Resolves to files on disk
pub struct NodeResolveStage {
    resolver: Arc<Resolver>,
}

impl NodeResolveStage {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Stage for NodeResolveStage {
    fn name(&self) -> &str {
        "node-resolve"
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        ctx: &PluginContext,
    ) -> Result<ResolveResult> {
        if specifier.starts_with(INTERNAL_PREFIX) {
            return Ok(ResolveResult::Skip);
        }
        let specifier = entry_specifier(specifier, importer, ctx);
        match self.resolver.resolve(&specifier, importer.map(Path::new))? {
            Some(path) => Ok(ResolveResult::Resolved(path_to_module_id(&path))),
            None => Ok(ResolveResult::Skip),
        }
    }
}

/// Relative entries carry no importer and are taken from the project root
fn entry_specifier<'a>(specifier: &'a str, importer: Option<&str>, ctx: &PluginContext) -> Cow<'a, str> {
    if importer.is_none() && specifier.starts_with('.') {
        Cow::Owned(clean_path(&path_to_module_id(&ctx.root.join(specifier))))
    } else {
        Cow::Borrowed(specifier)
    }
}
