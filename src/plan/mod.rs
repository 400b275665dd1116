//! Build plan assembly
//!
//! Turns a project configuration into a [`BuildPlan`] the host bundler
//! executes, together with the [`Pipeline`] that answers its resolve, load
//! and naming questions during the build.

pub mod alias;
pub mod chunk;
pub mod classify;
pub mod env;
pub mod externals;
pub mod handlers;
pub mod preset;
pub mod roots;
pub mod virtual_fs;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::{Config, InjectSpec};
use crate::error::{PlanWarning, Warnings};
use crate::plugins::{AliasStage, ExternalsStage, NoExternalsStage, NodeResolveStage, Pipeline, VirtualStage};
use crate::resolver::{Resolver, EXTENSIONS};
use crate::scan::scan_handlers;
use crate::utils::{clean_path, path_to_module_id};

use self::alias::{AliasEntry, AliasTable};
use self::chunk::{ChunkNamer, CHUNKS_DIR};
use self::env::BuildEnv;
use self::externals::{ExternalsOptions, ExternalsTracer, NoExternalsGuard};
use self::handlers::{handlers_module, ServerHandler};
use self::preset::EnvPreset;
use self::roots::Roots;
use self::virtual_fs::{plugins_module, polyfill_module, VirtualOverlay, VirtualOverlayBuilder, HANDLERS_ID, PLUGINS_ID, POLYFILL_ID};

/// Files in the server build output that are never inlined by dynamic require
const DYNAMIC_REQUIRE_IGNORE: [&str; 5] = [
    "client.manifest.mjs",
    "server.js",
    "server.cjs",
    "server.mjs",
    "server.manifest.mjs",
];

/// Polyfill added when source maps are enabled
const SOURCE_MAP_SUPPORT: &str = "source-map-support/register.js";

/// Inline prefixes every traced build starts from
const INLINE_PREFIXES: [&str; 6] = ["#", "~", "@/", "~~", "@@/", "virtual:"];

/// A stage the host runs, in plan order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDescriptor {
    pub name: String,
    /// Executed by the planner's own pipeline
    pub core: bool,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

impl StageDescriptor {
    fn core(name: &str, options: Value) -> Self {
        Self {
            name: name.to_string(),
            core: true,
            options,
        }
    }

    fn host(name: &str, options: Value) -> Self {
        Self {
            name: name.to_string(),
            core: false,
            options,
        }
    }
}

/// Output options of the server bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPlan {
    pub dir: String,
    pub entry_file_names: String,
    /// Per-group chunk templates, `chunks/<group>/[name].<ext>`
    pub chunk_file_names: String,
    pub format: String,
    pub exports: String,
    pub inline_dynamic_imports: bool,
    pub prefer_const: bool,
    pub sourcemap: bool,
    pub sourcemap_exclude_sources: bool,
    pub minify: bool,
}

/// How imports are split between bundle and runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalsMode {
    /// Packages are mapped back to their names and traced
    Traced,
    /// Externals are imported by resolved path
    Untraced,
    /// Everything is bundled; unresolvable imports are fatal
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalsPlan {
    pub mode: ExternalsMode,
    pub inline: Vec<String>,
    pub external: Vec<String>,
    pub module_directories: Vec<String>,
    pub export_conditions: Vec<String>,
}

/// Everything the host needs to run the server build
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPlan {
    pub name: String,
    pub input: String,
    pub roots: Roots,
    pub output: OutputPlan,
    pub externals: ExternalsPlan,
    pub stages: Vec<StageDescriptor>,
    pub aliases: Vec<AliasEntry>,
    pub virtual_modules: BTreeSet<String>,
    /// Plugin loader bindings, binding -> plugin path
    pub plugins: BTreeMap<String, String>,
    pub handlers: Vec<ServerHandler>,
    pub build_env: Map<String, Value>,
    pub replacements: BTreeMap<String, String>,
    pub inject: BTreeMap<String, InjectSpec>,
    pub polyfill: Vec<String>,
    pub runtime_external: Vec<String>,
    pub module_side_effects: Vec<String>,
    pub warnings: Vec<PlanWarning>,
}

impl BuildPlan {
    /// Names of the stages, in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A plan and the pipeline that serves it
pub struct AssembledPlan {
    pub plan: BuildPlan,
    pub pipeline: Arc<Pipeline>,
}

/// Assembles the build plan for one project
pub struct PlanAssembler {
    config: Config,
}

impl PlanAssembler {
    /// Create an assembler; a relative project root is taken from the
    /// current directory
    pub fn new(mut config: Config) -> Result<Self> {
        if config.root.is_relative() {
            config.root = std::env::current_dir()
                .context("Failed to determine current directory")?
                .join(&config.root);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Assemble the plan. Any fatal error aborts assembly as a whole.
    pub fn assemble(&self) -> Result<AssembledPlan> {
        let config = &self.config;
        let warnings = Arc::new(Warnings::new());

        let handlers = self.collect_handlers()?;
        let roots = Arc::new(Roots::from_config(
            config,
            handlers.iter().map(|h| h.handler.clone()).collect(),
        ));
        debug!("Roots: {:?}", roots);

        let preset = Arc::new(self.env_preset());
        let aliases = Arc::new(
            AliasTable::build(self.fixed_aliases()?, &preset.alias, &self.user_aliases())
                .context("Failed to build alias table")?,
        );

        let overlay = Arc::new(self.overlay(&preset, &handlers, &warnings)?);

        let conditions = Resolver::export_conditions(config.project.dev);
        let resolver = Arc::new(Resolver::new(config.module_directories(), conditions.clone()));

        let externals = self.externals_plan(&roots, conditions);

        let runtime_config = serde_json::to_value(&config.runtime_config)
            .context("Failed to encode runtime_config")?;
        let build_env = BuildEnv::new(config.project.dev, &config.project.preset, runtime_config);
        let replacements = build_env.replacements(&config.replace);

        let chunks = ChunkNamer::new(roots.clone(), config.output.ext.clone(), config.output.chunk_ordering);
        let mut pipeline = Pipeline::new(roots.clone(), chunks, warnings.clone())
            .with_module_side_effects(config.module_side_effects.clone());

        pipeline.register(Arc::new(VirtualStage::new(overlay.clone())));
        pipeline.register(Arc::new(AliasStage::new(aliases.clone())));

        if externals.mode == ExternalsMode::Disabled {
            let guard = NoExternalsGuard::new(resolver.clone(), preset.clone());
            pipeline.register(Arc::new(NoExternalsStage::new(guard)));
        } else {
            let options = ExternalsOptions {
                inline: externals.inline.clone(),
                external: externals.external.clone(),
                trace: externals.mode == ExternalsMode::Traced,
                preset: preset.clone(),
            };
            let tracer = Arc::new(ExternalsTracer::new(options, resolver.clone(), warnings.clone()));
            pipeline.register(Arc::new(ExternalsStage::new(tracer.clone())));
            pipeline = pipeline.with_tracer(tracer);
        }

        pipeline.register(Arc::new(NodeResolveStage::new(resolver)));

        let stages = self.stage_descriptors(&roots, &handlers, &replacements, &externals, &preset)?;

        let plan = BuildPlan {
            name: config.project.name.clone(),
            input: path_to_module_id(&config.entry_path()),
            output: self.output_plan(),
            externals,
            stages,
            aliases: aliases.entries().to_vec(),
            virtual_modules: overlay.list(),
            plugins: overlay.meta(PLUGINS_ID).cloned().unwrap_or_default(),
            handlers,
            build_env: build_env.values().clone(),
            replacements,
            inject: preset.inject.clone(),
            polyfill: preset.polyfill.clone(),
            runtime_external: preset.external.clone(),
            module_side_effects: config.module_side_effects.clone(),
            warnings: warnings.snapshot(),
            roots: (*roots).clone(),
        };

        info!(
            "Planned {} stages, {} handlers, {} virtual modules",
            plan.stages.len(),
            plan.handlers.len(),
            plan.virtual_modules.len()
        );

        Ok(AssembledPlan {
            plan,
            pipeline: Arc::new(pipeline),
        })
    }

    /// Declared handlers followed by discovered ones
    fn collect_handlers(&self) -> Result<Vec<ServerHandler>> {
        let config = &self.config;
        let scanned = scan_handlers(&config.src_dir(), &config.scan)?;
        debug!("Discovered {} handlers", scanned.len());

        Ok(config
            .handlers
            .iter()
            .chain(scanned.iter())
            .map(|h| ServerHandler::from_config(h, config))
            .collect())
    }

    /// Node or nodeless base, then built-in aliases, then user overrides
    fn env_preset(&self) -> EnvPreset {
        let base = if self.config.project.node {
            EnvPreset::node()
        } else {
            EnvPreset::nodeless()
        };
        let mut preset = EnvPreset::merge([&base, &EnvPreset::builtin(), &EnvPreset::from(&self.config.unenv)]);

        if self.config.project.source_map && !preset.polyfill.iter().any(|p| p == SOURCE_MAP_SUPPORT) {
            preset.polyfill.push(SOURCE_MAP_SUPPORT.to_string());
        }
        preset
    }

    fn fixed_aliases(&self) -> Result<Vec<(String, String)>> {
        let config = &self.config;
        let src_dir = dir_id(&config.src_dir());
        let root_dir = dir_id(&config.root);

        Ok(vec![
            ("#build".to_string(), self.build_dir_alias()?),
            (
                "#internal/nitro/virtual/error-handler".to_string(),
                dir_id(&config.error_handler_path()),
            ),
            ("~".to_string(), src_dir.clone()),
            ("@/".to_string(), src_dir),
            ("~~".to_string(), root_dir.clone()),
            ("@@/".to_string(), root_dir),
        ])
    }

    /// Native dynamic imports on Windows need `file://` URLs when the build
    /// dir is imported by path
    fn build_dir_alias(&self) -> Result<String> {
        let config = &self.config;
        let build_dir = config.build_dir();
        if cfg!(windows) && !config.externals.trace && config.project.dev {
            let url = url::Url::from_file_path(&build_dir)
                .map_err(|_| anyhow::anyhow!("Invalid build directory: {}", build_dir.display()))?;
            return Ok(url.to_string());
        }
        Ok(dir_id(&build_dir))
    }

    /// User aliases; relative targets are taken from the project root
    fn user_aliases(&self) -> BTreeMap<String, String> {
        self.config
            .alias
            .iter()
            .map(|(prefix, target)| {
                let target = if target.starts_with("./") || target.starts_with("../") {
                    dir_id(&self.config.root.join(target))
                } else {
                    target.clone()
                };
                (prefix.clone(), target)
            })
            .collect()
    }

    /// Register the generated and user modules, then freeze the overlay
    fn overlay(&self, preset: &EnvPreset, handlers: &[ServerHandler], warnings: &Warnings) -> Result<VirtualOverlay> {
        let mut builder = VirtualOverlayBuilder::new();

        builder.register(POLYFILL_ID, polyfill_module(&preset.polyfill));

        for (id, source) in &self.config.virtual_modules {
            builder.register(id.clone(), source.clone());
        }

        let table = handlers.to_vec();
        builder.register(
            HANDLERS_ID,
            virtual_fs::VirtualSource::Generated(Arc::new(move || handlers_module(&table))),
        );

        let plugins: Vec<String> = self.config.plugins.iter().map(|p| self.plugin_path(p)).collect();
        let loader = plugins_module(&plugins).context("Failed to generate plugin loader")?;
        warnings.extend(loader.warnings);
        builder.register_with_meta(PLUGINS_ID, loader.source, loader.bindings);

        Ok(builder.freeze())
    }

    /// Relative plugin paths are taken from the source directory
    fn plugin_path(&self, plugin: &str) -> String {
        if plugin.starts_with('.') {
            dir_id(&self.config.src_dir().join(plugin))
        } else {
            plugin.to_string()
        }
    }

    fn externals_plan(&self, roots: &Roots, export_conditions: Vec<String>) -> ExternalsPlan {
        let config = &self.config;
        let mode = match (config.externals.enabled, config.externals.trace) {
            (false, _) => ExternalsMode::Disabled,
            (true, true) => ExternalsMode::Traced,
            (true, false) => ExternalsMode::Untraced,
        };

        let mut inline = config.externals.inline.clone();
        inline.extend(INLINE_PREFIXES.iter().map(|p| p.to_string()));
        inline.push(roots.runtime_dir.clone());
        inline.push(roots.src_dir.clone());
        inline.extend(roots.handler_paths.iter().cloned());

        let mut external = config.externals.external.clone();
        if config.project.dev {
            external.push(roots.build_dir.clone());
        }

        ExternalsPlan {
            mode,
            inline,
            external,
            module_directories: config.module_directories().iter().map(|d| dir_id(d)).collect(),
            export_conditions,
        }
    }

    fn output_plan(&self) -> OutputPlan {
        let config = &self.config;
        OutputPlan {
            dir: dir_id(&config.server_output_dir()),
            entry_file_names: format!("index.{}", config.output.ext),
            chunk_file_names: format!("{}/<group>/[name].{}", CHUNKS_DIR, config.output.ext),
            format: "esm".to_string(),
            exports: "auto".to_string(),
            inline_dynamic_imports: config.project.inline_dynamic_imports,
            prefer_const: true,
            sourcemap: config.project.source_map,
            sourcemap_exclude_sources: true,
            minify: config.project.minify,
        }
    }

    fn stage_descriptors(
        &self,
        roots: &Roots,
        handlers: &[ServerHandler],
        replacements: &BTreeMap<String, String>,
        externals: &ExternalsPlan,
        preset: &EnvPreset,
    ) -> Result<Vec<StageDescriptor>> {
        let project = &self.config.project;
        let mut stages = Vec::new();

        if project.timing {
            stages.push(StageDescriptor::host("timing", Value::Null));
        }
        stages.push(StageDescriptor::host("raw", Value::Null));
        if project.wasm {
            stages.push(StageDescriptor::host("wasm", Value::Null));
        }
        stages.push(StageDescriptor::host("import-meta", Value::Null));
        stages.push(StageDescriptor::host(
            "replace",
            json!({ "preventAssignment": true, "values": replacements }),
        ));
        stages.push(StageDescriptor::host(
            "esbuild",
            json!({ "target": "es2019", "sourceMap": project.source_map }),
        ));
        stages.push(StageDescriptor::host(
            "dynamic-require",
            json!({
                "dir": roots.build_server_dir,
                "inline": !project.node || project.inline_dynamic_imports,
                "ignore": DYNAMIC_REQUIRE_IGNORE,
            }),
        ));
        stages.push(StageDescriptor::host("server-assets", Value::Null));
        stages.push(StageDescriptor::host("public-assets", Value::Null));
        stages.push(StageDescriptor::host("storage", Value::Null));
        stages.push(StageDescriptor::host(
            "handlers",
            json!({
                "module": HANDLERS_ID,
                "handlers": serde_json::to_value(handlers).context("Failed to encode handler table")?,
            }),
        ));
        stages.push(StageDescriptor::core("virtual", Value::Null));
        stages.push(StageDescriptor::core("alias", Value::Null));
        stages.push(match externals.mode {
            ExternalsMode::Disabled => StageDescriptor::core("no-externals", Value::Null),
            _ => StageDescriptor::core(
                "externals",
                json!({ "inline": externals.inline, "external": externals.external }),
            ),
        });

        let mut module_directories = vec!["node_modules".to_string()];
        module_directories.extend(externals.module_directories.iter().cloned());
        stages.push(StageDescriptor::core(
            "node-resolve",
            json!({
                "extensions": EXTENSIONS.iter().map(|e| format!(".{}", e)).collect::<Vec<_>>(),
                "preferBuiltins": project.node,
                "rootDir": roots.root_dir,
                "moduleDirectories": module_directories,
                "mainFields": ["main"],
                "exportConditions": externals.export_conditions,
            }),
        ));

        stages.push(StageDescriptor::host(
            "commonjs",
            json!({ "requireReturnsDefault": "auto", "esmExternalsExclude": ["unenv/"] }),
        ));
        stages.push(StageDescriptor::host("json", Value::Null));
        stages.push(StageDescriptor::host(
            "inject",
            serde_json::to_value(&preset.inject).context("Failed to encode inject table")?,
        ));
        if project.minify {
            stages.push(StageDescriptor::host(
                "terser",
                json!({
                    "mangle": { "keep_fnames": true, "keep_classnames": true },
                    "format": { "comments": false },
                }),
            ));
        }
        if project.analyze {
            stages.push(StageDescriptor::host(
                "visualizer",
                json!({
                    "filename": format!("{}/stats.html", roots.build_dir),
                    "title": format!("{} server bundle stats", project.runtime_name),
                }),
            ));
        }

        Ok(stages)
    }
}

/// Source map sources are resolved next to the map file
pub fn sourcemap_path_transform(relative_path: &str, sourcemap_path: &str) -> String {
    let dir = sourcemap_path.rsplit_once('/').map_or("", |(dir, _)| dir);
    if relative_path.starts_with('/') {
        return clean_path(relative_path);
    }
    clean_path(&format!("{}/{}", dir, relative_path))
}

fn dir_id(path: &Path) -> String {
    clean_path(&path_to_module_id(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlerConfig;
    use crate::plan::classify::OriginCategory;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn project(tmp: &TempDir) -> Config {
        let mut config = Config::default_config();
        config.root = tmp.path().to_path_buf();
        config.project.src_dir = "src".to_string();
        config.plugins = vec!["./plugins/db.ts".to_string(), "@nitro/sentry".to_string()];
        config.handlers = vec![HandlerConfig {
            route: "/health".to_string(),
            handler: "health.ts".to_string(),
            method: Some("GET".to_string()),
            lazy: false,
            middleware: false,
        }];
        config.virtual_modules.insert("#config".to_string(), "export default {}".to_string());
        config
    }

    #[test]
    fn test_stage_order() {
        let tmp = TempDir::new().unwrap();
        let assembled = PlanAssembler::new(project(&tmp)).unwrap().assemble().unwrap();

        assert_eq!(
            assembled.plan.stage_names(),
            vec![
                "raw", "import-meta", "replace", "esbuild", "dynamic-require", "server-assets",
                "public-assets", "storage", "handlers", "virtual", "alias", "externals",
                "node-resolve", "commonjs", "json", "inject",
            ]
        );
        assert_eq!(
            assembled.pipeline.stage_names(),
            vec!["virtual", "alias", "externals", "node-resolve"]
        );
    }

    #[test]
    fn test_optional_stages() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.project.timing = true;
        config.project.wasm = true;
        config.project.minify = true;
        config.project.analyze = true;
        config.externals.enabled = false;

        let plan = PlanAssembler::new(config).unwrap().assemble().unwrap().plan;
        let names = plan.stage_names();
        assert_eq!(names.first(), Some(&"timing"));
        assert_eq!(names[2], "wasm");
        assert!(names.contains(&"no-externals"));
        assert!(!names.contains(&"externals"));
        assert_eq!(&names[names.len() - 2..], &["terser", "visualizer"]);
        assert_eq!(plan.externals.mode, ExternalsMode::Disabled);
    }

    #[test]
    fn test_virtual_modules_registered() {
        let tmp = TempDir::new().unwrap();
        let plan = PlanAssembler::new(project(&tmp)).unwrap().assemble().unwrap().plan;

        let ids: Vec<_> = plan.virtual_modules.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["#config", PLUGINS_ID, POLYFILL_ID, HANDLERS_ID]);
        assert_eq!(plan.handlers[0].method.as_deref(), Some("get"));
    }

    #[tokio::test]
    async fn test_plugin_loader_is_served() {
        let tmp = TempDir::new().unwrap();
        let assembled = PlanAssembler::new(project(&tmp)).unwrap().assemble().unwrap();
        let pipeline = assembled.pipeline;

        let resolved = pipeline.resolve_id(PLUGINS_ID, None).await.unwrap().unwrap();
        assert_eq!(resolved.id, VirtualOverlay::virtual_id(PLUGINS_ID));

        let (source, _) = pipeline.load(&resolved.id).await.unwrap().unwrap();
        let db = dir_id(&tmp.path().join("src/plugins/db.ts"));
        let db_import = source.find(&db).unwrap();
        let sentry_import = source.find("@nitro/sentry").unwrap();
        assert!(db_import < sentry_import);
        assert!(source.contains("export const plugins = ["));
    }

    #[test]
    fn test_plugin_bindings_in_plan() {
        let tmp = TempDir::new().unwrap();
        let plan = PlanAssembler::new(project(&tmp)).unwrap().assemble().unwrap().plan;

        let paths: Vec<_> = plan.plugins.values().map(String::as_str).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"@nitro/sentry"));
        assert!(plan.plugins.keys().all(|binding| binding.starts_with('_')));
    }

    #[test]
    fn test_dot_prefixed_handler_gets_handler_chunk() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.handlers[0].handler = "./api/x.ts".to_string();

        let assembled = PlanAssembler::new(config).unwrap().assemble().unwrap();
        let file = dir_id(&tmp.path().join("src/api/x.ts"));
        assert_eq!(assembled.plan.handlers[0].handler, file);
        assert_eq!(assembled.pipeline.classify(&file), OriginCategory::DeclaredHandler);
        assert!(assembled
            .pipeline
            .chunk_file_name(std::slice::from_ref(&file))
            .starts_with("chunks/handlers/"));
    }

    #[test]
    fn test_dev_builds_externalize_build_dir() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);

        let prod = PlanAssembler::new(config.clone()).unwrap().assemble().unwrap().plan;
        assert!(prod.externals.external.is_empty());
        assert_eq!(prod.build_env["NODE_ENV"], json!("production"));

        config.project.dev = true;
        let dev = PlanAssembler::new(config).unwrap().assemble().unwrap().plan;
        assert_eq!(dev.externals.external, vec![dev.roots.build_dir.clone()]);
        assert_eq!(dev.externals.export_conditions[1], "development");
    }

    #[test]
    fn test_inline_prefixes() {
        let tmp = TempDir::new().unwrap();
        let plan = PlanAssembler::new(project(&tmp)).unwrap().assemble().unwrap().plan;

        let inline = &plan.externals.inline;
        assert_eq!(&inline[..6], &INLINE_PREFIXES.map(String::from));
        assert!(inline.contains(&plan.roots.runtime_dir));
        assert!(inline.contains(&plan.roots.src_dir));
        assert!(inline.contains(&plan.handlers[0].handler));
    }

    #[test]
    fn test_source_map_polyfill() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.project.source_map = true;

        let plan = PlanAssembler::new(config).unwrap().assemble().unwrap().plan;
        assert_eq!(plan.polyfill, vec![SOURCE_MAP_SUPPORT.to_string()]);
        assert!(plan.output.sourcemap);
    }

    #[test]
    fn test_nodeless_preset() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.project.node = false;

        let plan = PlanAssembler::new(config).unwrap().assemble().unwrap().plan;
        assert!(plan.runtime_external.is_empty());
        assert!(plan.inject.contains_key("process"));
        assert!(plan.aliases.iter().any(|a| a.prefix == "node:fs"));
    }

    #[test]
    fn test_scanned_handlers_follow_declared_ones() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("src/api/hello.ts");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "export default () => 'hi'").unwrap();

        let plan = PlanAssembler::new(project(&tmp)).unwrap().assemble().unwrap().plan;
        let routes: Vec<_> = plan.handlers.iter().map(|h| h.route.as_str()).collect();
        assert_eq!(routes, vec!["/health", "/api/hello"]);
    }

    #[test]
    fn test_relative_user_alias_targets() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.alias.insert("#shared".to_string(), "./shared".to_string());

        let plan = PlanAssembler::new(config).unwrap().assemble().unwrap().plan;
        let entry = plan.aliases.iter().find(|a| a.prefix == "#shared").unwrap();
        assert_eq!(entry.target, dir_id(&tmp.path().join("shared")));
    }

    #[test]
    fn test_ambiguous_alias_aborts_assembly() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.alias.insert("~~".to_string(), "/elsewhere".to_string());

        assert!(PlanAssembler::new(config).unwrap().assemble().is_err());
    }

    #[test]
    fn test_sourcemap_path_transform() {
        assert_eq!(
            sourcemap_path_transform("../../src/index.ts", "/proj/.output/server/index.mjs.map"),
            "/proj/src/index.ts"
        );
        assert_eq!(sourcemap_path_transform("/abs/x.ts", "/proj/out/a.map"), "/abs/x.ts");
    }
}
