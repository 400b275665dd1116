use std::fs;
use std::path::Path;
use std::sync::Arc;

use bundleplan_lib::config::Config;
use bundleplan_lib::plan::classify::OriginCategory;
use bundleplan_lib::plan::PlanAssembler;
use bundleplan_lib::utils::path_to_module_id;
use bundleplan_lib::Pipeline;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "src/index.ts", "import { h } from 'h3'");
    write(root, "src/utils.ts", "export const x = 1");
    write(root, "src/api/hello.ts", "export default () => 'hi'");
    write(root, ".build/foo.mjs", "export default {}");
    write(
        root,
        "node_modules/h3/package.json",
        r#"{ "name": "h3", "version": "1.8.0", "main": "dist/index.mjs", "dependencies": { "ufo": "^1" } }"#,
    );
    write(root, "node_modules/h3/dist/index.mjs", "");
    write(root, "node_modules/ufo/package.json", r#"{ "name": "ufo", "version": "1.3.0", "main": "index.js" }"#);
    write(root, "node_modules/ufo/index.js", "");
    tmp
}

fn config(root: &Path) -> Config {
    let mut config = Config::default_config();
    config.root = root.to_path_buf();
    config.project.src_dir = "src".to_string();
    config
}

fn pipeline(config: Config) -> Arc<Pipeline> {
    PlanAssembler::new(config).unwrap().assemble().unwrap().pipeline
}

fn id(root: &Path, rel: &str) -> String {
    path_to_module_id(&root.join(rel))
}

#[tokio::test]
async fn test_packages_are_external() {
    let tmp = project();
    let pipeline = pipeline(config(tmp.path()));
    let importer = id(tmp.path(), "src/index.ts");

    let resolved = pipeline.resolve_id("h3", Some(&importer)).await.unwrap().unwrap();
    assert!(resolved.external);
    assert_eq!(resolved.id, "h3");

    let node_fs = pipeline.resolve_id("node:fs", Some(&importer)).await.unwrap().unwrap();
    assert!(node_fs.external);
    assert_eq!(node_fs.id, "node:fs");
}

#[tokio::test]
async fn test_aliases_resolve_to_sources() {
    let tmp = project();
    let pipeline = pipeline(config(tmp.path()));
    let importer = id(tmp.path(), "src/index.ts");

    let resolved = pipeline.resolve_id("~/utils", Some(&importer)).await.unwrap().unwrap();
    assert!(!resolved.external);
    assert_eq!(resolved.id, id(tmp.path(), "src/utils.ts"));
    assert_eq!(resolved.category, OriginCategory::ApplicationSource);

    let build = pipeline.resolve_id("#build/foo", Some(&importer)).await.unwrap().unwrap();
    assert_eq!(build.id, id(tmp.path(), ".build/foo.mjs"));
    assert_eq!(build.category, OriginCategory::BuildRoot);
    assert_eq!(pipeline.chunk_file_name(&[build.id]), "chunks/build/[name].mjs");
}

#[tokio::test]
async fn test_dev_build_dir_is_external() {
    let tmp = project();
    let mut config = config(tmp.path());
    config.project.dev = true;
    let pipeline = pipeline(config);

    let resolved = pipeline.resolve_id("#build/foo", None).await.unwrap().unwrap();
    assert!(resolved.external);
    assert_eq!(resolved.id, id(tmp.path(), ".build/foo"));
}

#[tokio::test]
async fn test_handler_chunks() {
    let tmp = project();
    let pipeline = pipeline(config(tmp.path()));

    let members = vec![
        id(tmp.path(), "node_modules/h3/dist/index.mjs"),
        id(tmp.path(), "src/utils.ts"),
        id(tmp.path(), "src/api/hello.ts"),
    ];
    assert_eq!(pipeline.chunk_file_name(&members), "chunks/handlers/[name].mjs");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_decisions_agree() {
    let tmp = project();
    let pipeline = pipeline(config(tmp.path()));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            pipeline.resolve_id("h3", None).await.unwrap().unwrap()
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(pipeline.decide("h3", None), Some(bundleplan_lib::plan::externals::ExternalizationVerdict::external("h3")));
}

#[tokio::test]
async fn test_trace_follows_dependencies() {
    let tmp = project();
    let pipeline = pipeline(config(tmp.path()));

    pipeline.resolve_id("h3", None).await.unwrap();
    pipeline.run_build_end().await.unwrap();

    let traced = pipeline.traced_packages().unwrap();
    assert_eq!(traced.names().collect::<Vec<_>>(), vec!["h3", "ufo"]);
    assert_eq!(traced.packages["h3"].version.as_deref(), Some("1.8.0"));
}

#[tokio::test]
async fn test_inline_list_keeps_package_bundled() {
    let tmp = project();
    let mut config = config(tmp.path());
    config.externals.inline = vec!["h3".to_string()];
    let pipeline = pipeline(config);

    let resolved = pipeline.resolve_id("h3", None).await.unwrap().unwrap();
    assert!(!resolved.external);
    assert_eq!(resolved.id, id(tmp.path(), "node_modules/h3/dist/index.mjs"));
    assert_eq!(resolved.category, OriginCategory::ThirdParty);
}

#[tokio::test]
async fn test_no_externals_rejects_missing_modules() {
    let tmp = project();
    let mut config = config(tmp.path());
    config.externals.enabled = false;
    let pipeline = pipeline(config);
    let importer = id(tmp.path(), "src/index.ts");

    let bundled = pipeline.resolve_id("h3", Some(&importer)).await.unwrap().unwrap();
    assert!(!bundled.external);

    let err = pipeline.resolve_id("left-pad", Some(&importer)).await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("\"left-pad\""));
    assert!(message.contains(&importer));
    assert!(message.contains("externals are not allowed"));
    assert!(pipeline.traced_packages().is_none());
}

#[tokio::test]
async fn test_virtual_modules_load() {
    let tmp = project();
    let mut config = config(tmp.path());
    config.virtual_modules.insert("#config".to_string(), "export default 1".to_string());
    let pipeline = pipeline(config);

    let resolved = pipeline.resolve_id("#config", None).await.unwrap().unwrap();
    assert_eq!(resolved.category, OriginCategory::Synthetic);
    let (source, loader) = pipeline.load(&resolved.id).await.unwrap().unwrap();
    assert_eq!(&*source, "export default 1");
    assert_eq!(loader.as_deref(), Some("js"));

    let handlers = pipeline
        .resolve_id("#internal/nitro/virtual/server-handlers", None)
        .await
        .unwrap()
        .unwrap();
    let (table, _) = pipeline.load(&handlers.id).await.unwrap().unwrap();
    assert!(table.contains("route: \"/api/hello\""));
    assert!(table.contains("() => import("));
}
