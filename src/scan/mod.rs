//! Handler discovery
//!
//! Turns files under the source directory's `api/` and `routes/` folders
//! into route handlers.

use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{HandlerConfig, ScanConfig};
use crate::utils::path_to_module_id;

const HANDLER_EXTENSIONS: [&str; 4] = ["ts", "mjs", "js", "cjs"];

const METHODS: [&str; 9] = [
    "connect", "delete", "get", "head", "options", "patch", "post", "put", "trace",
];

static CATCH_ALL_NAMED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\.{3}(\w+)\]").expect("valid catch-all pattern"));

static PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\w+)\]").expect("valid param pattern"));

/// Discover handlers under `src_dir`, sorted by path within each folder
pub fn scan_handlers(src_dir: &Path, scan: &ScanConfig) -> Result<Vec<HandlerConfig>> {
    if !scan.enabled {
        return Ok(Vec::new());
    }

    let ignore = build_ignore(&scan.ignore)?;
    let mut handlers = Vec::new();

    for (dir, prefix) in [(&scan.api_dir, "/api"), (&scan.routes_dir, "")] {
        let base = src_dir.join(dir);
        if !base.is_dir() {
            continue;
        }

        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to scan {}", base.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(relative) = path.strip_prefix(&base).ok().map(path_to_module_id) else {
                continue;
            };
            if ignore.is_match(&relative) {
                debug!("Ignoring handler file {}", relative);
                continue;
            }

            let Some((stem, ext)) = relative.rsplit_once('.') else {
                continue;
            };
            if !HANDLER_EXTENSIONS.contains(&ext) {
                continue;
            }

            let (route, method) = route_for(stem, prefix);
            debug!("Discovered handler {} -> {}", route, path.display());

            handlers.push(HandlerConfig {
                route,
                handler: path_to_module_id(path),
                method,
                lazy: true,
                middleware: false,
            });
        }
    }

    Ok(handlers)
}

fn build_ignore(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid ignore pattern: {}", pattern))?);
    }
    builder.build().context("Failed to build ignore patterns")
}

/// Map a file stem (relative, without extension) to a route and method
fn route_for(stem: &str, prefix: &str) -> (String, Option<String>) {
    let (stem, method) = match stem.rsplit_once('.') {
        Some((rest, suffix)) if METHODS.contains(&suffix) => (rest, Some(suffix.to_string())),
        _ => (stem, None),
    };

    let stem = if stem == "index" {
        ""
    } else {
        stem.strip_suffix("/index").unwrap_or(stem)
    };
    let stem = stem.replace("[...]", "**");
    let stem = CATCH_ALL_NAMED.replace_all(&stem, "**:$1");
    let stem = PARAM.replace_all(&stem, ":$1");

    let route = match (prefix, stem.is_empty()) {
        ("", true) => "/".to_string(),
        (prefix, true) => prefix.to_string(),
        (prefix, false) => format!("{}/{}", prefix, stem),
    };

    (route, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_route_for() {
        assert_eq!(route_for("index", ""), ("/".to_string(), None));
        assert_eq!(route_for("hello", "/api"), ("/api/hello".to_string(), None));
        assert_eq!(route_for("users/index.get", "/api"), ("/api/users".to_string(), Some("get".to_string())));
        assert_eq!(route_for("users/[id]", "/api"), ("/api/users/:id".to_string(), None));
        assert_eq!(route_for("[...slug]", ""), ("/**:slug".to_string(), None));
        assert_eq!(route_for("files/[...]", ""), ("/files/**".to_string(), None));
    }

    #[test]
    fn test_scan_handlers() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path();
        for rel in ["api/hello.ts", "api/users/[id].post.ts", "api/notes.md", "routes/index.ts", "api/skip.test.ts"] {
            let path = src.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "export default () => 'ok'").unwrap();
        }

        let scan = ScanConfig {
            ignore: vec!["**/*.test.ts".to_string()],
            ..ScanConfig::default()
        };
        let handlers = scan_handlers(src, &scan).unwrap();
        let routes: Vec<_> = handlers
            .iter()
            .map(|h| (h.route.as_str(), h.method.as_deref()))
            .collect();

        assert_eq!(
            routes,
            vec![("/api/hello", None), ("/api/users/:id", Some("post")), ("/", None)]
        );
        assert!(handlers.iter().all(|h| h.lazy));
    }

    #[test]
    fn test_scan_disabled() {
        let scan = ScanConfig {
            enabled: false,
            ..ScanConfig::default()
        };
        assert!(scan_handlers(Path::new("/nonexistent"), &scan).unwrap().is_empty());
    }
}
