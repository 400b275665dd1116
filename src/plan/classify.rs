//! Origin classification of module ids

use serde::Serialize;

use super::roots::{Roots, INTERNAL_PREFIX, RAW_PREFIX};
use crate::utils::{has_segment, is_under};

/// Where a module comes from, derived only from its id and the root tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum OriginCategory {
    /// Generated server build output; `subdir` is the module's directory
    /// relative to the server output root
    BuildOutput { subdir: String },
    /// Framework runtime `app` directory
    RuntimeApp,
    /// Anything else inside the build directory
    BuildRoot,
    /// Anything else inside the framework runtime
    RuntimeInternal,
    DeclaredHandler,
    Asset,
    /// Bundler-internal or virtual module
    Synthetic,
    ThirdParty,
    ApplicationSource,
    Unknown,
}

/// Classify a module id. First matching rule wins; never fails.
pub fn classify(id: &str, roots: &Roots) -> OriginCategory {
    if is_under(id, &roots.build_server_dir) {
        return OriginCategory::BuildOutput {
            subdir: build_output_subdir(id, &roots.build_server_dir),
        };
    }

    if is_under(id, &roots.runtime_app_dir) {
        return OriginCategory::RuntimeApp;
    }

    if is_under(id, &roots.build_dir) {
        return OriginCategory::BuildRoot;
    }

    if is_under(id, &roots.runtime_dir) {
        return OriginCategory::RuntimeInternal;
    }

    // Handlers are often declared without an extension, so these are plain prefixes
    if roots.handler_paths.iter().any(|h| !h.is_empty() && id.starts_with(h.as_str())) {
        return OriginCategory::DeclaredHandler;
    }

    if id.starts_with(RAW_PREFIX) || has_segment(id, "assets") {
        return OriginCategory::Asset;
    }

    if id.starts_with(INTERNAL_PREFIX) {
        return OriginCategory::Synthetic;
    }

    if has_segment(id, "node_modules") {
        return OriginCategory::ThirdParty;
    }

    if is_under(id, &roots.src_dir) {
        return OriginCategory::ApplicationSource;
    }

    OriginCategory::Unknown
}

fn build_output_subdir(id: &str, server_dir: &str) -> String {
    let dir = id.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    if is_under(dir, server_dir) {
        dir[server_dir.trim_end_matches('/').len()..]
            .trim_start_matches('/')
            .to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Roots {
        Roots::new("/proj", "/proj/src", "/proj/.build", "/proj/runtime", "nitro")
            .with_handlers(vec!["/proj/src/api/hello".to_string()])
    }

    #[test]
    fn test_build_output_keeps_subdirectory() {
        assert_eq!(
            classify("/proj/.build/dist/server/pages/about.mjs", &roots()),
            OriginCategory::BuildOutput { subdir: "pages".to_string() }
        );
        assert_eq!(
            classify("/proj/.build/dist/server/server.mjs", &roots()),
            OriginCategory::BuildOutput { subdir: String::new() }
        );
    }

    #[test]
    fn test_priority_order() {
        let roots = roots();
        assert_eq!(classify("/proj/runtime/app/render.mjs", &roots), OriginCategory::RuntimeApp);
        assert_eq!(classify("/proj/.build/manifest.mjs", &roots), OriginCategory::BuildRoot);
        assert_eq!(classify("/proj/runtime/entries/node.mjs", &roots), OriginCategory::RuntimeInternal);
        assert_eq!(classify("/proj/src/api/hello.ts", &roots), OriginCategory::DeclaredHandler);
        assert_eq!(classify("/proj/src/assets/logo.svg", &roots), OriginCategory::Asset);
        assert_eq!(classify("\0raw:/proj/readme.md", &roots), OriginCategory::Asset);
        assert_eq!(classify("\0virtual:#internal/nitro/virtual/plugins", &roots), OriginCategory::Synthetic);
        assert_eq!(classify("/proj/node_modules/h3/dist/index.mjs", &roots), OriginCategory::ThirdParty);
        assert_eq!(classify("/proj/src/utils/db.ts", &roots), OriginCategory::ApplicationSource);
        assert_eq!(classify("/elsewhere/x.js", &roots), OriginCategory::Unknown);
    }

    #[test]
    fn test_directory_roots_match_whole_segments() {
        assert_eq!(classify("/proj/.build2/x.mjs", &roots()), OriginCategory::Unknown);
        assert_eq!(classify("/proj/src/my-assets-lib/x.ts", &roots()), OriginCategory::ApplicationSource);
    }

    #[test]
    fn test_classify_is_pure() {
        let roots = roots();
        let ids = [
            "/proj/.build/dist/server/a/b.mjs",
            "/proj/src/api/hello.ts",
            "\0commonjsHelpers.js",
            "",
        ];
        for id in ids {
            assert_eq!(classify(id, &roots), classify(id, &roots));
        }
    }
}
