//! Output chunk naming

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::classify::{classify, OriginCategory};
use super::roots::Roots;
use crate::config::ChunkOrdering;
use crate::utils::sanitize_file_name;

/// Directory every non-entry chunk is written under
pub const CHUNKS_DIR: &str = "chunks";

/// A group of modules the host bundler decided to emit as one file
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name (used for output filename)
    pub name: String,

    /// Member module ids, in the order the host presented them
    pub module_ids: Vec<String>,
}

impl Chunk {
    pub fn new(name: impl Into<String>, module_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            module_ids,
        }
    }

    /// Check if chunk is empty
    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }
}

/// Output subdirectory of a chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum ChunkGroup {
    /// `app/<subdir>` for server build output, `app` for the runtime app
    App(String),
    Build,
    /// Framework runtime, named after the runtime
    Runtime(String),
    Handlers,
    Raw,
    /// Bundler-internal helpers
    Internal,
    Ungrouped,
}

impl ChunkGroup {
    pub fn for_category(category: &OriginCategory, roots: &Roots) -> Self {
        match category {
            OriginCategory::BuildOutput { subdir } => ChunkGroup::App(subdir.clone()),
            OriginCategory::RuntimeApp => ChunkGroup::App(String::new()),
            OriginCategory::BuildRoot => ChunkGroup::Build,
            OriginCategory::RuntimeInternal => ChunkGroup::Runtime(roots.runtime_name.clone()),
            OriginCategory::DeclaredHandler => ChunkGroup::Handlers,
            OriginCategory::Asset => ChunkGroup::Raw,
            OriginCategory::Synthetic => ChunkGroup::Internal,
            OriginCategory::ThirdParty
            | OriginCategory::ApplicationSource
            | OriginCategory::Unknown => ChunkGroup::Ungrouped,
        }
    }

    /// Relative directory under `chunks/`; empty for ungrouped chunks
    pub fn dir(&self) -> String {
        match self {
            ChunkGroup::App(subdir) if subdir.is_empty() => "app".to_string(),
            ChunkGroup::App(subdir) => format!("app/{}", subdir),
            ChunkGroup::Build => "build".to_string(),
            ChunkGroup::Runtime(name) => name.clone(),
            ChunkGroup::Handlers => "handlers".to_string(),
            ChunkGroup::Raw => "raw".to_string(),
            ChunkGroup::Internal => "rollup".to_string(),
            ChunkGroup::Ungrouped => String::new(),
        }
    }
}

impl fmt::Display for ChunkGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir())
    }
}

impl From<ChunkGroup> for String {
    fn from(group: ChunkGroup) -> Self {
        group.dir()
    }
}

/// Assigns output paths to chunks from their representative member
#[derive(Debug, Clone)]
pub struct ChunkNamer {
    roots: Arc<Roots>,
    ext: String,
    ordering: ChunkOrdering,
}

impl ChunkNamer {
    pub fn new(roots: Arc<Roots>, ext: impl Into<String>, ordering: ChunkOrdering) -> Self {
        Self {
            roots,
            ext: ext.into(),
            ordering,
        }
    }

    /// File name of the single bundle entry
    pub fn entry_file_name(&self) -> String {
        format!("index.{}", self.ext)
    }

    /// The member that names the chunk: the last one presented, or the
    /// greatest one when members are sorted first
    pub fn representative<'a>(&self, module_ids: &'a [String]) -> Option<&'a str> {
        match self.ordering {
            ChunkOrdering::Host => module_ids.last(),
            ChunkOrdering::Sorted => module_ids.iter().max(),
        }
        .map(String::as_str)
    }

    pub fn group(&self, module_ids: &[String]) -> ChunkGroup {
        match self.representative(module_ids) {
            Some(id) => ChunkGroup::for_category(&classify(id, &self.roots), &self.roots),
            None => ChunkGroup::Ungrouped,
        }
    }

    /// Output template with a `[name]` placeholder left for the host
    pub fn file_template(&self, module_ids: &[String]) -> String {
        self.path_for(&self.group(module_ids), "[name]")
    }

    /// Full relative output path of a chunk
    pub fn assign(&self, chunk: &Chunk) -> String {
        let name = sanitize_file_name(&chunk.name);
        self.path_for(&self.group(&chunk.module_ids), &name)
    }

    fn path_for(&self, group: &ChunkGroup, name: &str) -> String {
        let dir = group.dir();
        let file = format!("{}.{}", name, self.ext);
        [CHUNKS_DIR, dir.as_str(), file.as_str()]
            .iter()
            .filter(|segment| !segment.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namer(ordering: ChunkOrdering) -> ChunkNamer {
        let roots = Roots::new("/proj", "/proj/src", "/proj/.build", "/proj/runtime", "nitro")
            .with_handlers(vec!["/proj/src/api/hello".to_string()]);
        ChunkNamer::new(Arc::new(roots), "mjs", ordering)
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_last_member_names_the_chunk() {
        let chunk = Chunk::new(
            "hello",
            ids(&["/proj/node_modules/h3/index.mjs", "/proj/src/utils.ts", "/proj/src/api/hello.ts"]),
        );
        let path = namer(ChunkOrdering::Host).assign(&chunk);
        assert!(path.starts_with("chunks/handlers/"));
        assert_eq!(path, "chunks/handlers/hello.mjs");
    }

    #[test]
    fn test_group_table() {
        let namer = namer(ChunkOrdering::Host);
        let cases = [
            ("/proj/.build/dist/server/pages/index.mjs", "chunks/app/pages/[name].mjs"),
            ("/proj/.build/dist/server/server.mjs", "chunks/app/[name].mjs"),
            ("/proj/runtime/app/render.mjs", "chunks/app/[name].mjs"),
            ("/proj/.build/virtual.mjs", "chunks/build/[name].mjs"),
            ("/proj/runtime/cache.mjs", "chunks/nitro/[name].mjs"),
            ("/proj/public/assets/a.txt", "chunks/raw/[name].mjs"),
            ("\0commonjsHelpers.js", "chunks/rollup/[name].mjs"),
            ("/proj/node_modules/h3/index.mjs", "chunks/[name].mjs"),
        ];
        for (id, expected) in cases {
            assert_eq!(namer.file_template(&ids(&[id])), expected, "{}", id);
        }
    }

    #[test]
    fn test_empty_chunk_is_ungrouped() {
        let chunk = Chunk::new("shared", Vec::new());
        assert!(chunk.is_empty());
        assert_eq!(namer(ChunkOrdering::Host).assign(&chunk), "chunks/shared.mjs");
    }

    #[test]
    fn test_sorted_ordering_ignores_host_order() {
        let namer = namer(ChunkOrdering::Sorted);
        let forward = ids(&["/proj/runtime/cache.mjs", "/proj/src/api/hello.ts"]);
        let reversed = ids(&["/proj/src/api/hello.ts", "/proj/runtime/cache.mjs"]);
        assert_eq!(namer.group(&forward), namer.group(&reversed));
        assert_eq!(namer.group(&forward), ChunkGroup::Handlers);
    }

    #[test]
    fn test_chunk_name_is_sanitized() {
        let chunk = Chunk::new("\0virtual:plugins", ids(&["\0virtual:plugins"]));
        assert_eq!(namer(ChunkOrdering::Host).assign(&chunk), "chunks/rollup/_virtual_plugins.mjs");
    }

    #[test]
    fn test_entry_file_name() {
        assert_eq!(namer(ChunkOrdering::Host).entry_file_name(), "index.mjs");
    }
}
