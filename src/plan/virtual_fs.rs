//! In-memory module overlay
//!
//! Virtual modules are registered once while the plan is assembled and then
//! frozen. Lookups only ever happen on the frozen overlay, so registration
//! and resolution can never interleave.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use super::roots::VIRTUAL_PREFIX;
use crate::error::{PlanError, PlanResult, PlanWarning, WarningKind};
use crate::utils::hash_content;

/// Id of the generated polyfill module
pub const POLYFILL_ID: &str = "#internal/nitro/virtual/polyfill";

/// Id of the generated plugin loader module
pub const PLUGINS_ID: &str = "#internal/nitro/virtual/plugins";

/// Id of the generated server handler table
pub const HANDLERS_ID: &str = "#internal/nitro/virtual/server-handlers";

/// Source of a virtual module
#[derive(Clone)]
pub enum VirtualSource {
    Text(Arc<str>),
    /// Evaluated at most once, on first lookup. Must be deterministic.
    Generated(Arc<dyn Fn() -> String + Send + Sync>),
}

impl fmt::Debug for VirtualSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirtualSource::Text(text) => f.debug_tuple("Text").field(text).finish(),
            VirtualSource::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

impl From<String> for VirtualSource {
    fn from(text: String) -> Self {
        VirtualSource::Text(text.into())
    }
}

impl From<&str> for VirtualSource {
    fn from(text: &str) -> Self {
        VirtualSource::Text(text.into())
    }
}

#[derive(Debug)]
struct VirtualEntry {
    source: VirtualSource,
    rendered: OnceCell<Arc<str>>,
    meta: BTreeMap<String, String>,
}

impl VirtualEntry {
    fn content(&self) -> Arc<str> {
        self.rendered
            .get_or_init(|| match &self.source {
                VirtualSource::Text(text) => text.clone(),
                VirtualSource::Generated(generate) => generate().into(),
            })
            .clone()
    }
}

/// Mutable registration phase of the overlay
#[derive(Debug, Default)]
pub struct VirtualOverlayBuilder {
    entries: HashMap<String, VirtualEntry>,
}

impl VirtualOverlayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; a later registration of the same id replaces it
    pub fn register(&mut self, id: impl Into<String>, source: impl Into<VirtualSource>) -> &mut Self {
        self.register_with_meta(id, source, BTreeMap::new())
    }

    pub fn register_with_meta(
        &mut self,
        id: impl Into<String>,
        source: impl Into<VirtualSource>,
        meta: BTreeMap<String, String>,
    ) -> &mut Self {
        let id = id.into();
        let entry = VirtualEntry {
            source: source.into(),
            rendered: OnceCell::new(),
            meta,
        };
        if self.entries.insert(id.clone(), entry).is_some() {
            debug!("Virtual module '{}' replaced by a later registration", id);
        }
        self
    }

    /// End the registration phase
    pub fn freeze(self) -> VirtualOverlay {
        VirtualOverlay {
            entries: self.entries,
        }
    }
}

/// Read-only overlay consulted before the filesystem
#[derive(Debug, Default)]
pub struct VirtualOverlay {
    entries: HashMap<String, VirtualEntry>,
}

impl VirtualOverlay {
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Source text of a registered id
    pub fn resolve(&self, id: &str) -> Option<Arc<str>> {
        self.entries.get(id).map(VirtualEntry::content)
    }

    /// Source text of a resolved (`\0virtual:`-prefixed) id
    pub fn load(&self, resolved_id: &str) -> Option<Arc<str>> {
        resolved_id
            .strip_prefix(VIRTUAL_PREFIX)
            .and_then(|id| self.resolve(id))
    }

    pub fn meta(&self, id: &str) -> Option<&BTreeMap<String, String>> {
        self.entries.get(id).map(|entry| &entry.meta)
    }

    pub fn list(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// The resolved id a registered id is exposed under
    pub fn virtual_id(id: &str) -> String {
        format!("{}{}", VIRTUAL_PREFIX, id)
    }
}

/// Quote a string as a JavaScript string literal
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Import binding for a module path, stable across builds
pub(crate) fn binding_for(path: &str) -> String {
    format!("_{}", hash_content(path.as_bytes()))
}

/// Side-effect imports of every polyfill, in order
pub fn polyfill_module(polyfills: &[String]) -> String {
    polyfills
        .iter()
        .map(|p| format!("import {};", js_string(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generated plugin loader source
#[derive(Debug, Clone)]
pub struct PluginsModule {
    pub source: String,
    /// binding -> plugin path
    pub bindings: BTreeMap<String, String>,
    pub warnings: Vec<PlanWarning>,
}

/// Build the plugin loader: one default import per plugin, then an ordered
/// `plugins` array export
pub fn plugins_module(plugins: &[String]) -> PlanResult<PluginsModule> {
    let mut bindings: BTreeMap<String, String> = BTreeMap::new();
    let mut ordered = Vec::new();
    let mut warnings = Vec::new();

    for plugin in plugins {
        let binding = binding_for(plugin);
        match bindings.get(&binding) {
            Some(existing) if existing == plugin => {
                warnings.push(PlanWarning::new(
                    WarningKind::DuplicatePlugin,
                    plugin.clone(),
                    "plugin declared more than once; loading it once",
                ));
                continue;
            }
            Some(existing) => {
                return Err(PlanError::BindingCollision {
                    binding,
                    first: existing.clone(),
                    second: plugin.clone(),
                });
            }
            None => {
                bindings.insert(binding.clone(), plugin.clone());
                ordered.push((binding, plugin));
            }
        }
    }

    let imports = ordered
        .iter()
        .map(|(binding, plugin)| format!("import {} from {};", binding, js_string(plugin)))
        .collect::<Vec<_>>()
        .join("\n");
    let names = ordered
        .iter()
        .map(|(binding, _)| format!("  {}", binding))
        .collect::<Vec<_>>()
        .join(",\n");

    Ok(PluginsModule {
        source: format!("{}\n\nexport const plugins = [\n{}\n]\n", imports, names),
        bindings,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_last_registration_wins() {
        let mut builder = VirtualOverlayBuilder::new();
        builder.register("x", "1").register("x", "2");
        let overlay = builder.freeze();

        assert_eq!(overlay.resolve("x").as_deref(), Some("2"));
        assert_eq!(overlay.list().len(), 1);
    }

    #[test]
    fn test_load_by_resolved_id() {
        let mut builder = VirtualOverlayBuilder::new();
        builder.register("#motd", "export default 'hi'");
        let overlay = builder.freeze();

        let resolved = VirtualOverlay::virtual_id("#motd");
        assert_eq!(resolved, "\0virtual:#motd");
        assert_eq!(overlay.load(&resolved).as_deref(), Some("export default 'hi'"));
        assert_eq!(overlay.load("#motd"), None);
        assert_eq!(overlay.resolve("missing"), None);
    }

    #[test]
    fn test_generator_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut builder = VirtualOverlayBuilder::new();
        builder.register(
            "gen",
            VirtualSource::Generated(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "export default 42".to_string()
            })),
        );
        let overlay = builder.freeze();

        assert_eq!(overlay.resolve("gen").as_deref(), Some("export default 42"));
        assert_eq!(overlay.resolve("gen").as_deref(), Some("export default 42"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_plugins_module_order_and_bindings() {
        let plugins = vec!["/a/p1.js".to_string(), "/a/p2.js".to_string()];
        let module = plugins_module(&plugins).unwrap();

        let b1 = binding_for("/a/p1.js");
        let b2 = binding_for("/a/p2.js");
        assert_ne!(b1, b2);

        let expected = format!(
            "import {b1} from \"/a/p1.js\";\nimport {b2} from \"/a/p2.js\";\n\nexport const plugins = [\n  {b1},\n  {b2}\n]\n"
        );
        assert_eq!(module.source, expected);
        assert_eq!(module.bindings.get(&b1).map(String::as_str), Some("/a/p1.js"));
    }

    #[test]
    fn test_plugin_bindings_do_not_depend_on_order() {
        let forward = plugins_module(&["/a/p1.js".to_string(), "/a/p2.js".to_string()]).unwrap();
        let reversed = plugins_module(&["/a/p2.js".to_string(), "/a/p1.js".to_string()]).unwrap();
        assert_eq!(forward.bindings, reversed.bindings);
    }

    #[test]
    fn test_duplicate_plugin_is_loaded_once() {
        let module = plugins_module(&["/a/p1.js".to_string(), "/a/p1.js".to_string()]).unwrap();
        assert_eq!(module.source.matches("import ").count(), 1);
        assert_eq!(module.warnings.len(), 1);
        assert_eq!(module.warnings[0].kind, WarningKind::DuplicatePlugin);
    }

    #[test]
    fn test_polyfill_module() {
        let source = polyfill_module(&["a/b.js".to_string(), "c".to_string()]);
        assert_eq!(source, "import \"a/b.js\";\nimport \"c\";");
        assert_eq!(polyfill_module(&[]), "");
    }
}
