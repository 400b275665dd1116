//! Server handler table

use std::collections::BTreeSet;

use serde::Serialize;

use super::virtual_fs::{binding_for, js_string};
use crate::config::{Config, HandlerConfig};
use crate::utils::{clean_path, path_to_module_id};

/// A route handler with its module path made absolute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerHandler {
    pub route: String,
    pub handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub lazy: bool,
    pub middleware: bool,
}

impl ServerHandler {
    /// Handler paths are relative to the source directory
    pub fn from_config(handler: &HandlerConfig, config: &Config) -> Self {
        let src_dir = config.src_dir();
        let path = if handler.handler.starts_with('/') {
            clean_path(&handler.handler)
        } else {
            clean_path(&path_to_module_id(&src_dir.join(&handler.handler)))
        };

        Self {
            route: handler.route.clone(),
            handler: path,
            method: handler.method.as_ref().map(|m| m.to_lowercase()),
            lazy: handler.lazy,
            middleware: handler.middleware,
        }
    }

    fn binding(&self) -> String {
        if self.lazy {
            format!("_lazy{}", binding_for(&self.handler))
        } else {
            binding_for(&self.handler)
        }
    }
}

/// Source of the server handler table module
pub fn handlers_module(handlers: &[ServerHandler]) -> String {
    let mut imports = Vec::new();
    let mut seen = BTreeSet::new();

    for handler in handlers {
        let binding = handler.binding();
        if !seen.insert(binding.clone()) {
            continue;
        }
        if handler.lazy {
            imports.push(format!(
                "const {} = () => import({});",
                binding,
                js_string(&handler.handler)
            ));
        } else {
            imports.push(format!("import {} from {};", binding, js_string(&handler.handler)));
        }
    }

    let entries = handlers
        .iter()
        .map(|h| {
            format!(
                "  {{ route: {}, handler: {}, lazy: {}, middleware: {}, method: {} }}",
                js_string(&h.route),
                h.binding(),
                h.lazy,
                h.middleware,
                h.method.as_deref().map(js_string).unwrap_or_else(|| "undefined".to_string())
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!("{}\n\nexport const handlers = [\n{}\n];\n", imports.join("\n"), entries)
}
