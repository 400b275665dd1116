//! Runtime environment presets
//!
//! A preset contributes aliases, injected globals, polyfills and modules that
//! are provided by the runtime itself. Presets are merged left to right.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{InjectSpec, UnenvConfig};

/// Node.js built-in modules
pub const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "fs/promises",
    "http", "http2", "https", "inspector", "module", "net", "os", "path", "perf_hooks",
    "process", "punycode", "querystring", "readline", "repl", "stream", "stream/web",
    "string_decoder", "timers", "tls", "trace_events", "tty", "url", "util", "v8", "vm",
    "wasi", "worker_threads", "zlib",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvPreset {
    pub alias: BTreeMap<String, String>,
    pub inject: BTreeMap<String, InjectSpec>,
    pub polyfill: Vec<String>,
    pub external: Vec<String>,
}

impl EnvPreset {
    /// Node.js target: built-ins stay external
    pub fn node() -> Self {
        let external = NODE_BUILTINS
            .iter()
            .flat_map(|name| [name.to_string(), format!("node:{}", name)])
            .collect();

        Self {
            external,
            ..Self::default()
        }
    }

    /// Runtimes without Node.js: built-ins are replaced by polyfills
    pub fn nodeless() -> Self {
        let alias = NODE_BUILTINS
            .iter()
            .flat_map(|name| {
                let target = format!("unenv/runtime/node/{}/index", name);
                [(name.to_string(), target.clone()), (format!("node:{}", name), target)]
            })
            .collect();

        let mut inject = BTreeMap::new();
        inject.insert(
            "process".to_string(),
            InjectSpec::Default("unenv/runtime/polyfill/process".to_string()),
        );
        inject.insert(
            "Buffer".to_string(),
            InjectSpec::Named(vec!["buffer".to_string(), "Buffer".to_string()]),
        );

        Self {
            alias,
            inject,
            polyfill: vec![
                "unenv/runtime/polyfill/process".to_string(),
                "unenv/runtime/polyfill/global-this".to_string(),
            ],
            external: Vec::new(),
        }
    }

    /// Aliases every build gets
    pub fn builtin() -> Self {
        let mut alias = BTreeMap::new();
        alias.insert("debug".to_string(), "unenv/runtime/npm/debug".to_string());
        alias.insert("consola".to_string(), "unenv/runtime/npm/consola".to_string());

        Self {
            alias,
            ..Self::default()
        }
    }

    /// Later presets override aliases and injections; lists are concatenated
    pub fn merge<'a>(presets: impl IntoIterator<Item = &'a EnvPreset>) -> Self {
        let mut merged = EnvPreset::default();
        for preset in presets {
            merged.alias.extend(preset.alias.clone());
            merged.inject.extend(preset.inject.clone());
            extend_unique(&mut merged.polyfill, &preset.polyfill);
            extend_unique(&mut merged.external, &preset.external);
        }
        merged
    }

    /// Whether the runtime provides `id` itself
    pub fn is_external(&self, id: &str) -> bool {
        self.external.iter().any(|e| e == id)
    }
}

impl From<&UnenvConfig> for EnvPreset {
    fn from(config: &UnenvConfig) -> Self {
        Self {
            alias: config.alias.clone(),
            inject: config.inject.clone(),
            polyfill: config.polyfill.clone(),
            external: config.external.clone(),
        }
    }
}

fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_preset_externalizes_builtins() {
        let preset = EnvPreset::node();
        assert!(preset.is_external("fs"));
        assert!(preset.is_external("node:fs"));
        assert!(!preset.is_external("lodash"));
        assert!(preset.alias.is_empty());
    }

    #[test]
    fn test_nodeless_preset_aliases_builtins() {
        let preset = EnvPreset::nodeless();
        assert_eq!(preset.alias.get("node:path").map(String::as_str), Some("unenv/runtime/node/path/index"));
        assert!(preset.external.is_empty());
        assert!(preset.inject.contains_key("process"));
    }

    #[test]
    fn test_merge_order() {
        let user = EnvPreset {
            alias: [("debug".to_string(), "my-debug".to_string())].into_iter().collect(),
            polyfill: vec!["unenv/runtime/polyfill/process".to_string(), "extra".to_string()],
            ..EnvPreset::default()
        };
        let merged = EnvPreset::merge([&EnvPreset::nodeless(), &EnvPreset::builtin(), &user]);

        assert_eq!(merged.alias.get("debug").map(String::as_str), Some("my-debug"));
        assert_eq!(merged.alias.get("consola").map(String::as_str), Some("unenv/runtime/npm/consola"));
        assert_eq!(
            merged.polyfill,
            vec![
                "unenv/runtime/polyfill/process".to_string(),
                "unenv/runtime/polyfill/global-this".to_string(),
                "extra".to_string(),
            ]
        );
    }
}
