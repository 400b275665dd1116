//! Build-time environment values and text replacements

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Preset that marks a prerender build
pub const PRERENDER_PRESET: &str = "nitro-prerender";

/// Environment values substituted into the bundle at build time
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEnv {
    values: Map<String, Value>,
}

impl BuildEnv {
    pub fn new(dev: bool, preset: &str, runtime_config: Value) -> Self {
        let node_env = if dev {
            "development"
        } else if preset == PRERENDER_PRESET {
            "prerender"
        } else {
            "production"
        };

        let mut values = Map::new();
        values.insert("NODE_ENV".to_string(), Value::from(node_env));
        values.insert("server".to_string(), Value::Bool(true));
        values.insert("client".to_string(), Value::Bool(false));
        values.insert("dev".to_string(), Value::Bool(dev));
        values.insert("RUNTIME_CONFIG".to_string(), runtime_config);
        values.insert("DEBUG".to_string(), Value::Bool(dev));

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Literal replacement table for the text substitution stage
    pub fn replacements(&self, user: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();

        values.insert("typeof window".to_string(), "\"undefined\"".to_string());
        values.insert("_import_meta_url_".to_string(), "import.meta.url".to_string());

        for d in [".", ";", ")", "[", "]", "}", " "] {
            values.insert(format!("import.meta{}", d), format!("globalThis._importMeta_{}", d));
        }

        for d in [";", "(", "{", "}", " ", "\t", "\n"] {
            values.insert(format!("{}global.", d), format!("{}globalThis.", d));
        }

        for (key, value) in &self.values {
            let literal = value.to_string();
            values.insert(format!("process.env.{}", key), literal.clone());
            values.insert(format!("import.meta.env.{}", key), literal);
        }

        values.extend(user.iter().map(|(k, v)| (k.clone(), v.clone())));

        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_env() {
        assert_eq!(BuildEnv::new(true, "node", Value::Null).get("NODE_ENV"), Some(&json!("development")));
        assert_eq!(BuildEnv::new(false, "node", Value::Null).get("NODE_ENV"), Some(&json!("production")));
        assert_eq!(
            BuildEnv::new(false, PRERENDER_PRESET, Value::Null).get("NODE_ENV"),
            Some(&json!("prerender"))
        );
    }

    #[test]
    fn test_fixed_keys_in_order() {
        let env = BuildEnv::new(false, "node", json!({}));
        let keys: Vec<_> = env.values().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["NODE_ENV", "server", "client", "dev", "RUNTIME_CONFIG", "DEBUG"]);
    }

    #[test]
    fn test_replacements_are_json_literals() {
        let env = BuildEnv::new(false, "node", json!({ "public": { "title": "api" } }));
        let mut user = BTreeMap::new();
        user.insert("__VERSION__".to_string(), "\"1.0.0\"".to_string());
        let values = env.replacements(&user);

        assert_eq!(values["process.env.NODE_ENV"], "\"production\"");
        assert_eq!(values["import.meta.env.dev"], "false");
        assert_eq!(values["process.env.server"], "true");
        assert_eq!(values["process.env.RUNTIME_CONFIG"], r#"{"public":{"title":"api"}}"#);
        assert_eq!(values["typeof window"], "\"undefined\"");
        assert_eq!(values["import.meta."], "globalThis._importMeta_.");
        assert_eq!(values[";global."], ";globalThis.");
        assert_eq!(values["__VERSION__"], "\"1.0.0\"");
    }
}
