use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::AppConfig;
use super::validation::{validate_config, validate_settings, ConfigScope};
use crate::core::errors::ConfigurationError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 2] = ["max_tokens", "memory_token_limit"];

/// Environment variables mapped onto config paths. Applied last.
const ENV_OVERRIDES: [(&str, &[&str]); 6] = [
    ("PINECONE_API_KEY", &["vector_store", "api_key"]),
    ("PINECONE_API_ENV", &["vector_store", "environment"]),
    ("INDEXNAME", &["vector_store", "index_name"]),
    ("OPENAI_API_KEY", &["llm", "api_key"]),
    ("DOCCHAT_DATA_DIR", &["ingest", "data_dir"]),
    ("DOCCHAT_LOG_DIR", &["logging", "dir"]),
];

/// Search credentials per provider; only the configured provider's apply.
const SEARCH_ENV_OVERRIDES: [(&str, &str, &[&str]); 3] = [
    ("serpapi", "SERPAPI_KEY", &["search", "api_key"]),
    ("google", "GOOGLE_API_KEY", &["search", "api_key"]),
    ("google", "GOOGLE_CSE_ID", &["search", "engine_id"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Loads `config.yml`, `secrets.yaml` and the process environment.
    pub fn load(&self, scope: ConfigScope) -> Result<AppConfig, ConfigurationError> {
        self.load_with_env(scope, |key| env::var(key).ok())
    }

    pub fn load_with_env<F>(
        &self,
        scope: ConfigScope,
        lookup: F,
    ) -> Result<AppConfig, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public_config = load_yaml_file(&self.paths.config_path)?;
        let secrets_config = load_yaml_file(&self.paths.secrets_path)?;
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, &lookup)?;

        validate_config(&merged)?;
        let mut config: AppConfig = serde_json::from_value(merged)
            .map_err(|err| ConfigurationError::invalid("<root>", err.to_string()))?;
        config.ingest.data_dir = self.paths.resolve(&config.ingest.data_dir);
        config.logging.dir = Some(
            config
                .logging
                .dir
                .as_deref()
                .map(|dir| self.paths.resolve(dir))
                .unwrap_or_else(|| self.paths.log_dir.clone()),
        );

        validate_settings(&config, scope)?;
        Ok(config)
    }
}

/// JSON view of the config with every secret replaced by a placeholder.
pub fn redacted(config: &AppConfig) -> Value {
    serde_json::to_value(config)
        .map(|value| redact_sensitive_values(&value))
        .unwrap_or(Value::Null)
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigurationError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match serde_yaml::from_str::<Value>(&contents) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err(ConfigurationError::Parse {
            path: path.to_path_buf(),
            message: "top level must be a mapping".to_string(),
        }),
        Err(err) => Err(ConfigurationError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: &F) -> Result<(), ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    for (var, path) in ENV_OVERRIDES {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            ensure_object_path(config, path, Value::String(value.trim().to_string()));
        }
    }

    let provider = config
        .get("search")
        .and_then(|search| search.get("provider"))
        .and_then(|value| value.as_str())
        .unwrap_or("serpapi")
        .to_string();
    for (owner, var, path) in SEARCH_ENV_OVERRIDES {
        if owner != provider {
            continue;
        }
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            ensure_object_path(config, path, Value::String(value.trim().to_string()));
        }
    }

    if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigurationError::invalid("PORT", format!("not a port number: {}", port)))?;
        ensure_object_path(config, &["server", "port"], Value::from(port));
    }

    Ok(())
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;
    use crate::core::config::settings::{IdStrategy, VectorStoreProvider};
    use serde_json::json;

    fn service_in(dir: &Path) -> ConfigService {
        let paths = AppPaths {
            project_root: dir.to_path_buf(),
            config_path: dir.join("config.yml"),
            secrets_path: dir.join("secrets.yaml"),
            log_dir: dir.join("logs"),
        };
        ConfigService::new(Arc::new(paths))
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const FULL_ENV: [(&str, &str); 5] = [
        ("PINECONE_API_KEY", "pc-key"),
        ("PINECONE_API_ENV", "us-east-1"),
        ("INDEXNAME", "docs"),
        ("OPENAI_API_KEY", "sk-test"),
        ("SERPAPI_KEY", "serp-key"),
    ];

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn environment_fills_required_keys() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());

        let config = service
            .load_with_env(ConfigScope::Server, env_of(&FULL_ENV))
            .unwrap();

        assert_eq!(config.vector_store.provider, VectorStoreProvider::Pinecone);
        assert_eq!(config.vector_store.index_name.as_deref(), Some("docs"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.ingest.chunk_size, 500);
        assert_eq!(config.ingest.chunk_overlap, 20);
        assert_eq!(config.ingest.batch_size, 100);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.ingest.id_strategy, IdStrategy::ContentHash);
        assert_eq!(config.ingest.data_dir, dir.path().join("data"));
        assert_eq!(config.logging.dir, Some(dir.path().join("logs")));
    }

    #[test]
    fn missing_completion_key_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        let env: Vec<(&str, &str)> = FULL_ENV
            .iter()
            .copied()
            .filter(|(k, _)| *k != "OPENAI_API_KEY")
            .collect();

        let err = service
            .load_with_env(ConfigScope::Server, env_of(&env))
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::Missing { env: "OPENAI_API_KEY", .. }));
    }

    #[test]
    fn ingest_scope_does_not_require_search_key() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        let env: Vec<(&str, &str)> = FULL_ENV
            .iter()
            .copied()
            .filter(|(k, _)| *k != "SERPAPI_KEY")
            .collect();

        assert!(service.load_with_env(ConfigScope::Ingest, env_of(&env)).is_ok());
        assert!(matches!(
            service.load_with_env(ConfigScope::Server, env_of(&env)),
            Err(ConfigurationError::Missing { env: "SERPAPI_KEY", .. })
        ));
    }

    #[test]
    fn search_key_follows_the_configured_provider() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        let mut env: Vec<(&str, &str)> = FULL_ENV.to_vec();
        env.push(("GOOGLE_API_KEY", "google-key"));
        env.push(("GOOGLE_CSE_ID", "cse-id"));

        let config = service
            .load_with_env(ConfigScope::Server, env_of(&env))
            .unwrap();
        assert_eq!(config.search.api_key.as_deref(), Some("serp-key"));
        assert_eq!(config.search.engine_id, None);

        fs::write(dir.path().join("config.yml"), "search:\n  provider: google\n").unwrap();
        let config = service
            .load_with_env(ConfigScope::Server, env_of(&env))
            .unwrap();
        assert_eq!(config.search.api_key.as_deref(), Some("google-key"));
        assert_eq!(config.search.engine_id.as_deref(), Some("cse-id"));
    }

    #[test]
    fn other_providers_key_does_not_satisfy_serpapi() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        let mut env: Vec<(&str, &str)> = FULL_ENV
            .iter()
            .copied()
            .filter(|(k, _)| *k != "SERPAPI_KEY")
            .collect();
        env.push(("GOOGLE_API_KEY", "google-key"));

        let err = service
            .load_with_env(ConfigScope::Server, env_of(&env))
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::Missing { env: "SERPAPI_KEY", .. }));
    }

    #[test]
    fn yaml_files_merge_and_environment_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "vector_store:\n  provider: memory\ningest:\n  chunk_size: 300\n  data_dir: /srv/pdfs\nretrieval:\n  top_k: 5\n",
        )
        .unwrap();
        fs::write(dir.path().join("secrets.yaml"), "llm:\n  api_key: from-file\n").unwrap();
        let service = service_in(dir.path());

        let config = service
            .load_with_env(
                ConfigScope::Server,
                env_of(&[("OPENAI_API_KEY", "from-env"), ("SERPAPI_KEY", "s"), ("PORT", "9000")]),
            )
            .unwrap();

        assert_eq!(config.vector_store.provider, VectorStoreProvider::Memory);
        assert_eq!(config.ingest.chunk_size, 300);
        assert_eq!(config.ingest.data_dir, PathBuf::from("/srv/pdfs"));
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.llm.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn malformed_yaml_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "ingest: [unclosed").unwrap();
        let service = service_in(dir.path());

        let err = service
            .load_with_env(ConfigScope::Ingest, env_of(&FULL_ENV))
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::Parse { .. }));
        assert!(err.to_string().contains("config.yml"));
    }

    #[test]
    fn redaction_hides_keys_but_not_token_limits() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        let config = service
            .load_with_env(ConfigScope::Server, env_of(&FULL_ENV))
            .unwrap();

        let view = redacted(&config);

        assert_eq!(view["llm"]["api_key"], json!("****"));
        assert_eq!(view["vector_store"]["api_key"], json!("****"));
        assert_eq!(view["retrieval"]["memory_token_limit"], json!(2000));
        assert_eq!(view["vector_store"]["index_name"], json!("docs"));
    }
}
