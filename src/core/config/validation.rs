use serde_json::{Map, Value};

use super::settings::{AppConfig, SearchProvider, VectorStoreProvider};
use crate::core::errors::ConfigurationError;

/// Which binary is loading the config. Decides the required keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Server,
    Ingest,
}

/// Shape and range checks on the merged, not yet typed, configuration.
pub fn validate_config(config: &Value) -> Result<(), ConfigurationError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 1, 65_535)?;
    }

    if let Some(store) = expect_optional_object(root, "vector_store")? {
        validate_enum_field(store, "vector_store.provider", "provider", &["pinecone", "memory"])?;
        validate_optional_string_field(store, "vector_store.api_key", "api_key")?;
        validate_optional_string_field(store, "vector_store.environment", "environment")?;
        validate_optional_string_field(store, "vector_store.index_name", "index_name")?;
        validate_optional_string_field(store, "vector_store.namespace", "namespace")?;
        validate_u64_field(store, "vector_store.timeout_secs", "timeout_secs", 1, 600)?;
        validate_u64_field(store, "vector_store.max_retries", "max_retries", 0, 10)?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.chat_model", "chat_model")?;
        validate_optional_string_field(llm, "llm.embedding_model", "embedding_model")?;
        validate_u64_field(llm, "llm.embedding_dimension", "embedding_dimension", 1, 65_536)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 600)?;
        validate_u64_field(llm, "llm.max_retries", "max_retries", 0, 10)?;
    }

    if let Some(search) = expect_optional_object(root, "search")? {
        validate_enum_field(
            search,
            "search.provider",
            "provider",
            &["serpapi", "google", "duckduckgo"],
        )?;
        validate_u64_field(search, "search.max_results", "max_results", 1, 20)?;
        validate_u64_field(search, "search.timeout_secs", "timeout_secs", 1, 600)?;
        validate_u64_field(search, "search.max_retries", "max_retries", 0, 10)?;
    }

    if let Some(ingest) = expect_optional_object(root, "ingest")? {
        validate_optional_string_field(ingest, "ingest.data_dir", "data_dir")?;
        validate_bool_field(ingest, "ingest.recursive", "recursive")?;
        validate_bool_field(ingest, "ingest.recreate_index", "recreate_index")?;
        validate_u64_field(ingest, "ingest.chunk_size", "chunk_size", 1, 100_000)?;
        validate_u64_field(ingest, "ingest.chunk_overlap", "chunk_overlap", 0, 100_000)?;
        validate_u64_field(ingest, "ingest.batch_size", "batch_size", 1, 1_000)?;
        validate_u64_field(ingest, "ingest.embed_batch_size", "embed_batch_size", 1, 2_048)?;
        validate_u64_field(ingest, "ingest.embed_concurrency", "embed_concurrency", 1, 64)?;
        validate_enum_field(
            ingest,
            "ingest.id_strategy",
            "id_strategy",
            &["positional", "content_hash"],
        )?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 100)?;
        validate_bool_field(retrieval, "retrieval.condense_question", "condense_question")?;
        validate_u64_field(
            retrieval,
            "retrieval.memory_token_limit",
            "memory_token_limit",
            1,
            1_000_000,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.session_ttl_secs",
            "session_ttl_secs",
            1,
            604_800,
        )?;
    }

    if let Some(fallback) = expect_optional_object(root, "fallback")? {
        validate_bool_field(fallback, "fallback.enabled", "enabled")?;
        validate_string_array_field(fallback, "fallback.markers", "markers")?;
        validate_optional_string_field(fallback, "fallback.prefix", "prefix")?;
        validate_u64_field(
            fallback,
            "fallback.max_agent_iterations",
            "max_agent_iterations",
            1,
            50,
        )?;
    }

    if let Some(logging) = expect_optional_object(root, "logging")? {
        validate_optional_string_field(logging, "logging.level", "level")?;
        validate_optional_string_field(logging, "logging.dir", "dir")?;
    }

    Ok(())
}

/// Cross-field rules and required keys on the typed configuration.
pub fn validate_settings(config: &AppConfig, scope: ConfigScope) -> Result<(), ConfigurationError> {
    if config.ingest.chunk_overlap >= config.ingest.chunk_size {
        return Err(ConfigurationError::invalid(
            "ingest.chunk_overlap",
            format!(
                "must be smaller than ingest.chunk_size ({})",
                config.ingest.chunk_size
            ),
        ));
    }

    if config.vector_store.provider == VectorStoreProvider::Pinecone {
        require(&config.vector_store.api_key, "vector_store.api_key", "PINECONE_API_KEY")?;
        require(
            &config.vector_store.environment,
            "vector_store.environment",
            "PINECONE_API_ENV",
        )?;
        require(&config.vector_store.index_name, "vector_store.index_name", "INDEXNAME")?;
    }

    require(&config.llm.api_key, "llm.api_key", "OPENAI_API_KEY")?;

    if scope == ConfigScope::Server && config.fallback.enabled {
        match config.search.provider {
            SearchProvider::SerpApi => {
                require(&config.search.api_key, "search.api_key", "SERPAPI_KEY")?;
            }
            SearchProvider::Google => {
                require(&config.search.api_key, "search.api_key", "GOOGLE_API_KEY")?;
                require(&config.search.engine_id, "search.engine_id", "GOOGLE_CSE_ID")?;
            }
            SearchProvider::DuckDuckGo => {}
        }
        if config.fallback.markers.is_empty() {
            return Err(ConfigurationError::invalid(
                "fallback.markers",
                "at least one marker is required while fallback is enabled",
            ));
        }
    }

    Ok(())
}

fn require(
    value: &Option<String>,
    key: &'static str,
    env: &'static str,
) -> Result<(), ConfigurationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ConfigurationError::Missing { key, env }),
    }
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigurationError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigurationError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigurationError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ConfigurationError::invalid(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigurationError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ConfigurationError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.contains(&text) {
        return Ok(());
    }
    Err(ConfigurationError::invalid(
        path,
        format!("expected one of {}", allowed.join(", ")),
    ))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigurationError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ConfigurationError::invalid(
                format!("{}[{}]", path, index),
                "value cannot be empty",
            ));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ConfigurationError {
    ConfigurationError::invalid(path, format!("expected {}", expected))
}
