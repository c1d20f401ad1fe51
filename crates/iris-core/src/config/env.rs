use std::path::PathBuf;
use std::str::FromStr;

use super::{Config, Secret};

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.trim().parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

fn parse_kind<T: serde::de::DeserializeOwned>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.to_lowercase())) {
        Some(kind)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_paths();
        self.apply_env_overrides_server();
        self.apply_env_overrides_models();

        if let Ok(v) = std::env::var("HF_INFERENCE_API")
            && !v.is_empty()
        {
            self.secrets.hf_token = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("API_BASE") {
            self.client.api_base = v;
        }
    }

    fn apply_env_overrides_paths(&mut self) {
        if let Ok(v) = std::env::var("INDEX_DIR") {
            self.index.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DATA_DIR") {
            self.index.data_dir = PathBuf::from(v);
        }
        if let Some(top_k) = parse_env::<usize>("IRIS_TOP_K") {
            self.retrieval.top_k = top_k;
        }
    }

    fn apply_env_overrides_server(&mut self) {
        if let Some(port) = parse_env::<u16>("PORT") {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("IRIS_BIND") {
            self.server.bind = v;
        }
        if let Some(limit) = parse_env::<u32>("IRIS_RATE_LIMIT_TEXT") {
            self.server.rate_limit.text = limit;
        }
        if let Some(limit) = parse_env::<u32>("IRIS_RATE_LIMIT_IMAGE") {
            self.server.rate_limit.image = limit;
        }
    }

    fn apply_env_overrides_models(&mut self) {
        if let Some(kind) = parse_kind("IRIS_EMBEDDING_PROVIDER") {
            self.embedding.provider = kind;
        }
        if let Ok(v) = std::env::var("IRIS_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(kind) = parse_kind("IRIS_GENERATION_PROVIDER") {
            self.generation.provider = kind;
        }
        if let Ok(v) = std::env::var("IRIS_GENERATION_MODEL") {
            self.generation.model = v;
        }
        if let Ok(v) = std::env::var("IRIS_GENERATION_BASE_URL") {
            self.generation.base_url = Some(v);
        }
        if let Some(secs) = parse_env::<u64>("IRIS_TIMEOUT_GENERATION") {
            self.generation.timeout_secs = secs;
        }
    }
}
