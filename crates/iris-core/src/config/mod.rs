mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!("config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be at least 1");
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            bail!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            );
        }
        let limits = self.server.rate_limit;
        if limits.text == 0 || limits.image == 0 || limits.default == 0 {
            bail!("server.rate_limit values must be at least 1");
        }
        if self.generation.timeout_secs == 0 {
            bail!("generation.timeout_secs must be at least 1");
        }
        Ok(())
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

/// Priority: explicit path > `IRIS_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("IRIS_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
