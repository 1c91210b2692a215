/*!
common/src/lib.rs

Shared configuration types and helpers for Curator.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader merging a default file with an optional override
- Secret lookup from environment variables named by the config
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HTTP server section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (e.g. "127.0.0.1")
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Directory holding the single-page UI
    pub static_dir: Option<String>,
}

impl ServerConfig {
    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(8000)
    }

    pub fn static_dir(&self) -> &str {
        self.static_dir.as_deref().unwrap_or("curator/static")
    }
}

/// Article search API (NewsAPI-compatible) section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsApiConfig {
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
}

impl NewsApiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or("https://newsapi.org/v2")
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("NEWSAPI_KEY")
    }
}

/// Orchestration engine section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub health_path: Option<String>,
    /// Upper bound on tool dispatches handled inside a single start/resume
    pub max_tool_calls: Option<usize>,
}

impl OrchestratorConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or("https://api.portialabs.ai")
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("PORTIA_API_KEY")
    }

    pub fn health_path(&self) -> &str {
        self.health_path.as_deref().unwrap_or("/health")
    }

    pub fn max_tool_calls(&self) -> usize {
        self.max_tool_calls.unwrap_or(16)
    }
}

/// Local model runtime section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRuntimeConfig {
    pub provider: Option<String>, // only "ollama" for now
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl ModelRuntimeConfig {
    pub fn provider(&self) -> &str {
        self.provider.as_deref().unwrap_or("ollama")
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or("http://localhost:11434")
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("llama3")
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub news_api: NewsApiConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub model_runtime: ModelRuntimeConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (path, label) in [(default_path, "default"), (override_path, "override")] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject base URLs that cannot be parsed, so misconfiguration surfaces at startup
    /// rather than on the first request.
    pub fn validate(&self) -> Result<()> {
        for (section, base) in [
            ("news_api", self.news_api.base_url()),
            ("orchestrator", self.orchestrator.base_url()),
            ("model_runtime", self.model_runtime.base_url()),
        ] {
            url::Url::parse(base)
                .with_context(|| format!("Invalid base_url in [{}]: {}", section, base))?;
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Read a secret from the environment variable `env_name`.
/// Unset and empty (or whitespace-only) values both count as missing.
pub fn read_secret(env_name: &str) -> Option<String> {
    std::env::var(env_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
