use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Local model runtime the orchestration engine runs inference on.
///
/// This crate never runs inference itself; it only asks which models are installed.
#[async_trait::async_trait]
pub trait ModelRuntime: Send + Sync {
    /// List models installed in the runtime
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

/// One installed model as reported by the runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub name: String,
    /// Newer Ollama versions report the tagged name here as well
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl ModelInfo {
    /// `llama3` matches `llama3` and any tag of it (`llama3:latest`, `llama3:8b`).
    pub fn matches(&self, wanted: &str) -> bool {
        std::iter::once(self.name.as_str())
            .chain(self.model.as_deref())
            .any(|candidate| {
                candidate == wanted
                    || candidate
                        .strip_prefix(wanted)
                        .map_or(false, |rest| rest.starts_with(':'))
            })
    }
}

pub mod ollama;
