use std::sync::Arc;

use anyhow::Result;
use common::Config;
use tracing::info;

use crate::articles::{ArticleSource, NewsApiSource};
use crate::error::CredentialHint;
use crate::llm::ollama::OllamaRuntime;
use crate::llm::ModelRuntime;
use crate::preflight::PreflightValidator;
use crate::session::ReviewSessionController;
use crate::tools::{NewsFetchTool, ToolRegistry};
use crate::workflow::remote::RemoteWorkflowEngine;

/// Production collaborators built from configuration and the environment.
pub struct Components {
    pub preflight: Arc<PreflightValidator>,
    pub engine: Arc<RemoteWorkflowEngine>,
    pub hint: CredentialHint,
}

impl Components {
    pub fn from_config(config: &Config) -> Result<Self> {
        let news = NewsApiSource::from_config(&config.news_api);
        let source: Arc<dyn ArticleSource> = Arc::new(news.clone());
        let tools = ToolRegistry::new().with_tool(Arc::new(NewsFetchTool::new(source)));

        let hint = CredentialHint::from_config(config);
        let engine = Arc::new(
            RemoteWorkflowEngine::from_config(&config.orchestrator, &config.model_runtime, tools)
                .with_credential_hint(hint.clone()),
        );

        let runtime: Arc<dyn ModelRuntime> = match config.model_runtime.provider() {
            "ollama" => Arc::new(OllamaRuntime::new(config.model_runtime.base_url())),
            other => anyhow::bail!("Unknown model runtime provider: {}", other),
        };
        info!(
            provider = config.model_runtime.provider(),
            model = config.model_runtime.model(),
            "model runtime configured"
        );

        let preflight = Arc::new(PreflightValidator::new(engine.clone(), news, runtime).with_config(config));
        Ok(Self { preflight, engine, hint })
    }

    pub fn controller(&self) -> ReviewSessionController {
        ReviewSessionController::new(self.preflight.clone(), self.engine.clone())
            .with_credential_hint(self.hint.clone())
    }
}
