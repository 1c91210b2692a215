//! Checks that every external dependency is configured, reachable and authorized
//! before a curation run is allowed to start.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::articles::NewsApiSource;
use crate::error::CurationError;
use crate::llm::ModelRuntime;
use crate::workflow::remote::RemoteWorkflowEngine;

#[async_trait]
pub trait Preflight: Send + Sync {
    /// Run every check in order, failing on the first one that does not pass.
    async fn check_all(&self) -> Result<(), CurationError>;
}

/// Production preflight over the real collaborators.
pub struct PreflightValidator {
    orchestrator: Arc<RemoteWorkflowEngine>,
    orchestrator_key_env: String,
    health_path: String,
    news: NewsApiSource,
    news_key_env: String,
    runtime: Arc<dyn ModelRuntime>,
    model: String,
}

impl PreflightValidator {
    pub fn new(
        orchestrator: Arc<RemoteWorkflowEngine>,
        news: NewsApiSource,
        runtime: Arc<dyn ModelRuntime>,
    ) -> Self {
        Self {
            orchestrator,
            orchestrator_key_env: "PORTIA_API_KEY".to_string(),
            health_path: "/health".to_string(),
            news,
            news_key_env: "NEWSAPI_KEY".to_string(),
            runtime,
            model: "llama3".to_string(),
        }
    }

    pub fn with_config(mut self, cfg: &common::Config) -> Self {
        self.orchestrator_key_env = cfg.orchestrator.api_key_env().to_string();
        self.health_path = cfg.orchestrator.health_path().to_string();
        self.news_key_env = cfg.news_api.api_key_env().to_string();
        self.model = cfg.model_runtime.model().to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Orchestrator credential accepted by the authenticated health endpoint.
    pub async fn check_orchestrator(&self) -> bool {
        self.orchestrator.check_health(&self.health_path).await
    }

    /// Article API credential accepted by a lightweight query.
    pub async fn check_article_source(&self) -> bool {
        self.news.validate_key().await
    }

    /// Required model installed in the local runtime.
    pub async fn check_model_runtime(&self) -> bool {
        match self.runtime.list_models().await {
            Ok(models) => {
                if models.iter().any(|m| m.matches(&self.model)) {
                    debug!("Model runtime: {} validated successfully", self.model);
                    true
                } else {
                    error!("Model runtime: {} not found among {} models", self.model, models.len());
                    false
                }
            }
            Err(e) => {
                error!("Model runtime connection error: {:#}", e);
                false
            }
        }
    }

    fn check_credentials_present(&self) -> Result<(), CurationError> {
        if !self.orchestrator.has_key() {
            return Err(CurationError::Configuration(format!(
                "{} is missing or empty in .env. Get a valid key at https://app.portialabs.ai",
                self.orchestrator_key_env
            )));
        }
        if !self.news.has_key() {
            return Err(CurationError::Configuration(format!(
                "{} is missing or empty in .env. Get a valid key at https://newsapi.org",
                self.news_key_env
            )));
        }
        Ok(())
    }

    /// First failing outcome, in check order, for checks that were already run.
    pub fn verdict(&self, orchestrator_ok: bool, news_ok: bool, model_ok: bool) -> Result<(), CurationError> {
        self.check_credentials_present()?;
        if !orchestrator_ok {
            return Err(self.orchestrator_rejected());
        }
        if !news_ok {
            return Err(self.news_rejected());
        }
        if !model_ok {
            return Err(self.model_missing());
        }
        Ok(())
    }

    fn orchestrator_rejected(&self) -> CurationError {
        CurationError::Authentication(format!(
            "{key} is invalid. Test with: curl -H 'Authorization: Bearer ${key}' {base}{path}",
            key = self.orchestrator_key_env,
            base = self.orchestrator.base_url().trim_end_matches('/'),
            path = self.health_path
        ))
    }

    fn news_rejected(&self) -> CurationError {
        CurationError::Authentication(format!(
            "{key} is invalid. Test with: curl '{base}/everything?q=test&apiKey=${key}'",
            key = self.news_key_env,
            base = self.news.base_url().trim_end_matches('/')
        ))
    }

    fn model_missing(&self) -> CurationError {
        CurationError::DependencyUnavailable(format!(
            "Model runtime model {model} not found. Install Ollama, pull {model} with 'ollama pull {model}', and run 'ollama serve'.",
            model = self.model
        ))
    }
}

#[async_trait]
impl Preflight for PreflightValidator {
    async fn check_all(&self) -> Result<(), CurationError> {
        self.check_credentials_present()?;

        debug!("Validating connections before running task");
        if !self.check_orchestrator().await {
            return Err(self.orchestrator_rejected());
        }
        if !self.check_article_source().await {
            return Err(self.news_rejected());
        }
        if !self.check_model_runtime().await {
            return Err(self.model_missing());
        }

        info!("Preflight checks passed");
        Ok(())
    }
}
