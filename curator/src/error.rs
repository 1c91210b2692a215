//! Error taxonomy shared by every curation component.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurationError {
    /// A required secret or setting is absent.
    #[error("{0}")]
    Configuration(String),

    /// A configured credential was rejected by a remote service.
    #[error("{0}")]
    Authentication(String),

    /// A required local service or model is not present.
    #[error("{0}")]
    DependencyUnavailable(String),

    /// A remote service answered with an unexpected or non-success payload.
    #[error("{0}")]
    Upstream(String),

    /// Any other failure surfaced by the orchestration engine.
    #[error("Agent error: {0}")]
    Workflow(String),

    /// User input rejected before any external call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CurationError {
    /// HTTP status code used when the error is returned by the JSON API.
    pub fn status_code(&self) -> u16 {
        match self {
            CurationError::InvalidInput(_) => 422,
            CurationError::Configuration(_) => 500,
            CurationError::Authentication(_) => 401,
            CurationError::DependencyUnavailable(_) => 503,
            CurationError::Upstream(_) | CurationError::Workflow(_) => 502,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CurationError::Configuration(_) => "configuration",
            CurationError::Authentication(_) => "authentication",
            CurationError::DependencyUnavailable(_) => "dependency_unavailable",
            CurationError::Upstream(_) => "upstream",
            CurationError::Workflow(_) => "workflow",
            CurationError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Message shown to the human, with a credential hint appended for auth failures.
    pub fn user_message(&self) -> String {
        match self {
            CurationError::Authentication(_) => format!(
                "Error: {}. If a 401 Unauthorized error, verify the API keys in .env.",
                self
            ),
            _ => format!("Error: {}", self),
        }
    }
}

/// Where the service credentials come from, used to word remediation hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHint {
    pub orchestrator_env: String,
    pub news_env: String,
    /// Authenticated orchestrator endpoint suggested for a manual curl test.
    pub health_url: String,
}

impl Default for CredentialHint {
    fn default() -> Self {
        Self {
            orchestrator_env: "PORTIA_API_KEY".to_string(),
            news_env: "NEWSAPI_KEY".to_string(),
            health_url: "https://api.portialabs.ai/health".to_string(),
        }
    }
}

impl CredentialHint {
    pub fn from_config(cfg: &common::Config) -> Self {
        Self {
            orchestrator_env: cfg.orchestrator.api_key_env().to_string(),
            news_env: cfg.news_api.api_key_env().to_string(),
            health_url: format!(
                "{}{}",
                cfg.orchestrator.base_url().trim_end_matches('/'),
                cfg.orchestrator.health_path()
            ),
        }
    }
}

/// Translate a failure message raised by the orchestration engine.
///
/// Messages that mention an authorization problem become `Authentication`, carrying the
/// remediation text; everything else becomes `Workflow` with the original message.
pub fn classify_engine_failure(message: &str, hint: &CredentialHint) -> CurationError {
    if is_authorization_message(message) {
        CurationError::Authentication(format!(
            "API authentication failed: Check {orch} (https://app.portialabs.ai) and {news} (https://newsapi.org). \
             Test the orchestrator: curl -H 'Authorization: Bearer ${orch}' {url}",
            orch = hint.orchestrator_env,
            news = hint.news_env,
            url = hint.health_url
        ))
    } else {
        CurationError::Workflow(message.to_string())
    }
}

fn is_authorization_message(message: &str) -> bool {
    message.contains("401") || message.to_ascii_lowercase().contains("unauthorized")
}
