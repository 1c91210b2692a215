use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{ClarificationRequest, CurationTask, Decision, RunSnapshot, RunState, WorkflowEngine};
use crate::articles::ArticleRecord;
use crate::error::{classify_engine_failure, CredentialHint, CurationError};
use crate::tools::{ToolDescriptor, ToolRegistry};

/// Orchestration engine reached over its JSON HTTP API.
pub struct RemoteWorkflowEngine {
    base_url: String,
    api_key: Option<String>,
    llm_provider: String,
    model: String,
    max_tool_calls: usize,
    tools: ToolRegistry,
    hint: CredentialHint,
    /// (run, clarification) pairs whose decision the engine accepted but whose run has not resumed.
    awaiting_resume: Mutex<HashSet<(String, String)>>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct StartRequest<'a> {
    query: String,
    tools: Vec<ToolDescriptor>,
    llm: LlmSelection<'a>,
}

#[derive(Serialize)]
struct LlmSelection<'a> {
    provider: &'a str,
    model: &'a str,
}

#[derive(Serialize)]
struct ToolResult<'a> {
    call_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RemoteWorkflowEngine {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, tools: ToolRegistry) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            llm_provider: "ollama".to_string(),
            model: "llama3".to_string(),
            max_tool_calls: 16,
            tools,
            hint: CredentialHint::default(),
            awaiting_resume: Mutex::new(HashSet::new()),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(
        orchestrator: &common::OrchestratorConfig,
        runtime: &common::ModelRuntimeConfig,
        tools: ToolRegistry,
    ) -> Self {
        Self::new(
            orchestrator.base_url(),
            common::read_secret(orchestrator.api_key_env()),
            tools,
        )
        .with_model(runtime.provider(), runtime.model())
        .with_max_tool_calls(orchestrator.max_tool_calls())
        .with_credential_hint(CredentialHint {
            orchestrator_env: orchestrator.api_key_env().to_string(),
            health_url: format!(
                "{}{}",
                orchestrator.base_url().trim_end_matches('/'),
                orchestrator.health_path()
            ),
            ..CredentialHint::default()
        })
    }

    pub fn with_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.llm_provider = provider.into();
        self.model = model.into();
        self
    }

    pub fn with_max_tool_calls(mut self, max: usize) -> Self {
        self.max_tool_calls = max;
        self
    }

    pub fn with_credential_hint(mut self, hint: CredentialHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0{}", self.base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&str, CurationError> {
        self.api_key.as_deref().ok_or_else(|| {
            CurationError::Configuration(format!(
                "{} is missing or empty in .env. Get a valid key at https://app.portialabs.ai",
                self.hint.orchestrator_env
            ))
        })
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<RunSnapshot, CurationError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_engine_failure(&format!("request to {} failed: {}", url, e), &self.hint))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(classify_engine_failure(
                &format!("401 Unauthorized ({})", status),
                &self.hint,
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_engine_failure(
                &format!("engine returned {}: {}", status, body),
                &self.hint,
            ));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| CurationError::Workflow(format!("engine returned malformed JSON: {}", e)))?;
        let snapshot = RunSnapshot::try_from(raw)?;
        debug!(run = %snapshot.id, state = ?snapshot.state, "engine answered");
        Ok(snapshot)
    }

    /// Serve tool calls the engine is blocked on until it needs a human or finishes.
    async fn drive(&self, mut snapshot: RunSnapshot) -> Result<RunSnapshot, CurationError> {
        let mut dispatched = 0usize;
        while let Some(call) = snapshot.pending_tool_call.clone() {
            if dispatched >= self.max_tool_calls {
                return Err(CurationError::Workflow(format!(
                    "run {} exceeded {} tool calls",
                    snapshot.id, self.max_tool_calls
                )));
            }
            dispatched += 1;

            let body = match self.tools.dispatch(&call.tool_id, call.args.clone()).await {
                Ok(output) => ToolResult { call_id: &call.id, output: Some(output), error: None },
                Err(e) => {
                    warn!(tool = %call.tool_id, "tool call failed: {}", e);
                    ToolResult { call_id: &call.id, output: None, error: Some(e.to_string()) }
                }
            };
            snapshot = self
                .post(&format!("/plan-runs/{}/tool-results", snapshot.id), &body)
                .await?;
        }
        Ok(snapshot)
    }

    /// Authenticated health probe. Returns whether the credential was accepted.
    pub async fn check_health(&self, health_path: &str) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            error!("Orchestrator API key validation skipped: key not set");
            return false;
        };
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), health_path);
        match self.client.get(&url).bearer_auth(api_key).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Orchestrator API key validated successfully: {}", resp.status());
                true
            }
            Ok(resp) => {
                error!("Orchestrator API key validation failed: {}", resp.status());
                false
            }
            Err(e) => {
                error!("Orchestrator API connection error: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl WorkflowEngine for RemoteWorkflowEngine {
    async fn start(&self, task: &CurationTask) -> Result<RunSnapshot, CurationError> {
        info!(
            keywords = %task.keywords,
            threshold = task.threshold,
            "starting curation run"
        );
        let request = StartRequest {
            query: task.prompt(&self.model),
            tools: self.tools.descriptors(),
            llm: LlmSelection {
                provider: &self.llm_provider,
                model: &self.model,
            },
        };
        let snapshot = self.post("/plan-runs", &request).await?;
        let snapshot = self.drive(snapshot).await?;
        info!(run = %snapshot.id, state = ?snapshot.state, "run started");
        Ok(snapshot)
    }

    async fn resume(
        &self,
        run: &RunSnapshot,
        clarification: &ClarificationRequest,
        decision: Decision,
        edited: Option<&ArticleRecord>,
    ) -> Result<RunSnapshot, CurationError> {
        if run.state == RunState::Complete || run.state == RunState::Failed {
            return Err(CurationError::Workflow(format!(
                "run {} is {:?} and cannot be resumed",
                run.id, run.state
            )));
        }
        let content = match decision {
            Decision::Edit => edited.unwrap_or(&clarification.content),
            _ => &clarification.content,
        };

        // A decision accepted before a failed resume must not be sent twice.
        let key = (run.id.clone(), clarification.id.clone());
        let already_resolved = clarification.resolved
            || run
                .clarifications
                .iter()
                .any(|c| c.id == clarification.id && c.resolved)
            || self.awaiting_resume.lock().await.contains(&key);
        if already_resolved {
            debug!(run = %run.id, clarification = %clarification.id, "decision already recorded, resuming only");
        } else {
            self.post(
                &format!("/plan-runs/{}/clarifications/{}/resolve", run.id, clarification.id),
                &json!({ "response": decision, "content": content }),
            )
            .await?;
            self.awaiting_resume.lock().await.insert(key.clone());
        }

        let snapshot = self
            .post(&format!("/plan-runs/{}/resume", run.id), &json!({}))
            .await?;
        self.awaiting_resume.lock().await.remove(&key);
        let snapshot = self.drive(snapshot).await?;
        info!(run = %snapshot.id, state = ?snapshot.state, %decision, "run resumed");
        Ok(snapshot)
    }
}
