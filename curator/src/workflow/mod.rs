//! Proxy to the external planning/execution engine.
//!
//! Runs are modelled as plain value snapshots: `start` yields the first snapshot, and
//! `resume` takes the current snapshot plus one human decision and yields the next.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::articles::ArticleRecord;
use crate::error::CurationError;

pub mod remote;

/// Lowest and highest accepted sentiment threshold.
pub const THRESHOLD_RANGE: (f64, f64) = (-1.0, 1.0);

/// A curation request as the human submitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationTask {
    pub keywords: String,
    pub threshold: f64,
}

impl CurationTask {
    pub fn new(keywords: impl Into<String>, threshold: f64) -> Result<Self, CurationError> {
        let keywords = keywords.into().trim().to_string();
        if keywords.is_empty() {
            return Err(CurationError::InvalidInput("keywords must not be empty".into()));
        }
        let (lo, hi) = THRESHOLD_RANGE;
        if !(lo..=hi).contains(&threshold) {
            return Err(CurationError::InvalidInput(format!(
                "sentiment threshold must be between {} and {}, got {}",
                lo, hi, threshold
            )));
        }
        Ok(Self { keywords, threshold })
    }

    /// Natural-language task handed to the engine.
    pub fn prompt(&self, model: &str) -> String {
        format!(
            "Fetch news articles on '{}'. Analyze each for sentiment using {}. \
             Flag if compound sentiment < {} or potentially misleading/offensive (e.g., bias, controversy). \
             If flagged, raise clarification for human review.",
            self.keywords, model, self.threshold
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    NeedsClarification,
    Complete,
    Failed,
}

/// Human verdict on one flagged article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
    Edit,
}

impl Decision {
    pub const ALL: [Decision; 3] = [Decision::Approve, Decision::Reject, Decision::Edit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
            Decision::Edit => "edit",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_options() -> Vec<Decision> {
    Decision::ALL.to_vec()
}

/// One paused decision point raised by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub id: String,
    pub content: ArticleRecord,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_options")]
    pub options: Vec<Decision>,
    #[serde(default)]
    pub resolved: bool,
}

impl ClarificationRequest {
    pub fn user_guidance(&self) -> String {
        format!(
            "Review this content: {} - Reason: {}",
            self.content.display_title(),
            self.reason
        )
    }
}

/// Tool invocation the engine is waiting on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_id: String,
    #[serde(default)]
    pub args: Value,
}

/// Point-in-time view of one run inside the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub id: String,
    pub state: RunState,
    pub clarifications: Vec<ClarificationRequest>,
    pub pending_tool_call: Option<ToolCall>,
    pub final_output: Option<Value>,
    pub error: Option<String>,
    /// Full run record as returned by the engine, kept for auditing.
    pub raw: Value,
}

impl RunSnapshot {
    /// Unresolved clarifications in the order the engine returned them.
    pub fn outstanding(&self) -> Vec<ClarificationRequest> {
        self.clarifications
            .iter()
            .filter(|c| !c.resolved)
            .cloned()
            .collect()
    }

    /// Articles listed in the final output (`{"articles": [...]}`), if any.
    pub fn output_articles(&self) -> Vec<ArticleRecord> {
        self.final_output
            .as_ref()
            .and_then(|out| out.get("articles"))
            .and_then(|articles| serde_json::from_value(articles.clone()).ok())
            .unwrap_or_default()
    }
}

/// Wire shape of a run record. Unknown fields are ignored but survive in `raw`.
#[derive(Debug, Deserialize)]
struct RunRecord {
    id: String,
    state: RunState,
    #[serde(default)]
    clarifications: Vec<ClarificationRequest>,
    #[serde(default)]
    pending_tool_call: Option<ToolCall>,
    #[serde(default)]
    outputs: Option<RunOutputs>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunOutputs {
    #[serde(default)]
    final_output: Option<Value>,
}

impl TryFrom<Value> for RunSnapshot {
    type Error = CurationError;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        let record: RunRecord = serde_json::from_value(raw.clone())
            .map_err(|e| CurationError::Workflow(format!("malformed run record: {}", e)))?;
        Ok(RunSnapshot {
            id: record.id,
            state: record.state,
            clarifications: record.clarifications,
            pending_tool_call: record.pending_tool_call,
            final_output: record.outputs.and_then(|o| o.final_output),
            error: record.error,
            raw,
        })
    }
}

/// The orchestration engine as seen by the session controller.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Issue the task and return whatever state the engine reaches without human input.
    async fn start(&self, task: &CurationTask) -> Result<RunSnapshot, CurationError>;

    /// Supply one decision for one outstanding clarification and continue the run.
    /// `edited` is the replacement content when `decision` is `Edit`.
    async fn resume(
        &self,
        run: &RunSnapshot,
        clarification: &ClarificationRequest,
        decision: Decision,
        edited: Option<&ArticleRecord>,
    ) -> Result<RunSnapshot, CurationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_validation() {
        assert!(CurationTask::new("  ", 0.1).is_err());
        assert!(CurationTask::new("AI", 1.5).is_err());
        assert!(CurationTask::new("AI", f64::NAN).is_err());
        let task = CurationTask::new(" AI ", -1.0).unwrap();
        assert_eq!(task.keywords, "AI");
    }

    #[test]
    fn prompt_interpolates_inputs() {
        let task = CurationTask::new("AI innovation", 0.1).unwrap();
        let prompt = task.prompt("llama3");
        assert!(prompt.starts_with("Fetch news articles on 'AI innovation'."));
        assert!(prompt.contains("using llama3"));
        assert!(prompt.contains("compound sentiment < 0.1"));
        assert!(prompt.contains("raise clarification for human review"));
    }

    #[test]
    fn snapshot_from_record() {
        let raw = json!({
            "id": "run-1",
            "state": "needs_clarification",
            "clarifications": [
                {"id": "c1", "content": {"title": "A", "description": "d"}, "reason": "low sentiment"},
                {"id": "c0", "content": {"title": "Z"}, "reason": "bias", "resolved": true}
            ],
            "plan": {"steps": 3}
        });
        let snap = RunSnapshot::try_from(raw.clone()).unwrap();
        assert_eq!(snap.state, RunState::NeedsClarification);
        let outstanding = snap.outstanding();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].options, Decision::ALL.to_vec());
        assert_eq!(outstanding[0].user_guidance(), "Review this content: A - Reason: low sentiment");
        assert_eq!(snap.raw, raw);
    }

    #[test]
    fn output_articles_are_read() {
        let raw = json!({
            "id": "run-2",
            "state": "complete",
            "outputs": {"final_output": {"articles": [{"title": "B", "description": "e"}]}}
        });
        let snap = RunSnapshot::try_from(raw).unwrap();
        assert_eq!(snap.output_articles(), vec![ArticleRecord::new("B", "e")]);
    }

    #[test]
    fn malformed_record_is_a_workflow_error() {
        let err = RunSnapshot::try_from(json!({"state": "complete"})).unwrap_err();
        assert!(matches!(err, CurationError::Workflow(_)));
    }
}
