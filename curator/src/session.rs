//! Review session: owns the curation state and drives the human-review loop.
//!
//! Every UI event is one call into [`ReviewSessionController`]. A failed event leaves
//! the state as it was and only records the error message for display.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::articles::ArticleRecord;
use crate::error::{classify_engine_failure, CredentialHint, CurationError};
use crate::preflight::Preflight;
use crate::workflow::{ClarificationRequest, CurationTask, Decision, RunSnapshot, RunState, WorkflowEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Preflighting,
    Running,
    AwaitingReview,
    Done,
}

/// Process-wide curation state.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub task: Option<CurationTask>,
    pub run: Option<RunSnapshot>,
    pub curated: Vec<ArticleRecord>,
    pub outstanding: Vec<ClarificationRequest>,
    /// Clarifications already decided in this cycle; never offered again.
    pub resolved_ids: HashSet<String>,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            task: None,
            run: None,
            curated: Vec::new(),
            outstanding: Vec::new(),
            resolved_ids: HashSet::new(),
            last_error: None,
        }
    }
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurationView {
    pub phase: Phase,
    pub keywords: Option<String>,
    pub threshold: Option<f64>,
    pub run_id: Option<String>,
    pub outstanding: Vec<ClarificationView>,
    pub curated: Vec<CuratedItem>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClarificationView {
    pub id: String,
    pub user_guidance: String,
    pub options: Vec<Decision>,
    pub title: String,
    pub description: String,
    /// Only the first outstanding clarification may be resolved.
    pub actionable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CuratedItem {
    pub title: String,
    pub description: String,
    pub url: Option<String>,
}

pub struct ReviewSessionController {
    preflight: Arc<dyn Preflight>,
    engine: Arc<dyn WorkflowEngine>,
    hint: CredentialHint,
    state: SessionState,
}

impl ReviewSessionController {
    pub fn new(preflight: Arc<dyn Preflight>, engine: Arc<dyn WorkflowEngine>) -> Self {
        Self {
            preflight,
            engine,
            hint: CredentialHint::default(),
            state: SessionState::default(),
        }
    }

    pub fn with_credential_hint(mut self, hint: CredentialHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle "Curate Content": validate input, preflight, start a run.
    pub async fn submit(&mut self, keywords: &str, threshold: f64) -> Result<(), CurationError> {
        let result = self.try_submit(keywords, threshold).await;
        self.record(result)
    }

    /// Handle "Submit Review" for one clarification.
    pub async fn review(
        &mut self,
        clarification_id: &str,
        decision: Decision,
        edited_description: Option<String>,
    ) -> Result<(), CurationError> {
        let result = self.try_review(clarification_id, decision, edited_description).await;
        self.record(result)
    }

    fn record(&mut self, result: Result<(), CurationError>) -> Result<(), CurationError> {
        match &result {
            Ok(()) => self.state.last_error = None,
            Err(e) => {
                error!("curation event failed: {}", e);
                self.state.last_error = Some(e.user_message());
            }
        }
        result
    }

    async fn try_submit(&mut self, keywords: &str, threshold: f64) -> Result<(), CurationError> {
        let task = CurationTask::new(keywords, threshold)?;
        let previous = self.state.phase;

        self.state.phase = Phase::Preflighting;
        if let Err(e) = self.preflight.check_all().await {
            self.state.phase = previous;
            return Err(e);
        }

        self.state.phase = Phase::Running;
        let snapshot = match self.engine.start(&task).await.and_then(|s| ensure_not_failed(s, &self.hint)) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.state.phase = previous;
                return Err(e);
            }
        };

        let curated = if snapshot.state == RunState::NeedsClarification {
            Vec::new()
        } else {
            snapshot.output_articles()
        };
        let outstanding = if snapshot.state == RunState::NeedsClarification {
            snapshot.outstanding()
        } else {
            Vec::new()
        };

        info!(
            run = %snapshot.id,
            curated = curated.len(),
            outstanding = outstanding.len(),
            "curation run started"
        );
        self.state = SessionState {
            phase: phase_for(&snapshot, &outstanding),
            task: Some(task),
            run: Some(snapshot),
            curated,
            outstanding,
            resolved_ids: HashSet::new(),
            last_error: None,
        };
        Ok(())
    }

    async fn try_review(
        &mut self,
        clarification_id: &str,
        decision: Decision,
        edited_description: Option<String>,
    ) -> Result<(), CurationError> {
        let run = self
            .state
            .run
            .as_ref()
            .ok_or_else(|| CurationError::InvalidInput("no curation run in progress".into()))?;
        let next = self
            .state
            .outstanding
            .first()
            .ok_or_else(|| CurationError::InvalidInput("no clarification is awaiting review".into()))?;

        if next.id != clarification_id {
            return Err(if self.state.outstanding.iter().any(|c| c.id == clarification_id) {
                CurationError::InvalidInput(format!(
                    "clarification {} must be resolved before {}",
                    next.id, clarification_id
                ))
            } else {
                CurationError::InvalidInput(format!("unknown clarification {}", clarification_id))
            });
        }
        if !next.options.contains(&decision) {
            return Err(CurationError::InvalidInput(format!(
                "'{}' is not an option for clarification {}",
                decision, next.id
            )));
        }

        let content = match decision {
            Decision::Edit => match edited_description {
                Some(text) => next.content.with_description(text),
                None => next.content.clone(),
            },
            _ => next.content.clone(),
        };
        let edited = (decision == Decision::Edit).then_some(&content);

        let previous = self.state.phase;
        self.state.phase = Phase::Running;
        let snapshot = match self
            .engine
            .resume(run, next, decision, edited)
            .await
            .and_then(|s| ensure_not_failed(s, &self.hint))
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.state.phase = previous;
                return Err(e);
            }
        };

        let resolved = self.state.outstanding.remove(0);
        info!(clarification = %resolved.id, %decision, "clarification resolved");
        self.state.resolved_ids.insert(resolved.id);
        if decision != Decision::Reject {
            self.state.curated.push(content);
        }

        let resolved_ids = &self.state.resolved_ids;
        self.state.outstanding = snapshot
            .outstanding()
            .into_iter()
            .filter(|c| !resolved_ids.contains(&c.id))
            .collect();
        if snapshot.state == RunState::Complete && !self.state.outstanding.is_empty() {
            warn!(run = %snapshot.id, "run complete with clarifications still open");
        }
        self.state.phase = phase_for(&snapshot, &self.state.outstanding);
        self.state.run = Some(snapshot);
        Ok(())
    }

    /// Pure projection of the current state.
    pub fn render(&self) -> CurationView {
        let s = &self.state;
        CurationView {
            phase: s.phase,
            keywords: s.task.as_ref().map(|t| t.keywords.clone()),
            threshold: s.task.as_ref().map(|t| t.threshold),
            run_id: s.run.as_ref().map(|r| r.id.clone()),
            outstanding: s
                .outstanding
                .iter()
                .enumerate()
                .map(|(idx, c)| ClarificationView {
                    id: c.id.clone(),
                    user_guidance: c.user_guidance(),
                    options: c.options.clone(),
                    title: c.content.display_title().to_string(),
                    description: c.content.description.clone(),
                    actionable: idx == 0,
                })
                .collect(),
            curated: s
                .curated
                .iter()
                .map(|a| CuratedItem {
                    title: a.display_title().to_string(),
                    description: a.description.clone(),
                    url: a.extra.get("url").and_then(|u| u.as_str()).map(str::to_string),
                })
                .collect(),
            error: s.last_error.clone(),
        }
    }

    /// Full run record of the current run, for the audit dump.
    pub fn audit(&self) -> Option<serde_json::Value> {
        self.state.run.as_ref().map(|r| r.raw.clone())
    }
}

fn ensure_not_failed(snapshot: RunSnapshot, hint: &CredentialHint) -> Result<RunSnapshot, CurationError> {
    if snapshot.state == RunState::Failed {
        let message = snapshot
            .error
            .clone()
            .unwrap_or_else(|| format!("run {} failed", snapshot.id));
        return Err(classify_engine_failure(&message, hint));
    }
    Ok(snapshot)
}

fn phase_for(snapshot: &RunSnapshot, outstanding: &[ClarificationRequest]) -> Phase {
    if !outstanding.is_empty() {
        Phase::AwaitingReview
    } else if snapshot.state == RunState::Running {
        Phase::Running
    } else {
        Phase::Done
    }
}
