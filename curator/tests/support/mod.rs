//! In-process fakes for the preflight and workflow collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use curator::articles::ArticleRecord;
use curator::error::CurationError;
use curator::preflight::Preflight;
use curator::workflow::{ClarificationRequest, CurationTask, Decision, RunSnapshot, WorkflowEngine};

pub struct FakePreflight {
    result: Result<(), CurationError>,
    calls: AtomicUsize,
}

impl FakePreflight {
    pub fn passing() -> Self {
        Self { result: Ok(()), calls: AtomicUsize::new(0) }
    }

    pub fn failing(err: CurationError) -> Self {
        Self { result: Err(err), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Preflight for FakePreflight {
    async fn check_all(&self) -> Result<(), CurationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeCall {
    pub run_id: String,
    pub clarification_id: String,
    pub decision: Decision,
    pub edited: Option<ArticleRecord>,
}

/// Engine that replays scripted snapshots and records every call.
#[derive(Default)]
pub struct FakeEngine {
    start_replies: Mutex<VecDeque<Result<RunSnapshot, CurationError>>>,
    resume_replies: Mutex<VecDeque<Result<RunSnapshot, CurationError>>>,
    pub starts: Mutex<Vec<CurationTask>>,
    pub resumes: Mutex<Vec<ResumeCall>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(self, reply: Result<RunSnapshot, CurationError>) -> Self {
        self.start_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_resume(self, reply: Result<RunSnapshot, CurationError>) -> Self {
        self.resume_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn resume_calls(&self) -> Vec<ResumeCall> {
        self.resumes.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowEngine for FakeEngine {
    async fn start(&self, task: &CurationTask) -> Result<RunSnapshot, CurationError> {
        self.starts.lock().unwrap().push(task.clone());
        self.start_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CurationError::Workflow("unexpected start".into())))
    }

    async fn resume(
        &self,
        run: &RunSnapshot,
        clarification: &ClarificationRequest,
        decision: Decision,
        edited: Option<&ArticleRecord>,
    ) -> Result<RunSnapshot, CurationError> {
        self.resumes.lock().unwrap().push(ResumeCall {
            run_id: run.id.clone(),
            clarification_id: clarification.id.clone(),
            decision,
            edited: edited.cloned(),
        });
        self.resume_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CurationError::Workflow("unexpected resume".into())))
    }
}

pub fn snapshot(raw: Value) -> RunSnapshot {
    RunSnapshot::try_from(raw).expect("valid run record")
}
