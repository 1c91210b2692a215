//! Declarative tool contract exposed to the orchestration engine.
//!
//! The engine only sees a [`ToolDescriptor`]; when it decides to call a tool the
//! workflow proxy looks the tool up in a [`ToolRegistry`] and runs it locally.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::articles::ArticleSource;
use crate::error::CurationError;

/// Stable id/name/description triple plus the JSON schema of the arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub args_schema: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    async fn run(&self, args: Value) -> Result<Value, CurationError>;
}

/// Fetch news articles for `{"keywords": "..."}`.
pub struct NewsFetchTool {
    source: Arc<dyn ArticleSource>,
}

impl NewsFetchTool {
    pub const ID: &'static str = "news_fetch";

    pub fn new(source: Arc<dyn ArticleSource>) -> Self {
        Self { source }
    }
}

#[derive(Deserialize)]
struct NewsFetchArgs {
    keywords: String,
}

#[async_trait]
impl Tool for NewsFetchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            id: Self::ID.to_string(),
            name: Self::ID.to_string(),
            description: "Fetch news articles based on keywords using NewsAPI.".to_string(),
            args_schema: json!({
                "type": "object",
                "properties": {
                    "keywords": {
                        "type": "string",
                        "description": "Search keywords"
                    }
                },
                "required": ["keywords"]
            }),
        }
    }

    async fn run(&self, args: Value) -> Result<Value, CurationError> {
        let args: NewsFetchArgs = serde_json::from_value(args).map_err(|e| {
            CurationError::Workflow(format!("invalid arguments for {}: {}", Self::ID, e))
        })?;
        let articles = self.source.fetch(&args.keywords).await?;
        serde_json::to_value(articles)
            .map_err(|e| CurationError::Workflow(format!("failed to encode articles: {}", e)))
    }
}

/// Tools available to a run, keyed by id.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.descriptor().id, tool);
        self
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    pub async fn dispatch(&self, tool_id: &str, args: Value) -> Result<Value, CurationError> {
        let tool = self
            .tools
            .get(tool_id)
            .ok_or_else(|| CurationError::Workflow(format!("engine requested unknown tool '{}'", tool_id)))?;
        info!(tool = tool_id, "dispatching tool call");
        tool.run(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::articles::ArticleRecord;

    struct FixedSource;

    #[async_trait]
    impl ArticleSource for FixedSource {
        async fn fetch(&self, keywords: &str) -> Result<Vec<ArticleRecord>, CurationError> {
            Ok(vec![ArticleRecord::new(keywords, "d")])
        }
    }

    #[tokio::test]
    async fn dispatches_news_fetch() {
        let registry = ToolRegistry::new().with_tool(Arc::new(NewsFetchTool::new(Arc::new(FixedSource))));
        let out = registry
            .dispatch("news_fetch", json!({"keywords": "AI"}))
            .await
            .unwrap();
        assert_eq!(out[0]["title"], "AI");
        assert_eq!(registry.descriptors()[0].name, "news_fetch");
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_args() {
        let registry = ToolRegistry::new().with_tool(Arc::new(NewsFetchTool::new(Arc::new(FixedSource))));
        assert!(matches!(
            registry.dispatch("weather", json!({})).await,
            Err(CurationError::Workflow(_))
        ));
        assert!(matches!(
            registry.dispatch("news_fetch", json!({"query": "AI"})).await,
            Err(CurationError::Workflow(_))
        ));
    }
}
