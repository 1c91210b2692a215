use std::sync::Arc;

use mockito::{Matcher, Mock, ServerGuard};

use curator::articles::NewsApiSource;
use curator::error::CurationError;
use curator::llm::ollama::OllamaRuntime;
use curator::preflight::{Preflight, PreflightValidator};
use curator::tools::ToolRegistry;
use curator::workflow::remote::RemoteWorkflowEngine;

struct Services {
    orchestrator: ServerGuard,
    news: ServerGuard,
    ollama: ServerGuard,
}

impl Services {
    async fn start() -> Self {
        Self {
            orchestrator: mockito::Server::new_async().await,
            news: mockito::Server::new_async().await,
            ollama: mockito::Server::new_async().await,
        }
    }

    fn validator(&self, orchestrator_key: Option<&str>, news_key: Option<&str>) -> PreflightValidator {
        let engine = Arc::new(RemoteWorkflowEngine::new(
            self.orchestrator.url(),
            orchestrator_key.map(str::to_string),
            ToolRegistry::new(),
        ));
        let news = NewsApiSource::new(self.news.url(), news_key.map(str::to_string));
        let runtime = Arc::new(OllamaRuntime::new(self.ollama.url()));
        PreflightValidator::new(engine, news, runtime).with_model("llama3")
    }

    async fn health(&mut self, status: usize, hits: usize) -> Mock {
        self.orchestrator
            .mock("GET", "/health")
            .match_header("authorization", "Bearer portia-key")
            .with_status(status)
            .expect(hits)
            .create_async()
            .await
    }

    async fn news_probe(&mut self, status: usize, hits: usize) -> Mock {
        self.news
            .mock("GET", "/everything")
            .match_query(Matcher::UrlEncoded("q".into(), "test".into()))
            .with_status(status)
            .with_body(r#"{"status": "ok", "articles": []}"#)
            .expect(hits)
            .create_async()
            .await
    }

    async fn tags(&mut self, body: &str, hits: usize) -> Mock {
        self.ollama
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }
}

const TAGS_WITH_LLAMA3: &str = r#"{"models": [{"name": "mistral:latest"}, {"name": "llama3:latest", "size": 4661224676}]}"#;

#[tokio::test]
async fn test_all_checks_pass() {
    let mut services = Services::start().await;
    let health = services.health(200, 1).await;
    let news = services.news_probe(200, 1).await;
    let tags = services.tags(TAGS_WITH_LLAMA3, 1).await;

    let validator = services.validator(Some("portia-key"), Some("news-key"));
    validator.check_all().await.expect("preflight passes");

    health.assert_async().await;
    news.assert_async().await;
    tags.assert_async().await;
}

#[tokio::test]
async fn test_orchestrator_rejection_stops_remaining_checks() {
    let mut services = Services::start().await;
    let health = services.health(401, 1).await;
    let news = services.news_probe(200, 0).await;
    let tags = services.tags(TAGS_WITH_LLAMA3, 0).await;

    let validator = services.validator(Some("portia-key"), Some("news-key"));
    let err = validator.check_all().await.unwrap_err();

    match err {
        CurationError::Authentication(msg) => assert!(msg.contains("PORTIA_API_KEY")),
        other => panic!("expected authentication error, got {:?}", other),
    }
    health.assert_async().await;
    news.assert_async().await;
    tags.assert_async().await;
}

#[tokio::test]
async fn test_news_key_rejection() {
    let mut services = Services::start().await;
    let _health = services.health(200, 1).await;
    let _news = services.news_probe(401, 1).await;
    let tags = services.tags(TAGS_WITH_LLAMA3, 0).await;

    let validator = services.validator(Some("portia-key"), Some("news-key"));
    let err = validator.check_all().await.unwrap_err();

    assert!(matches!(err, CurationError::Authentication(ref m) if m.contains("NEWSAPI_KEY")));
    let CurationError::Authentication(msg) = err else { unreachable!() };
    assert!(msg.contains(&format!("{}/everything?q=test", services.news.url())));
    assert!(!msg.contains("newsapi.org"));
    tags.assert_async().await;
}

#[tokio::test]
async fn test_missing_model_names_remediation() {
    let mut services = Services::start().await;
    let _health = services.health(200, 1).await;
    let _news = services.news_probe(200, 1).await;
    let _tags = services
        .tags(r#"{"models": [{"name": "llama3.2:3b"}]}"#, 1)
        .await;

    let validator = services.validator(Some("portia-key"), Some("news-key"));
    let err = validator.check_all().await.unwrap_err();

    match err {
        CurationError::DependencyUnavailable(msg) => {
            assert!(msg.contains("llama3"));
            assert!(msg.contains("ollama pull llama3"));
        }
        other => panic!("expected dependency error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_runtime_is_unavailable() {
    let mut services = Services::start().await;
    let _health = services.health(200, 1).await;
    let _news = services.news_probe(200, 1).await;
    let _tags = services
        .ollama
        .mock("GET", "/api/tags")
        .with_status(500)
        .create_async()
        .await;

    let validator = services.validator(Some("portia-key"), Some("news-key"));
    assert!(!validator.check_model_runtime().await);
    assert!(matches!(
        validator.check_all().await,
        Err(CurationError::DependencyUnavailable(_))
    ));
}

#[tokio::test]
async fn test_missing_keys_are_configuration_errors() {
    let mut services = Services::start().await;
    let health = services.health(200, 0).await;

    let err = services.validator(None, Some("news-key")).check_all().await.unwrap_err();
    assert!(matches!(err, CurationError::Configuration(ref m) if m.contains("PORTIA_API_KEY")));

    let err = services.validator(Some("portia-key"), None).check_all().await.unwrap_err();
    assert!(matches!(err, CurationError::Configuration(ref m) if m.contains("NEWSAPI_KEY")));

    health.assert_async().await;
}

#[tokio::test]
async fn test_verdict_reuses_outcomes_without_requests() {
    let mut services = Services::start().await;
    let health = services.health(200, 0).await;
    let news = services.news_probe(200, 0).await;
    let tags = services.tags(TAGS_WITH_LLAMA3, 0).await;

    let validator = services.validator(Some("portia-key"), Some("news-key"));
    assert!(validator.verdict(true, true, true).is_ok());
    assert!(matches!(
        validator.verdict(true, false, false),
        Err(CurationError::Authentication(ref m)) if m.contains("NEWSAPI_KEY")
    ));
    assert!(matches!(
        validator.verdict(true, true, false),
        Err(CurationError::DependencyUnavailable(_))
    ));

    let keyless = services.validator(None, Some("news-key"));
    assert!(matches!(
        keyless.verdict(true, true, true),
        Err(CurationError::Configuration(_))
    ));

    health.assert_async().await;
    news.assert_async().await;
    tags.assert_async().await;
}
