use std::path::Path;

use common::Config;
use curator::components::Components;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let _ = dotenv::dotenv();

    let config = Config::load_with_defaults(
        Some(Path::new("config.default.toml")),
        Some(Path::new("config.toml")),
    )
    .await?;
    let components = Components::from_config(&config)?;
    let preflight = &components.preflight;

    println!("\n{}", "=".repeat(60));
    println!("Curator preflight");
    println!("Orchestrator: {}", config.orchestrator.base_url());
    println!("Article API:  {}", config.news_api.base_url());
    println!("Model:        {} @ {}", config.model_runtime.model(), config.model_runtime.base_url());
    println!("{}", "=".repeat(60));

    for (label, env) in [
        ("Orchestrator key", config.orchestrator.api_key_env()),
        ("Article API key", config.news_api.api_key_env()),
    ] {
        let state = if common::read_secret(env).is_some() { "set" } else { "MISSING" };
        println!("  {:<18} {} ({})", label, state, env);
    }

    let orchestrator_ok = preflight.check_orchestrator().await;
    let news_ok = preflight.check_article_source().await;
    let model_ok = preflight.check_model_runtime().await;
    for (label, ok) in [
        ("orchestrator credential", orchestrator_ok),
        ("article credential", news_ok),
        ("model runtime", model_ok),
    ] {
        println!("  {} {}", if ok { "✓" } else { "✗" }, label);
    }

    println!("{}", "-".repeat(60));
    preflight.verdict(orchestrator_ok, news_ok, model_ok)?;
    println!("All checks passed");
    Ok(())
}
