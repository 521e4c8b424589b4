use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auto_merge::config::StaticConfig;
use auto_merge::github::OctocrabClient;
use auto_merge::server::{AppState, ServerConfig, build_router};
use auto_merge::webhooks::OwnChecks;
use auto_merge::worker::{Engine, EngineConfig, PullRequestHandler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auto_merge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let engine_config = EngineConfig::from_env();
    info!(?config, ?engine_config, "Starting");

    let github = OctocrabClient::from_token(config.github_token.clone())
        .context("failed to build GitHub client")?;
    let handler = PullRequestHandler::new(
        StaticConfig::new(config.repo_config.clone()),
        github.clone(),
        github,
    );
    let engine = Engine::new(engine_config, handler);
    let own_checks = OwnChecks {
        check_name: config.repo_config.status_check_name.clone(),
        app_slug: config.app_slug.clone(),
    };
    let app = build_router(AppState::with_own_checks(
        engine.clone(),
        config.webhook_secret.clone(),
        own_checks,
    ));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!("listening on {}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    engine.stop();
    Ok(())
}
