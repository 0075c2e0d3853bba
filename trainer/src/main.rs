use std::sync::Arc;

use anyhow::Context;
use session::registry::SessionRegistry;
use session::store::yaml_store::YamlFileStore;
use tokio::net::TcpListener;
use trainer::{
    api::{Dispatcher, action::Action, server},
    config::AppConfig,
    database::TrainingDatabase,
    logger::init_tracing,
    orchestrator::LifecycleOrchestrator,
    services::http::{HttpContentService, HttpInstantiationService},
};

/// Wires the registries and both service clients into one orchestrator.
fn build_orchestrator(cfg: &AppConfig) -> anyhow::Result<LifecycleOrchestrator> {
    let active = Arc::new(SessionRegistry::new(
        "active_sessions",
        Arc::new(YamlFileStore::new(cfg.active_sessions_path())),
    ));
    let saved = Arc::new(SessionRegistry::new(
        "saved_configurations",
        Arc::new(YamlFileStore::new(cfg.saved_configurations_path())),
    ));

    let content = HttpContentService::new(cfg.content_server_url.clone(), cfg.content_timeout)
        .context("content service client")?;
    let instantiation = HttpInstantiationService::new(
        cfg.instantiation_server_url.clone(),
        cfg.instantiation_timeout,
    )
    .context("instantiation service client")?;

    Ok(LifecycleOrchestrator::new(
        TrainingDatabase::from_config(cfg),
        active,
        saved,
        Arc::new(content),
        Arc::new(instantiation),
        cfg.max_sessions,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting training server...");

    let cfg = AppConfig::from_env();
    tracing::info!(
        database = %cfg.database_dir.display(),
        content = %cfg.content_server_url,
        instantiation = %cfg.instantiation_server_url,
        max_sessions = cfg.max_sessions,
        "configuration loaded"
    );

    let orchestrator = Arc::new(build_orchestrator(&cfg)?);
    let dispatcher = Arc::new(Dispatcher::new(
        TrainingDatabase::from_config(&cfg),
        orchestrator,
        cfg.log_params,
    ));

    let actions: Vec<_> = Action::ALL.iter().map(Action::as_str).collect();
    tracing::info!(?actions, "supported actions");

    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("bind {}", cfg.bind_addr))?;
    server::serve(listener, dispatcher).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
