use std::sync::Arc;

use alert_engine::server::{install_metrics_recorder, router, serve};
use alert_engine::{
    run_membership_loop, AlertsEngine, Config, DefinitionsStore, InMemoryDefinitionsStore,
    LoggingAlertSink, StaticMembership,
};
use alert_partitioning::PartitionManager;
use envconfig::Envconfig;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    );
    tracing_subscriber::registry().with(log_layer).init();
}

fn load_definitions(config: &Config) -> anyhow::Result<InMemoryDefinitionsStore> {
    match &config.definitions_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(InMemoryDefinitionsStore::from_json(&json)?)
        }
        None => Ok(InMemoryDefinitionsStore::new()),
    }
}

#[tokio::main]
pub async fn main() -> Result<(), anyhow::Error> {
    setup_tracing();
    info!("Starting alerting engine...");

    let config = Config::init_from_env()?;
    let node = config.node_member_id();
    let members = config.cluster_member_ids()?;
    info!(
        %node,
        members = ?members,
        debounce_ms = config.membership_debounce_ms,
        "Configuration loaded"
    );

    // Installed before anything records.
    let metrics = install_metrics_recorder()?;

    let definitions = Arc::new(load_definitions(&config)?);
    let manager = Arc::new(PartitionManager::new());
    let engine = Arc::new(AlertsEngine::new(
        node,
        definitions.clone(),
        Arc::new(LoggingAlertSink),
    ));
    manager.register_listener(node, engine);
    manager.start()?;

    let triggers = definitions.list_triggers().await?;
    info!(triggers = triggers.len(), "Loaded trigger definitions");
    manager.add_entries(triggers);

    // Health check server
    let bind = config.bind_address();
    let app = router(manager.clone(), metrics);
    tokio::task::spawn(async move {
        if let Err(e) = serve(app, &bind).await {
            tracing::error!(error = %e, %bind, "health server failed");
        }
    });

    let cancel = CancellationToken::new();
    let membership = tokio::spawn(run_membership_loop(
        manager.clone(),
        StaticMembership::new(members),
        config.membership_debounce(),
        cancel.child_token(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();

    membership.await??;
    manager.stop().await;

    info!("Alerting engine shut down");
    Ok(())
}
