use std::sync::Arc;

use alertbridge::Result;
use alertbridge::alertmanager::AlertmanagerClient;
use alertbridge::config::ConfigHandle;
use alertbridge::engine::LifecycleEngine;
use alertbridge::error::{ConfigError, Error};
use alertbridge::ingress::{ApiState, router};
use alertbridge::mattermost::MattermostClient;
use alertbridge::store::SqliteStateStore;
use alertbridge::telemetry::init_tracing;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::cli::Cli;

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let config = Arc::new(ConfigHandle::init(&cli.config)?);
    let settings = config.load();
    info!(
        path = %cli.config.display(),
        alert_configs = settings.alert_configs.len(),
        actions = settings.server.site_url.is_some(),
        "configuration loaded"
    );
    if cli.check_config {
        info!("configuration is valid");
        return Ok(());
    }

    let store = SqliteStateStore::connect(&settings.store.database_url).await?;
    let messenger = MattermostClient::new(&settings.mattermost)?;
    let alertmanager = AlertmanagerClient::new(
        settings.alertmanager.request_timeout,
        settings.alertmanager.connect_timeout,
    )?;
    let engine = LifecycleEngine::new(
        Arc::new(store.clone()),
        Arc::new(messenger),
        alertmanager,
    );

    let listen_addr = cli.listen.unwrap_or(settings.server.listen_addr);
    let listener = TcpListener::bind(listen_addr).await.map_err(|err| {
        ConfigError::InvalidField {
            field: "server.listen_addr".to_string(),
            message: format!("cannot bind {listen_addr}: {err}"),
        }
    })?;
    info!(%listen_addr, action_path = %settings.server.action_path, "listening");

    let app = router(ApiState {
        config: Arc::clone(&config),
        engine: Arc::new(engine),
    });
    let reloader = tokio::spawn(reload_on_hangup(Arc::clone(&config)));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    reloader.abort();
    store.close().await;
    served.map_err(Error::Server)?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(unix)]
async fn reload_on_hangup(config: Arc<ConfigHandle>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "SIGHUP reload unavailable");
            return;
        }
    };
    while hangups.recv().await.is_some() {
        if let Err(err) = config.reload() {
            warn!(error = %err, "configuration reload failed, keeping previous snapshot");
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_config: Arc<ConfigHandle>) {}
