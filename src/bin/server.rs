use anyhow::Context;
use clap::Parser;
use event_relay::api::create_api_server;
use event_relay::config::{LogFormat, RelayConfig};
use event_relay::metrics::install_recorder;
use event_relay::relay::{HttpDeliveryClient, RelayEngine};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::parse();
    init_tracing(&config);

    config.validate()?;

    let metrics = config.metrics_config();
    if metrics.enabled {
        install_recorder()?;
        info!(endpoint = %metrics.endpoint, "Prometheus metrics enabled");
    }

    let client = HttpDeliveryClient::new(&config.delivery_config())?;
    info!(
        listen_addr = %config.listen_addr,
        destination = %client.url(),
        max_queue_size = ?config.max_queue_size,
        retry_interval_secs = config.retry_interval_secs,
        async_queue = config.async_queue,
        "Starting event relay"
    );

    let engine = Arc::new(RelayEngine::new(config.engine_config(), Arc::new(client)));
    let retry_loop = engine.spawn_retry_loop();

    let app = create_api_server(engine.clone(), config.inbound_auth()?, &metrics);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Intake listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("intake server failed")?;

    engine.terminate();
    engine.wait_terminated().await;
    if let Err(e) = retry_loop.await {
        error!(error = %e, "Retry loop task failed");
    }

    let stats = engine.stats();
    info!(
        stats = %stats,
        drop_rate_pct = stats.drop_rate(),
        "Event relay stopped"
    );
    Ok(())
}

fn init_tracing(config: &RelayConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into());
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
