use anyhow::{Context, Result};
use pulsesim::api::{create_app, AppParts, AuthContext};
use pulsesim::config::{self, PulseConfig};
use pulsesim::distribution::{spawn_flush_loop, Distributor};
use pulsesim::pipeline::ReadingPipeline;
use pulsesim::simulator::{Simulator, SimulatorOptions};
use pulsesim::storage::{run_retention_loop, ReadingStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "pulsesim.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulsesim=info".into()),
        )
        .init();

    info!("pulsesim starting...");

    let config_path = config::config_path_from_env(DEFAULT_CONFIG_PATH);
    let mut config = if Path::new(&config_path).exists() {
        info!(path = %config_path, "Loading configuration");
        config::load_config(&config_path)?
    } else {
        warn!(path = %config_path, "Config file not found, using defaults");
        PulseConfig::default()
    };
    config::apply_env_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    // Durable sink + retention
    let store = Arc::new(
        ReadingStore::open(&config.storage.db_path)
            .with_context(|| format!("Failed to open store at {}", config.storage.db_path))?,
    );
    info!(path = %config.storage.db_path, "Reading store ready");
    tokio::spawn(run_retention_loop(
        Arc::clone(&store),
        config.storage.retention_horizon(),
        config.storage.retention_interval(),
    ));

    // Real-time distribution
    let distributor = Arc::new(Distributor::new());
    spawn_flush_loop(Arc::clone(&distributor), config.distributor.flush_interval());

    // Simulator
    let pipeline = Arc::new(ReadingPipeline::new(Arc::clone(&store), Arc::clone(&distributor)));
    let simulator = Arc::new(Simulator::new(
        pipeline,
        SimulatorOptions {
            tick_interval: config.simulator.tick_interval(),
            speed: config.simulator.speed,
            seed: config.simulator.seed,
            ..SimulatorOptions::default()
        },
    ));
    let change = simulator.sync_roster(&config.roster);
    distributor.apply_roster_change(&change.added, &change.removed);

    if config.simulator.auto_start {
        simulator.start();
    }

    // Identity
    let registry = Arc::new(config.auth.registry()?);
    if config.auth.enabled {
        info!(tokens = registry.len(), "Token authentication enabled");
    } else {
        warn!("Authentication disabled: every caller is privileged");
    }

    let app = create_app(AppParts {
        simulator: Some(Arc::clone(&simulator)),
        distributor,
        store,
        auth: AuthContext::new(registry, config.auth.enabled),
        default_history_window_hours: config.history.default_window_hours,
    });

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    simulator.stop();
    info!("pulsesim stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
