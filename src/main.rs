//! Race Results Server
//!
//! Loads the race catalogue, opens the result store and serves the
//! WebSocket API until interrupted.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use race_results::{
    VERSION,
    config::AppConfig,
    network::RaceServer,
    race::{
        catalogue::{load_catalogue, seed_demo},
        Clock, FileBackend, ParticipantRegistry, RaceService, ResultStore, SimulationParams,
        SystemClock, UserDirectory,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Race Results Server v{}", VERSION);

    let config = AppConfig::from_env().context("invalid configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let users = Arc::new(UserDirectory::new());

    let registry = match &config.storage.catalogue {
        Some(path) => load_catalogue(path)
            .with_context(|| format!("loading catalogue {}", path.display()))?,
        None => {
            warn!("RACE_CATALOGUE not set, using demo races");
            let registry = ParticipantRegistry::new();
            seed_demo(&registry, &users, clock.now()).await?;
            registry
        }
    };

    let store = match &config.storage.data_dir {
        Some(dir) => {
            let backend = FileBackend::open(dir)
                .with_context(|| format!("opening data dir {}", dir.display()))?;
            info!("Results stored in {}", backend.dir().display());
            ResultStore::new(Box::new(backend))
        }
        None => {
            warn!("RACE_DATA_DIR not set, results kept in memory only");
            ResultStore::in_memory()
        }
    };

    let params = SimulationParams::default();
    info!(
        "Simulation: base {} ms + up to {} ms, field spread {}‰",
        params.base_time_ms, params.base_spread_ms, params.field_spread_permille
    );

    let service = Arc::new(RaceService::new(
        Arc::new(registry),
        users,
        Arc::new(store),
        clock,
        params,
    ));

    let server = Arc::new(RaceServer::new(config.server, config.auth, service));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
