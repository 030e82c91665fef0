//! Droplet impact driver
//!
//! Runs one droplet impact with the compiled-in parameters, or with the JSON
//! configuration named by `IMPACT_CONFIG` when that variable is set.

use std::process::ExitCode;

use orchestrator::{create_simulation, load_simulation, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orchestrator=info,kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting droplet impact run");

    let runner = match std::env::var_os("IMPACT_CONFIG") {
        Some(path) => load_simulation(path),
        None => create_simulation(SimulationConfig::default()),
    };

    let result = runner.and_then(|mut runner| runner.run());
    match result {
        Ok(summary) => {
            tracing::info!(
                "Artifacts in {} ({} frames)",
                summary.run_dir.display(),
                summary.frames_written
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
