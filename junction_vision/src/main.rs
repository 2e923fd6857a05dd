// Headless runner: drives the junction from simulated detections and logs
// every published snapshot. The visualizer crate serves the same loop over HTTP.

use junction_vision::core_modules::detection::SimulatedDetectionSource;
use junction_vision::{JunctionConfig, SignalRuntime};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("junction_vision=info")),
        )
        .init();

    let config = match JunctionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "could not load configuration");
            std::process::exit(1);
        }
    };
    info!(
        tick_ms = config.tick_interval_ms,
        min_green = config.timing.min_green_secs,
        max_green = config.timing.max_green_secs,
        "Junction Vision - headless runner"
    );

    let source_a = SimulatedDetectionSource::for_stream(config.simulation.clone(), 0);
    let source_b = SimulatedDetectionSource::for_stream(config.simulation.clone(), 1);
    let runtime = SignalRuntime::new(config, Box::new(source_a), Box::new(source_b));

    let mut updates = runtime.store().subscribe();
    let handle = runtime.spawn(async {
        let _ = tokio::signal::ctrl_c().await;
    });

    while updates.changed().await.is_ok() {
        let s = updates.borrow_and_update().clone();
        info!(
            tick = s.tick,
            phase = ?s.phase,
            remaining_secs = s.time_remaining_secs,
            a_queue = s.direction_a.metrics.queue_length,
            b_queue = s.direction_b.metrics.queue_length,
            reduction_pct = s.traffic_reduction_pct,
            "snapshot"
        );
    }

    if let Err(e) = handle.await {
        error!(error = %e, "runtime task failed");
    }
}
