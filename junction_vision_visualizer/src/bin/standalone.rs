use junction_vision::core_modules::detection::SimulatedDetectionSource;
use junction_vision::{JunctionConfig, SignalRuntime};
use junction_vision_visualizer::{ServerConfig, start_server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("junction_vision=info,junction_vision_visualizer=info")
            }),
        )
        .init();

    let config = JunctionConfig::from_env()?;
    let cfg = ServerConfig::from_env(config.simulation.frame_width, config.simulation.frame_height);

    // No camera integration here: both directions run on simulated detections.
    let source_a = SimulatedDetectionSource::for_stream(config.simulation.clone(), 0);
    let source_b = SimulatedDetectionSource::for_stream(config.simulation.clone(), 1);
    let runtime = SignalRuntime::new(config, Box::new(source_a), Box::new(source_b));
    let store = runtime.store();

    let server = start_server(store, cfg).await?;
    let pipeline = runtime.spawn(async {
        let _ = tokio::signal::ctrl_c().await;
    });

    pipeline.await?;
    server.abort();
    Ok(())
}
