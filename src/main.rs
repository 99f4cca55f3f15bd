use bulksink::config::{PipelineConfig, load_config};
use bulksink::core::start_pipeline_with_config;
use bulksink::error::PipelineError;
use bulksink::metrics::init_metrics;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

/// Jemalloc allocator for steadier memory use under sustained ingestion.
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Entry point for the bulksink daemon.
///
/// Loads configuration, initializes tracing and metrics, then runs the pipeline on a
/// multi-threaded runtime until its input is exhausted or a shutdown signal arrives.
fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config::<PipelineConfig>()?;

    if config.metrics.enabled {
        init_metrics(config.metrics.port)?;
    }

    info!(
        sink_target = config.sink.target.as_deref().unwrap_or_default(),
        "bulksink daemon starting"
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config))?;

    Ok(())
}

async fn async_main(config: PipelineConfig) -> anyhow::Result<()> {
    if let Err(err) = start_pipeline_with_config(config).await {
        let err = report(err);
        error!("an error occurred in the bulksink daemon: {err:#}");
        return Err(err);
    }

    Ok(())
}

/// Wraps a pipeline error so that `{:#}` renders its whole source chain.
fn report(err: PipelineError) -> anyhow::Error {
    anyhow::Error::new(err)
}

/// Initializes the tracing subscriber for logging.
///
/// Logs at INFO by default, configurable via the `RUST_LOG` environment variable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
