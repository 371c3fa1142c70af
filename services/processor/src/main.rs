//! Sentinel-2 scene processor.
//!
//! Finds the least cloudy scene over the area of interest, computes
//! vegetation and water indices, and appends the result to the history
//! in object storage.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pipeline::ScenePipeline;
use processor::server::{self, ServerState};
use processor::{DeploymentInfo, InvocationEvent, Processor, ProcessorConfig};
use storage::ObjectStorage;

#[derive(Parser, Debug)]
#[command(name = "scene-processor")]
#[command(about = "Sentinel-2 vegetation index processor")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "PROCESSOR_CONFIG", default_value = "config/processor.yaml")]
    config: PathBuf,

    /// Invocation event as JSON, e.g. '{"start_date": "2024-07-01"}'
    #[arg(long)]
    event: Option<String>,

    /// Serve the HTTP API instead of running once
    #[arg(long)]
    serve: bool,

    /// HTTP port
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting scene processor");

    let config = ProcessorConfig::load(&args.config)?;
    info!(
        catalog = %config.pipeline.catalog_url,
        bucket = %config.storage.bucket,
        timeout_secs = config.invocation_timeout_secs,
        "Loaded configuration"
    );

    let storage = ObjectStorage::new(&config.storage).context("Failed to set up object storage")?;
    let mut pipeline = ScenePipeline::from_config(&config.pipeline, storage)
        .context("Failed to build pipeline")?;
    if let Some(dir) = &config.scratch_dir {
        pipeline = pipeline.with_scratch_root(dir);
    }

    let deployment = DeploymentInfo {
        s3_bucket: config.storage.bucket.clone(),
        aws_region: config.storage.region.clone(),
    };
    let processor = Processor::new(pipeline, deployment, config.invocation_timeout());

    if args.serve {
        let state = Arc::new(ServerState::new(processor));
        return server::start_server(state, args.port).await;
    }

    let event: InvocationEvent = match &args.event {
        Some(json) => serde_json::from_str(json).context("Invalid --event JSON")?,
        None => InvocationEvent::default(),
    };

    let response = processor.handle(event).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_success() {
        anyhow::bail!("invocation failed with status {}", response.status_code);
    }
    Ok(())
}
