//! Miniview - Command line driver for the headless viewer
//!
//! Loads an environment and any number of models back to back, the way a
//! user clicking through files would, then prints the resulting scene.

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::future::join_all;
use miniview_core::{LoadOutcome, ResourceKind, ViewerError};
use miniview_element::create_viewer_for_surface;
use miniview_headless::config;
use miniview_headless::HeadlessProvider;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "miniview")]
#[command(about = "Headless glTF viewer with latest-request-wins loading")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "miniview.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Environment url (.env or .hdr); the config default otherwise
    #[arg(short, long)]
    env: Option<String>,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,

    /// Model urls, requested back to back; only the last one stays loaded
    models: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
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
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Miniview v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    let config = config::load_config(&args.config)?;
    let provider = HeadlessProvider::new(config.fetch.build_fetcher()?);
    let viewer = create_viewer_for_surface(&provider, config.surface, config.surface_options())?;

    let env = args.env.or(config.environment.url);
    info!(env = ?env, models = args.models.len(), "Starting loads");

    let env_request = viewer.load_environment(env.as_deref());
    let model_requests: Vec<_> = args
        .models
        .iter()
        .map(|url| viewer.load_model(url.as_str()))
        .collect();

    let env_result = env_request.await;
    report(ResourceKind::Environment, env.as_deref().unwrap_or("<default light>"), &env_result);

    let mut last_model = None;
    for (url, result) in args.models.iter().zip(join_all(model_requests).await) {
        report(ResourceKind::Model, url, &result);
        last_model = Some(result);
    }

    let applied = viewer.inspect_model(|m| m.map(|m| (m.entry().url.clone(), m.entry().bounds)));
    match applied {
        Some((url, Some(bounds))) => println!("model        {} (size {})", url, bounds.size()),
        Some((url, None)) => println!("model        {} (no geometry)", url),
        None => println!("model        <none>"),
    }

    let scene = viewer.engine().snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&scene).context("Failed to serialize scene")?
    );

    viewer.dispose().await;

    env_result?;
    if let Some(result) = last_model {
        result?;
    }
    Ok(())
}

fn report(kind: ResourceKind, url: &str, result: &Result<LoadOutcome, ViewerError>) {
    match result {
        Ok(LoadOutcome::Applied) => println!("{:<12} applied     {}", kind.as_str(), url),
        Ok(LoadOutcome::Superseded) => println!("{:<12} superseded  {}", kind.as_str(), url),
        Err(e) => println!("{:<12} failed      {} ({})", kind.as_str(), url, e),
    }
}
