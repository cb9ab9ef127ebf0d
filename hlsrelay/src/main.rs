mod server;
mod storage;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use hlsrelay_core::{config::load_config, logging};
use hlsrelay_pipeline::{GatewayMirror, Pipeline, PipelineSettings};

use server::AppState;

#[derive(Debug, Parser)]
#[command(name = "hlsrelay", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "HLSRELAY_CONFIG_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = load_config(cli.config.as_deref())?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("hlsrelay starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Output trees
    let settings = PipelineSettings::from_config(&config);
    for dir in [&settings.private_root, &settings.public_root] {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            error!("Failed to create {}: {}", dir.display(), e);
            anyhow::anyhow!("Failed to create {}: {e}", dir.display())
        })?;
    }
    info!(
        "Watching {} -> {} ({} tiers)",
        settings.private_root.display(),
        settings.public_root.display(),
        settings.quality_count
    );

    // 4. Storage and gateways
    let wiring = storage::build_storage(&config)?;
    let gateways = GatewayMirror::from_config(&config.gateway)?;
    if !gateways.alternates().is_empty() {
        info!("Mirroring playlists for {} gateway(s)", gateways.alternates().len());
    }

    // 5. Pipeline and watch dispatcher
    let public_root = settings.public_root.clone();
    let master_file_name = settings.master_file_name.clone();
    let pipeline = Pipeline::new(settings, gateways, wiring.publisher);

    let cancel = CancellationToken::new();
    let dispatcher = pipeline
        .dispatcher()
        .start(cancel.child_token())
        .map_err(|e| {
            error!("Failed to start watcher: {}", e);
            anyhow::anyhow!("Watcher startup failed: {e}")
        })?;
    info!("Watcher started");

    // 6. HTTP server
    let router = server::router(AppState {
        public_root,
        master_file_name,
        content: wiring.content,
        lifecycle: pipeline.lifecycle(),
    });
    let mut http = server::spawn_http(&config.http_address(), router, cancel.child_token()).await?;

    info!("hlsrelay started successfully");

    tokio::select! {
        () = server::shutdown_signal() => {
            info!("Shutdown signal received, stopping...");
        }
        result = &mut http => {
            if let Err(e) = result {
                error!("HTTP server task failed: {}", e);
            }
            error!("HTTP server exited unexpectedly, stopping...");
        }
    }

    cancel.cancel();
    dispatcher.shutdown().await;
    if !http.is_finished() {
        if let Err(e) = http.await {
            error!("HTTP server task failed: {}", e);
        }
    }

    info!(
        "hlsrelay stopped ({} session(s) still open)",
        pipeline.registry().session_count()
    );
    Ok(())
}
