//! MBTiles Gateway - serves tiles, grids and archives from MBTiles files.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mbtiles_gateway::{
    config::Config,
    gateway::{Placeholder, TileGateway},
    render::MbtilesRenderer,
    server::{create_router, RouterConfig},
    tileset::{TilesetStore, TILESET_EXTENSION},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let header_defaults = match config.header_defaults() {
        Ok(headers) => headers,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // The placeholder is loaded exactly once, before serving starts
    let placeholder = match &config.error_tile {
        Some(path) => Placeholder::load(path).await,
        None => Placeholder::generated(),
    };
    let placeholder = match placeholder {
        Ok(placeholder) => placeholder,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Tiles: {}", config.tiles.display());
    match count_tilesets(&config).await {
        Ok(0) => warn!("  No .{} files found yet", TILESET_EXTENSION),
        Ok(count) => info!("  Found {} tileset(s)", count),
        Err(e) => warn!("  Could not list tiles directory: {}", e),
    }
    match &config.error_tile {
        Some(path) => info!("  Error tile: {}", path.display()),
        None => info!("  Error tile: generated"),
    }
    info!(
        "  Download route: {}",
        if config.enable_download { "enabled" } else { "disabled" }
    );
    info!("  Default headers: {}", header_defaults.len());
    info!("  Open archive cache: {}", config.cache_connections);
    info!("  Request timeout: {}s", config.request_timeout);

    let gateway = TileGateway::new(
        TilesetStore::new(&config.tiles),
        MbtilesRenderer::with_capacity(config.cache_connections),
        placeholder,
    )
    .with_header_defaults(header_defaults);

    let router = create_router(gateway, build_router_config(&config));

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/1.0.0/<tileset>/0/0/0.png", addr);
    info!("    curl http://{}/1.0.0/<tileset>/formatter.json", addr);
    if config.enable_download {
        info!("    curl -O http://{}/download/<tileset>.mbtiles", addr);
    }
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "mbtiles_gateway=debug,tower_http=debug"
    } else {
        "mbtiles_gateway=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_download(config.enable_download)
        .with_request_timeout(config.request_timeout())
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

/// Count the `.mbtiles` files in the tiles directory.
async fn count_tilesets(config: &Config) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(&config.tiles).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let is_tileset = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == TILESET_EXTENSION);
        if is_tileset {
            count += 1;
        }
    }
    Ok(count)
}

/// Resolve when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
