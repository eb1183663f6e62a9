//! Query router entry point.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use query_router::api::{create_router, AppState};
use query_router::config::Config;
use query_router::mapping::build_store;
use query_router::metrics;
use query_router::routing::Resolver;
use query_router::utils::shutdown_signal;

/// Key-based query router.
#[derive(Parser, Debug)]
#[command(name = "query-router")]
#[command(about = "Resolves a target identifier to its backend and relays the query")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP listen port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// HTTP listen port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity and store connectivity.
    CheckConfig,

    /// Resolve one target identifier and print its redirect URL.
    Resolve {
        /// Target identifier to look up.
        target: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("query_router=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with((!json_logs).then(fmt::layer))
        .with(json_logs.then(|| fmt::layer().json()))
        .with(filter)
        .init();

    match args.command {
        Some(Command::Serve { port }) => cmd_serve(port.or(args.port)).await,
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::Resolve { target }) => cmd_resolve(&target).await,
        None => cmd_serve(args.port).await,
    }
}

/// Load and validate configuration.
fn load_config() -> anyhow::Result<Config> {
    Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e.into()
    })
}

/// Check configuration validity and store connectivity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("QUERY ROUTER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Reaching mapping store ({})... ", config.store_backend);
    let store = build_store(&config)?;
    match store.ping().await {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Mapping store unreachable"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Collection: {}", config.maps_collection);
    println!("  Identifier Field: {}", config.target_field);
    println!("  Forward Path: {}", config.forward_path);
    println!("  Resolution Failure Status: {}", config.resolution_failure_status);
    match &config.get_query_default_target {
        Some(target) => println!("  GET Default Target: {} (fallback only)", target),
        None => println!("  GET Default Target: none"),
    }
    println!("  Store Timeout: {}ms", config.store_timeout_ms);
    println!("  Forward Timeout: {}ms", config.forward_timeout_ms);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Resolve one identifier against the configured store.
async fn cmd_resolve(target: &str) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = build_store(&config)?;
    let resolver = Resolver::from_config(store, &config);

    match resolver.resolve(target).await {
        Ok(url) => {
            println!("{} -> {}{}", target, url.trim_end_matches('/'), config.forward_path);
            Ok(())
        }
        Err(e) => {
            println!("{}: {}", target, e);
            Err(anyhow::anyhow!("Resolution failed"))
        }
    }
}

/// Serve the HTTP API until a shutdown signal.
async fn cmd_serve(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.port = port;
    }

    info!("Configuration loaded successfully");
    info!("Store backend: {}", config.store_backend);
    info!("Collection: {}", config.maps_collection);
    info!("Identifier field: {}", config.target_field);
    if let Some(target) = &config.get_query_default_target {
        warn!("GET /query falls back to target {} when the request carries none", target);
    }

    let store = build_store(&config)?;
    let mut app_state = AppState::from_config(store.clone(), &config)?;

    if config.metrics_enabled {
        let handle = metrics::install_prometheus()?;
        metrics::init_metrics();
        app_state = app_state.with_metrics(handle);
    }

    match store.ping().await {
        Ok(()) => {
            info!("Mapping store reachable ({})", store.backend());
            app_state.set_ready(true);
        }
        Err(e) => warn!("Mapping store not reachable yet: {}", e),
    }

    // Keep probing until the store answers so /ready flips.
    if !app_state.is_ready() {
        let probe_state = app_state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
            loop {
                interval.tick().await;
                if probe_state.resolver.store().ping().await.is_ok() {
                    info!("Mapping store reachable");
                    probe_state.set_ready(true);
                    break;
                }
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
