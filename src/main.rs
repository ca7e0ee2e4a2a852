//! cartobase - template CRUD and vector tile service.
//!
//! This binary acquires PostgreSQL and Redis, then serves the HTTP API until
//! a termination signal arrives.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartobase::{
    bootstrap::{shutdown_signal, AcquirePolicy, DependencyAcquirer, Lifecycle, RetryPolicy},
    config::{redact_url, CheckConfig, Cli, Command, DependencyArgs, ServeConfig},
    events::{EventDispatcher, RedisBroker, RedisQueuePublisher},
    server::{create_router, AppState, RouterConfig},
    store::{PgTemplateStore, PostgresDriver},
    tile::{MbtilesReader, TileService},
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let deps = &config.dependencies;
    log_dependencies(deps);

    let reader = MbtilesReader::new(&deps.tiles_path, deps.tiles_format);
    if !reader.path().exists() {
        warn!(
            path = %reader.path().display(),
            "Tile archive not found; tile requests will fail until it exists"
        );
    }

    let acquirer = DependencyAcquirer::new(
        database_driver(deps),
        RedisBroker::new(&deps.broker_url),
        deps.acquire_policy(),
    )
    .with_channel(&deps.template_queue);
    let readiness = acquirer.readiness();
    let router_config = build_router_config(&config);
    let lifecycle = Lifecycle::new();

    info!(
        addr = %config.bind_address(),
        url = %config.public_address(),
        "Starting service"
    );

    let result = lifecycle
        .run(
            acquirer,
            &config.bind_address(),
            |dependencies, background| {
                let tile_service =
                    TileService::new(reader).with_lookup_timeout(config.tile_lookup_timeout());
                let templates = Arc::new(PgTemplateStore::new(dependencies.database.clone()));
                let publisher = Arc::new(RedisQueuePublisher::new(dependencies.broker.clone()));
                let events = EventDispatcher::new(publisher, background.clone());

                let state = AppState::new(tile_service, templates, events)
                    .with_cache_max_age(config.cache_max_age)
                    .with_template_channel(deps.template_queue.clone())
                    .with_readiness(readiness);

                create_router(state, router_config)
            },
            shutdown_signal(),
        )
        .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Service terminated");
            ExitCode::FAILURE
        }
    }
}

fn log_dependencies(deps: &DependencyArgs) {
    info!("Configuration:");
    info!("  Database: {}", redact_url(&deps.database_url));
    info!("  Broker: {}", redact_url(&deps.broker_url));
    info!(
        "  Tiles: {} ({:?})",
        deps.tiles_path.display(),
        deps.tiles_format
    );
    info!("  Event channel: {}", deps.template_queue);
    info!(
        "  Database retry: {} attempt(s), {}ms apart",
        deps.db_retry_attempts, deps.db_retry_delay_ms
    );
    info!("  Broker timeout: {}ms", deps.broker_timeout_ms);
}

fn database_driver(deps: &DependencyArgs) -> PostgresDriver {
    PostgresDriver::new(&deps.database_url).with_max_connections(deps.db_max_connections)
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "cartobase=debug,tower_http=debug"
    } else {
        "cartobase=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new();

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("cartobase Configuration Check");
    println!("═════════════════════════════");
    println!();

    let deps = &config.dependencies;
    if let Err(e) = deps.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }

    println!("✓ Database: {}", redact_url(&deps.database_url));
    println!("✓ Broker: {}", redact_url(&deps.broker_url));
    println!("✓ Tiles: {}", deps.tiles_path.display());
    println!();

    // One probe each, no retry budget
    let policy = AcquirePolicy {
        database_retry: RetryPolicy::new(1, Duration::ZERO),
        broker_timeout: Duration::from_millis(deps.broker_timeout_ms),
    };
    let acquirer = DependencyAcquirer::new(
        database_driver(deps),
        RedisBroker::new(&deps.broker_url),
        policy,
    )
    .with_channel(&deps.template_queue);

    print!("Testing database and broker... ");
    match acquirer.acquire().await {
        Ok(dependencies) => {
            println!("✓ success");
            acquirer.release(dependencies).await;
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    print!("Reading tile archive... ");
    let reader = MbtilesReader::new(&deps.tiles_path, deps.tiles_format);
    match reader.metadata() {
        Ok(metadata) => {
            println!("✓ success");
            for (name, value) in metadata
                .iter()
                .filter(|(name, _)| matches!(name.as_str(), "name" | "format" | "minzoom" | "maxzoom"))
            {
                println!("  {}: {}", name, value);
            }
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    println!();
    println!("═════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
