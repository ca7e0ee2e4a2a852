//! Configuration management for cartobase.
//!
//! Settings come from command-line arguments with environment fallbacks.
//! A `.env` file in the working directory is loaded before parsing.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - PostgreSQL connection URL (required)
//! - `BROKER_URL` - Redis connection URL (required)
//! - `HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 3000)
//! - `APP_URL` - Public base URL, used in startup logs (default: http://localhost)
//! - `TILES_PATH` - MBTiles archive to serve (required)
//! - `TILES_FORMAT` - Payload format stored in the archive (default: pbf)
//! - `TEMPLATE_QUEUE` - Channel for template creation events (default: template_created)
//! - `DB_RETRY_ATTEMPTS` - Database probe attempts (default: 5)
//! - `DB_RETRY_DELAY_MS` - Delay between database probes (default: 5000)
//! - `DB_MAX_CONNECTIONS` - Database pool size (default: 10)
//! - `BROKER_TIMEOUT_MS` - Broker connection timeout (default: 5000)
//! - `TILE_LOOKUP_TIMEOUT_MS` - Archive lookup timeout (default: 5000)
//! - `CACHE_MAX_AGE` - HTTP cache max-age seconds for tiles (default: 3600)
//! - `CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::bootstrap::{AcquirePolicy, RetryPolicy};
use crate::tile::TileFormat;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default public base URL.
pub const DEFAULT_APP_URL: &str = "http://localhost";

/// Default template event channel.
pub const DEFAULT_TEMPLATE_QUEUE: &str = "template_created";

/// Default database probe attempts.
pub const DEFAULT_DB_RETRY_ATTEMPTS: u32 = 5;

/// Default delay between database probes in milliseconds.
pub const DEFAULT_DB_RETRY_DELAY_MS: u64 = 5000;

/// Default database pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Default broker connection timeout in milliseconds.
pub const DEFAULT_BROKER_TIMEOUT_MS: u64 = 5000;

/// Default archive lookup timeout in milliseconds.
pub const DEFAULT_TILE_LOOKUP_TIMEOUT_MS: u64 = 5000;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// cartobase - template CRUD and vector tile service.
///
/// Waits for PostgreSQL and Redis before accepting traffic, serves vector
/// tiles from a local MBTiles archive and publishes template creation events.
#[derive(Parser, Debug, Clone)]
#[command(name = "cartobase")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Acquire dependencies and run the HTTP service.
    Serve(ServeConfig),

    /// Probe the database, broker and tile archive once, then exit.
    Check(CheckConfig),
}

/// Connection settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct DependencyArgs {
    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Redis connection URL for the event broker.
    #[arg(long, env = "BROKER_URL")]
    pub broker_url: String,

    /// MBTiles archive to serve tiles from.
    #[arg(long, env = "TILES_PATH")]
    pub tiles_path: PathBuf,

    /// Payload format of the archive's tiles.
    #[arg(long, value_enum, default_value_t = TileFormat::Pbf, env = "TILES_FORMAT")]
    pub tiles_format: TileFormat,

    /// Channel that receives template creation events.
    #[arg(long, default_value = DEFAULT_TEMPLATE_QUEUE, env = "TEMPLATE_QUEUE")]
    pub template_queue: String,

    /// Database probe attempts before giving up.
    #[arg(long, default_value_t = DEFAULT_DB_RETRY_ATTEMPTS, env = "DB_RETRY_ATTEMPTS")]
    pub db_retry_attempts: u32,

    /// Delay between database probes in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DB_RETRY_DELAY_MS, env = "DB_RETRY_DELAY_MS")]
    pub db_retry_delay_ms: u64,

    /// Database pool size.
    #[arg(long, default_value_t = DEFAULT_DB_MAX_CONNECTIONS, env = "DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Broker connection timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_BROKER_TIMEOUT_MS, env = "BROKER_TIMEOUT_MS")]
    pub broker_timeout_ms: u64,
}

impl DependencyArgs {
    /// Validate the connection settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.trim().is_empty() {
            return Err("Database URL is required. Set --database-url or DATABASE_URL".to_string());
        }
        if self.broker_url.trim().is_empty() {
            return Err("Broker URL is required. Set --broker-url or BROKER_URL".to_string());
        }
        if self.tiles_path.as_os_str().is_empty() {
            return Err("Tiles path is required. Set --tiles-path or TILES_PATH".to_string());
        }
        if self.template_queue.trim().is_empty() {
            return Err("template_queue must not be empty".to_string());
        }
        if self.db_retry_attempts == 0 {
            return Err("db_retry_attempts must be greater than 0".to_string());
        }
        if self.db_retry_delay_ms == 0 {
            return Err("db_retry_delay_ms must be greater than 0".to_string());
        }
        if self.db_max_connections == 0 {
            return Err("db_max_connections must be greater than 0".to_string());
        }
        if self.broker_timeout_ms == 0 {
            return Err("broker_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Acquisition parameters derived from these settings.
    pub fn acquire_policy(&self) -> AcquirePolicy {
        AcquirePolicy {
            database_retry: RetryPolicy::new(
                self.db_retry_attempts,
                Duration::from_millis(self.db_retry_delay_ms),
            ),
            broker_timeout: Duration::from_millis(self.broker_timeout_ms),
        }
    }
}

/// Settings for `cartobase serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    #[command(flatten)]
    pub dependencies: DependencyArgs,

    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Public base URL of the service.
    #[arg(long, default_value = DEFAULT_APP_URL, env = "APP_URL")]
    pub app_url: String,

    /// Archive lookup timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TILE_LOOKUP_TIMEOUT_MS, env = "TILE_LOOKUP_TIMEOUT_MS")]
    pub tile_lookup_timeout_ms: u64,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.dependencies.validate()?;

        if self.tile_lookup_timeout_ms == 0 {
            return Err("tile_lookup_timeout_ms must be greater than 0".to_string());
        }
        if Url::parse(&self.app_url).is_err() {
            return Err(format!("app_url is not a valid URL: {}", self.app_url));
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public URL the service is reachable at, as "app_url:port".
    pub fn public_address(&self) -> String {
        format!("{}:{}", self.app_url.trim_end_matches('/'), self.port)
    }

    pub fn tile_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.tile_lookup_timeout_ms)
    }
}

/// Settings for `cartobase check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub dependencies: DependencyArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Render a connection URL for logs with its password masked.
///
/// Unparseable input is never echoed back.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                // Only fails for cannot-be-a-base URLs, which carry no password
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
