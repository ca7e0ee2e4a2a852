//! # cartobase
//!
//! A template CRUD service that also serves vector map tiles from a local
//! MBTiles archive.
//!
//! The service refuses traffic until its PostgreSQL database and Redis broker
//! are both reachable, publishes a change event whenever a template is
//! created, and shuts down in reverse order of startup.
//!
//! ## Architecture
//!
//! - [`bootstrap`] - Dependency acquisition, readiness and lifecycle
//! - [`tile`] - Slippy-map addressing and MBTiles lookups
//! - [`events`] - Change events and broker publication
//! - [`store`] - Template persistence
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use cartobase::bootstrap::{AcquirePolicy, DependencyAcquirer};
//! use cartobase::events::RedisBroker;
//! use cartobase::store::PostgresDriver;
//!
//! #[tokio::main]
//! async fn main() {
//!     let acquirer = DependencyAcquirer::new(
//!         PostgresDriver::new("postgres://localhost/templates"),
//!         RedisBroker::new("redis://localhost:6379"),
//!         AcquirePolicy::default(),
//!     )
//!     .with_channel("template_created");
//!
//!     let dependencies = acquirer.acquire().await.expect("dependencies");
//!     // Serve traffic...
//!     acquirer.release(dependencies).await;
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod server;
pub mod store;
pub mod tile;

// Re-export commonly used types
pub use bootstrap::{
    AcquirePolicy, BrokerDriver, DatabaseDriver, Dependencies, DependencyAcquirer, Lifecycle,
    LifecycleState, Readiness, RetryPolicy,
};
pub use config::{CheckConfig, Cli, Command, DependencyArgs, ServeConfig};
pub use error::{
    BootstrapError, DependencyError, LifecycleError, PublishError, StoreError, TileError,
};
pub use events::{ChangeEvent, EventDispatcher, EventPublisher, RedisBroker, RedisQueuePublisher};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use store::{NewTemplate, PgTemplateStore, PostgresDriver, Template, TemplateChanges, TemplateStore};
pub use tile::{to_archive_row, MbtilesReader, TileBlob, TileFormat, TileRequest, TileService, TileStore};
