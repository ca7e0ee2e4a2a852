//! Startup and shutdown of the service's external dependencies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Lifecycle                             │
//! │   Starting ──▶ Ready ──▶ Draining ──▶ Stopped                │
//! │       │                                  ▲                   │
//! │       ▼                                  │                   │
//! │  ┌─────────────────────────────┐   release (broker, then db) │
//! │  │     DependencyAcquirer      │─────────┘                   │
//! │  │  database: retry, fixed     │                             │
//! │  │  broker:   single, timeout  │                             │
//! │  └─────────────────────────────┘                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`DependencyAcquirer`]: acquires the database then the broker and exposes
//!   a combined [`Readiness`] signal
//! - [`Lifecycle`]: binds the listener only after acquisition succeeds and
//!   tears everything down in reverse order on a termination signal
//! - [`with_retry`]: fixed-delay retry used for the database probe

mod acquire;
mod lifecycle;
mod retry;
mod state;

pub use acquire::{
    AcquirePolicy, BrokerDriver, DatabaseDriver, Dependencies, DependencyAcquirer,
    DEFAULT_BROKER_TIMEOUT,
};
pub use lifecycle::{shutdown_signal, Lifecycle, LifecycleState};
pub use retry::{with_retry, RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
pub use state::{Dependency, DependencyState, Readiness};
