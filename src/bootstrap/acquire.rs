//! Dependency acquisition.
//!
//! The acquirer brings up the database first (retrying with a fixed delay)
//! and only then the broker (one attempt under a timeout). The two drivers
//! are traits so the sequencing can be exercised without real servers.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{BootstrapError, DependencyError};

use super::retry::{with_retry, RetryPolicy};
use super::state::{Dependency, DependencyState, Readiness};

/// Default broker connection timeout.
pub const DEFAULT_BROKER_TIMEOUT: Duration = Duration::from_millis(5000);

// =============================================================================
// Driver Traits
// =============================================================================

/// Opens and closes database handles.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Handle shared with request handlers once ready.
    type Handle: Send + Sync + 'static;

    /// Open a handle and prove it can serve a query.
    async fn connect(&self) -> Result<Self::Handle, DependencyError>;

    /// Create the required schema if absent. Must never alter existing tables.
    async fn ensure_schema(&self, handle: &Self::Handle) -> Result<(), DependencyError>;

    /// Release the handle.
    async fn close(&self, handle: Self::Handle);
}

/// Opens broker channels and declares named queues on them.
#[async_trait]
pub trait BrokerDriver: Send + Sync {
    /// Channel shared with the event publisher once ready.
    type Channel: Send + Sync + 'static;

    /// Open a channel to the broker.
    async fn connect(&self) -> Result<Self::Channel, DependencyError>;

    /// Declare a named channel. Declaring an existing channel succeeds.
    async fn declare_channel(
        &self,
        channel: &Self::Channel,
        name: &str,
    ) -> Result<(), DependencyError>;

    /// Release the channel.
    async fn close(&self, channel: Self::Channel);
}

// =============================================================================
// Policy and Result
// =============================================================================

/// Acquisition parameters for both dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquirePolicy {
    /// Retry budget for the database probe
    pub database_retry: RetryPolicy,
    /// Upper bound on the single broker connection attempt
    pub broker_timeout: Duration,
}

impl Default for AcquirePolicy {
    fn default() -> Self {
        Self {
            database_retry: RetryPolicy::default(),
            broker_timeout: DEFAULT_BROKER_TIMEOUT,
        }
    }
}

/// Both live handles, handed to the lifecycle coordinator on success.
#[derive(Debug)]
pub struct Dependencies<D, B> {
    pub database: D,
    pub broker: B,
}

// =============================================================================
// Acquirer
// =============================================================================

/// Acquires and releases the database handle and broker channel.
pub struct DependencyAcquirer<DD: DatabaseDriver, BD: BrokerDriver> {
    database: DD,
    broker: BD,
    policy: AcquirePolicy,
    channels: Vec<String>,
    database_state: watch::Sender<DependencyState>,
    broker_state: watch::Sender<DependencyState>,
}

impl<DD: DatabaseDriver, BD: BrokerDriver> DependencyAcquirer<DD, BD> {
    pub fn new(database: DD, broker: BD, policy: AcquirePolicy) -> Self {
        let (database_state, _) = watch::channel(DependencyState::Unacquired);
        let (broker_state, _) = watch::channel(DependencyState::Unacquired);
        Self {
            database,
            broker,
            policy,
            channels: Vec::new(),
            database_state,
            broker_state,
        }
    }

    /// Add a broker channel to declare once the broker is connected.
    pub fn with_channel(mut self, name: impl Into<String>) -> Self {
        self.channels.push(name.into());
        self
    }

    /// Channels declared on acquisition.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn policy(&self) -> &AcquirePolicy {
        &self.policy
    }

    /// Combined readiness signal for both dependencies.
    pub fn readiness(&self) -> Readiness {
        Readiness::new(self.database_state.subscribe(), self.broker_state.subscribe())
    }

    /// Acquire the database, then the broker.
    ///
    /// The broker is never attempted when the database budget is exhausted.
    /// If the broker fails, the already-open database handle is closed before
    /// returning the error.
    pub async fn acquire(&self) -> Result<Dependencies<DD::Handle, BD::Channel>, BootstrapError> {
        let database = self.acquire_database().await?;

        match self.acquire_broker().await {
            Ok(broker) => {
                info!("All dependencies ready");
                Ok(Dependencies { database, broker })
            }
            Err(e) => {
                self.database.close(database).await;
                self.set_state(Dependency::Database, DependencyState::Closed);
                Err(e)
            }
        }
    }

    /// Probe the database until it answers or the retry budget runs out.
    pub async fn acquire_database(&self) -> Result<DD::Handle, BootstrapError> {
        self.set_state(Dependency::Database, DependencyState::Acquiring);
        let retry = self.policy.database_retry;

        let result = with_retry(&retry, "database connection", |attempt| async move {
            debug!(attempt, "Probing database");
            let handle = self.database.connect().await?;
            if let Err(e) = self.database.ensure_schema(&handle).await {
                self.database.close(handle).await;
                return Err(e);
            }
            Ok::<_, DependencyError>(handle)
        })
        .await;

        match result {
            Ok(handle) => {
                info!("Connected to the database");
                self.set_state(Dependency::Database, DependencyState::Ready);
                Ok(handle)
            }
            Err(source) => {
                error!(error = %source, "Could not connect to the database");
                self.set_state(Dependency::Database, DependencyState::Failed);
                Err(BootstrapError::DatabaseUnavailable {
                    attempts: retry.max_attempts.max(1),
                    source,
                })
            }
        }
    }

    /// Connect to the broker once and declare every configured channel.
    ///
    /// The broker timeout bounds connect and declare together.
    pub async fn acquire_broker(&self) -> Result<BD::Channel, BootstrapError> {
        self.set_state(Dependency::Broker, DependencyState::Acquiring);
        let timeout = self.policy.broker_timeout;

        let attempt = async {
            let channel = self.broker.connect().await?;
            for name in &self.channels {
                if let Err(e) = self.broker.declare_channel(&channel, name).await {
                    self.broker.close(channel).await;
                    return Err(e);
                }
                debug!(channel = %name, "Declared broker channel");
            }
            Ok::<_, DependencyError>(channel)
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(channel)) => {
                info!("Connected to the broker");
                self.set_state(Dependency::Broker, DependencyState::Ready);
                Ok(channel)
            }
            Ok(Err(source)) => Err(self.broker_failed(source)),
            Err(_) => Err(self.broker_failed(DependencyError::Timeout(timeout))),
        }
    }

    /// Close the broker channel, then the database handle.
    pub async fn release(&self, dependencies: Dependencies<DD::Handle, BD::Channel>) {
        let Dependencies { database, broker } = dependencies;

        self.broker.close(broker).await;
        self.set_state(Dependency::Broker, DependencyState::Closed);
        info!("Broker channel closed");

        self.database.close(database).await;
        self.set_state(Dependency::Database, DependencyState::Closed);
        info!("Database handle closed");
    }

    fn broker_failed(&self, source: DependencyError) -> BootstrapError {
        error!(error = %source, "Failed to connect to the broker");
        self.set_state(Dependency::Broker, DependencyState::Failed);
        BootstrapError::BrokerUnavailable { source }
    }

    fn set_state(&self, dependency: Dependency, state: DependencyState) {
        let sender = match dependency {
            Dependency::Database => &self.database_state,
            Dependency::Broker => &self.broker_state,
        };
        sender.send_replace(state);
    }
}

// =============================================================================
// Tests
// =============================================================================
