//! Dependency state tracking and the combined readiness signal.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// The external dependencies a service needs before it can take traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    Database,
    Broker,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Database => f.write_str("database"),
            Dependency::Broker => f.write_str("broker"),
        }
    }
}

/// Lifecycle of a single dependency handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyState {
    Unacquired,
    Acquiring,
    Ready,
    Failed,
    Closed,
}

impl DependencyState {
    /// Whether the handle can no longer become ready.
    pub fn is_terminal(self) -> bool {
        matches!(self, DependencyState::Failed | DependencyState::Closed)
    }
}

/// Read side of both dependency states.
///
/// Cloned into anything that needs to know whether the service is ready
/// (health endpoint, tests). Ready means both handles are ready.
#[derive(Clone)]
pub struct Readiness {
    database: watch::Receiver<DependencyState>,
    broker: watch::Receiver<DependencyState>,
}

impl Readiness {
    pub(crate) fn new(
        database: watch::Receiver<DependencyState>,
        broker: watch::Receiver<DependencyState>,
    ) -> Self {
        Self { database, broker }
    }

    /// Current state of one dependency.
    pub fn state(&self, dependency: Dependency) -> DependencyState {
        match dependency {
            Dependency::Database => *self.database.borrow(),
            Dependency::Broker => *self.broker.borrow(),
        }
    }

    /// True when both handles are ready.
    pub fn is_ready(&self) -> bool {
        self.state(Dependency::Database) == DependencyState::Ready
            && self.state(Dependency::Broker) == DependencyState::Ready
    }

    /// Wait until both handles are ready.
    ///
    /// Returns `false` as soon as either handle reaches a terminal state or
    /// the acquirer goes away.
    pub async fn wait_ready(&mut self) -> bool {
        loop {
            if self.is_ready() {
                return true;
            }
            if self.state(Dependency::Database).is_terminal()
                || self.state(Dependency::Broker).is_terminal()
            {
                return false;
            }

            let changed = tokio::select! {
                r = self.database.changed() => r,
                r = self.broker.changed() => r,
            };
            if changed.is_err() {
                return self.is_ready();
            }
        }
    }
}
