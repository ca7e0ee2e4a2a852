//! Service lifecycle: Starting -> Ready -> Draining -> Stopped.
//!
//! ```text
//! Starting ──acquire + bind──▶ Ready ──signal──▶ Draining ──close broker, db──▶ Stopped
//!    │
//!    └── bootstrap error ──▶ (error returned, listener never bound)
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::error::LifecycleError;

use super::acquire::{BrokerDriver, DatabaseDriver, Dependencies, DependencyAcquirer};

/// Externally observable service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

/// Sequences startup and shutdown around a [`DependencyAcquirer`].
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            state: Arc::new(state),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Run the service until `shutdown` resolves.
    ///
    /// `make_router` is called once, after both dependencies are ready and
    /// before the listener is bound. Tasks spawned on the tracker it receives
    /// are awaited during draining, before any handle is closed.
    pub async fn run<DD, BD, F, S>(
        &self,
        acquirer: DependencyAcquirer<DD, BD>,
        addr: &str,
        make_router: F,
        shutdown: S,
    ) -> Result<(), LifecycleError>
    where
        DD: DatabaseDriver,
        BD: BrokerDriver,
        F: FnOnce(&Dependencies<DD::Handle, BD::Channel>, &TaskTracker) -> Router,
        S: Future<Output = ()> + Send + 'static,
    {
        self.transition(LifecycleState::Starting);

        let dependencies = acquirer.acquire().await?;

        let background = TaskTracker::new();
        let router = make_router(&dependencies, &background);

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr, error = %e, "Failed to bind listener");
                drop(router);
                acquirer.release(dependencies).await;
                self.transition(LifecycleState::Stopped);
                return Err(LifecycleError::Bind {
                    addr: addr.to_string(),
                    message: e.to_string(),
                });
            }
        };

        match listener.local_addr() {
            Ok(local) => info!(addr = %local, "Listener bound"),
            Err(_) => info!(addr, "Listener bound"),
        }
        self.transition(LifecycleState::Ready);

        let state = Arc::clone(&self.state);
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Shutdown signal received, draining connections");
                state.send_replace(LifecycleState::Draining);
            })
            .await;

        self.transition(LifecycleState::Draining);

        background.close();
        background.wait().await;

        acquirer.release(dependencies).await;
        self.transition(LifecycleState::Stopped);
        info!("Service stopped");

        served.map_err(|e| LifecycleError::Serve(e.to_string()))
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = ?previous, to = ?next, "Lifecycle transition");
        }
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
