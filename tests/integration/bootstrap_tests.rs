//! Bootstrap and lifecycle integration tests.
//!
//! Drives the public acquisition API with scripted drivers:
//! - Readiness only after both dependencies are up
//! - Database budget exhaustion never touches the broker
//! - A failed bind releases both handles, broker first

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;

use cartobase::bootstrap::{
    AcquirePolicy, BrokerDriver, DatabaseDriver, Dependency, DependencyAcquirer, DependencyState,
    Lifecycle, LifecycleState, RetryPolicy,
};
use cartobase::error::{BootstrapError, DependencyError, LifecycleError};

type Log = Arc<Mutex<Vec<&'static str>>>;

struct ScriptedDatabase {
    failures: u32,
    attempts: Arc<AtomicU32>,
    log: Log,
}

#[async_trait]
impl DatabaseDriver for ScriptedDatabase {
    type Handle = ();

    async fn connect(&self) -> Result<(), DependencyError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(DependencyError::Connect("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    async fn ensure_schema(&self, _handle: &()) -> Result<(), DependencyError> {
        Ok(())
    }

    async fn close(&self, _handle: ()) {
        self.log.lock().unwrap().push("database");
    }
}

struct ScriptedBroker {
    connects: Arc<AtomicU32>,
    log: Log,
}

#[async_trait]
impl BrokerDriver for ScriptedBroker {
    type Channel = ();

    async fn connect(&self) -> Result<(), DependencyError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn declare_channel(&self, _channel: &(), _name: &str) -> Result<(), DependencyError> {
        Ok(())
    }

    async fn close(&self, _channel: ()) {
        self.log.lock().unwrap().push("broker");
    }
}

struct Harness {
    db_attempts: Arc<AtomicU32>,
    broker_connects: Arc<AtomicU32>,
    log: Log,
}

fn acquirer(
    db_failures: u32,
    max_attempts: u32,
) -> (DependencyAcquirer<ScriptedDatabase, ScriptedBroker>, Harness) {
    let harness = Harness {
        db_attempts: Arc::new(AtomicU32::new(0)),
        broker_connects: Arc::new(AtomicU32::new(0)),
        log: Arc::new(Mutex::new(Vec::new())),
    };
    let policy = AcquirePolicy {
        database_retry: RetryPolicy::new(max_attempts, Duration::from_millis(1)),
        broker_timeout: Duration::from_millis(200),
    };
    let acquirer = DependencyAcquirer::new(
        ScriptedDatabase {
            failures: db_failures,
            attempts: harness.db_attempts.clone(),
            log: harness.log.clone(),
        },
        ScriptedBroker {
            connects: harness.broker_connects.clone(),
            log: harness.log.clone(),
        },
        policy,
    )
    .with_channel("template_created");
    (acquirer, harness)
}

#[tokio::test]
async fn test_ready_after_transient_database_failures() {
    let (acquirer, harness) = acquirer(3, 5);
    let mut readiness = acquirer.readiness();

    let dependencies = acquirer.acquire().await.unwrap();

    assert!(readiness.wait_ready().await);
    assert_eq!(harness.db_attempts.load(Ordering::SeqCst), 4);
    assert_eq!(harness.broker_connects.load(Ordering::SeqCst), 1);

    acquirer.release(dependencies).await;
    assert_eq!(readiness.state(Dependency::Database), DependencyState::Closed);
    assert_eq!(*harness.log.lock().unwrap(), vec!["broker", "database"]);
}

#[tokio::test]
async fn test_exhausted_budget_skips_broker() {
    let (acquirer, harness) = acquirer(5, 5);
    let mut readiness = acquirer.readiness();

    let result = acquirer.acquire().await;

    match result {
        Err(BootstrapError::DatabaseUnavailable { attempts, .. }) => assert_eq!(attempts, 5),
        other => panic!("Expected DatabaseUnavailable, got {:?}", other.map(|_| ())),
    }
    assert_eq!(harness.broker_connects.load(Ordering::SeqCst), 0);
    assert!(!readiness.wait_ready().await);
    assert_eq!(readiness.state(Dependency::Broker), DependencyState::Unacquired);
}

#[tokio::test]
async fn test_bind_failure_releases_dependencies() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap().to_string();

    let (acquirer, harness) = acquirer(0, 1);
    let readiness = acquirer.readiness();
    let lifecycle = Lifecycle::new();

    let result = lifecycle
        .run(
            acquirer,
            &addr,
            |_dependencies, _background| Router::new(),
            std::future::pending::<()>(),
        )
        .await;

    assert!(matches!(result, Err(LifecycleError::Bind { .. })));
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    assert_eq!(*harness.log.lock().unwrap(), vec!["broker", "database"]);
    assert_eq!(readiness.state(Dependency::Database), DependencyState::Closed);
    assert_eq!(readiness.state(Dependency::Broker), DependencyState::Closed);
}
