//! Redis-backed broker.
//!
//! Each named channel is a Redis list used as a work queue: publishers
//! `RPUSH`, consumers pop from the other end. Declaring a channel checks that
//! the key is either absent or already a list; Redis creates the list on the
//! first push.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

use crate::bootstrap::BrokerDriver;
use crate::error::{DependencyError, PublishError};

use super::publisher::EventPublisher;

/// Connects to Redis and declares list-backed channels.
#[derive(Debug, Clone)]
pub struct RedisBroker {
    url: String,
}

impl RedisBroker {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl BrokerDriver for RedisBroker {
    type Channel = MultiplexedConnection;

    async fn connect(&self) -> Result<Self::Channel, DependencyError> {
        let client = Client::open(self.url.as_str())
            .map_err(|e| DependencyError::Connect(e.to_string()))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| DependencyError::Connect(e.to_string()))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| DependencyError::Connect(e.to_string()))?;
        debug!(reply = %pong, "Broker answered ping");

        Ok(conn)
    }

    async fn declare_channel(
        &self,
        channel: &Self::Channel,
        name: &str,
    ) -> Result<(), DependencyError> {
        let mut conn = channel.clone();
        let key_type: String = redis::cmd("TYPE")
            .arg(name)
            .query_async(&mut conn)
            .await
            .map_err(|e| DependencyError::Declare {
                channel: name.to_string(),
                message: e.to_string(),
            })?;

        match key_type.as_str() {
            "none" | "list" => {
                info!(channel = name, "Channel declared");
                Ok(())
            }
            other => Err(DependencyError::Declare {
                channel: name.to_string(),
                message: format!("key exists with type '{}', expected a list", other),
            }),
        }
    }

    /// Drop this handle to the multiplexed connection.
    ///
    /// The socket only closes once every clone is gone, including the one
    /// inside [`RedisQueuePublisher`]. [`Lifecycle::run`] drops the router,
    /// and with it the publisher, before releasing dependencies.
    ///
    /// [`Lifecycle::run`]: crate::bootstrap::Lifecycle::run
    async fn close(&self, channel: Self::Channel) {
        drop(channel);
        debug!("Broker connection released");
    }
}

/// [`EventPublisher`] that appends payloads to a Redis list.
#[derive(Clone)]
pub struct RedisQueuePublisher {
    conn: MultiplexedConnection,
}

impl RedisQueuePublisher {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl EventPublisher for RedisQueuePublisher {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(channel, payload)
            .await
            .map_err(|e| PublishError::PublishFailure {
                channel: channel.to_string(),
                message: e.to_string(),
            })
    }
}
