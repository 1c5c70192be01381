//! Broker connections.
//!
//! Every operation opens its own connection and channel, uses it for one
//! sequence of commands and closes it again. There is no pooling: a session
//! only lives inside [`with_session`], which releases it on every exit path,
//! including a dropped future or a panic inside the operation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use lapin::{
    options::{QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tracing::{debug, warn};
use url::Url;

use super::error::BrokerError;
use super::types::QueueName;
use crate::config::BrokerConfig;

/// Reply text sent when a session is released.
const CLOSE_REPLY: &str = "Operation done";

/// Opens independent broker sessions.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError>;
}

/// Queue administration commands available on an open session.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Declare a durable queue.
    async fn declare_durable_queue(&self, queue: &QueueName) -> Result<(), BrokerError>;

    async fn bind_queue(
        &self,
        queue: &QueueName,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    /// Delete a queue, returning how many messages were dropped with it.
    ///
    /// With `if_empty` the broker refuses to delete a queue holding messages.
    async fn delete_queue(&self, queue: &QueueName, if_empty: bool) -> Result<u32, BrokerError>;

    /// Close the session. No command may be issued afterwards.
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Closes a session when dropped while still armed.
///
/// [`release`](ReleaseGuard::release) closes inline and disarms. Any other
/// way out of the scope (cancellation, panic) hands the close to a
/// background task on the current runtime.
struct ReleaseGuard {
    session: Arc<dyn BrokerSession>,
    armed: bool,
}

impl ReleaseGuard {
    fn new(session: Arc<dyn BrokerSession>) -> Self {
        Self {
            session,
            armed: true,
        }
    }

    async fn release(mut self) {
        self.armed = false;
        if let Err(e) = self.session.close().await {
            warn!(error = %e, "broker_session_close_failed");
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let session = Arc::clone(&self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("broker_session_abandoned");
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(error = %e, "broker_session_close_failed");
                    }
                });
            }
            Err(_) => warn!("broker_session_leaked_without_runtime"),
        }
    }
}

/// Run `op` on a fresh session and release the session afterwards.
///
/// The session is closed whatever `op` returns, and also when this future is
/// dropped before completion. A failure to close is only logged; the outcome
/// of `op` is what the caller gets.
pub async fn with_session<T, F>(factory: &dyn ConnectionFactory, op: F) -> Result<T, BrokerError>
where
    F: for<'s> FnOnce(&'s dyn BrokerSession) -> BoxFuture<'s, Result<T, BrokerError>>,
{
    let session: Arc<dyn BrokerSession> = Arc::from(factory.connect().await?);
    let guard = ReleaseGuard::new(Arc::clone(&session));

    let outcome = op(session.as_ref()).await;
    guard.release().await;

    outcome
}

/// Build the AMQP URI for a broker configuration.
///
/// Credentials and the virtual host are percent-encoded, so the default
/// vhost `/` becomes `%2F`.
pub fn amqp_uri(config: &BrokerConfig) -> Result<Url, BrokerError> {
    let invalid = |what: &str| BrokerError::Connect(format!("invalid broker {}", what));

    let mut uri = Url::parse(&format!("amqp://{}:{}", config.host, config.port))
        .map_err(|_| invalid("address"))?;
    uri.set_username(&config.username)
        .map_err(|_| invalid("username"))?;
    uri.set_password(Some(&config.password))
        .map_err(|_| invalid("password"))?;
    uri.path_segments_mut()
        .map_err(|_| invalid("virtual host"))?
        .push(&config.vhost);

    Ok(uri)
}

/// Connection factory backed by lapin.
#[derive(Debug, Clone)]
pub struct LapinConnectionFactory {
    config: BrokerConfig,
}

impl LapinConnectionFactory {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    async fn open(&self) -> Result<LapinSession, BrokerError> {
        let uri = amqp_uri(&self.config)?;
        let limit = self.config.connect_timeout;

        debug!(
            host = %self.config.host,
            port = self.config.port,
            vhost = %self.config.vhost,
            "rabbitmq_connecting"
        );

        let connection = tokio::time::timeout(
            limit,
            Connection::connect(uri.as_str(), ConnectionProperties::default()),
        )
        .await
        .map_err(|_| timed_out(limit))?
        .map_err(|e| BrokerError::Connect(e.to_string()))?;

        // The connection is open from here on and must be closed on failure.
        let channel = match tokio::time::timeout(limit, connection.create_channel()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => {
                close_connection(&connection).await;
                return Err(BrokerError::Connect(e.to_string()));
            }
            Err(_) => {
                close_connection(&connection).await;
                return Err(timed_out(limit));
            }
        };

        debug!("rabbitmq_connected");

        Ok(LapinSession {
            connection,
            channel,
        })
    }
}

#[async_trait]
impl ConnectionFactory for LapinConnectionFactory {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        Ok(Box::new(self.open().await?))
    }
}

fn timed_out(limit: Duration) -> BrokerError {
    BrokerError::Timeout {
        timeout_ms: limit.as_millis() as u64,
    }
}

async fn close_connection(connection: &Connection) {
    if let Err(e) = connection.close(200, CLOSE_REPLY).await {
        warn!(error = %e, "rabbitmq_connection_close_error");
    }
}

struct LapinSession {
    connection: Connection,
    channel: Channel,
}

#[async_trait]
impl BrokerSession for LapinSession {
    async fn declare_durable_queue(&self, queue: &QueueName) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(
                queue.as_str(),
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Declare {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &QueueName,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.channel
            .queue_bind(
                queue.as_str(),
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Bind {
                queue: queue.to_string(),
                exchange: exchange.to_string(),
                reason: e.to_string(),
            })
    }

    async fn delete_queue(&self, queue: &QueueName, if_empty: bool) -> Result<u32, BrokerError> {
        self.channel
            .queue_delete(
                queue.as_str(),
                QueueDeleteOptions {
                    if_empty,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BrokerError::Delete {
                queue: queue.to_string(),
                reason: e.to_string(),
            })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        // The broker already closed the channel if a command failed on it.
        if self.channel.status().connected() {
            if let Err(e) = self.channel.close(200, CLOSE_REPLY).await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        self.connection
            .close(200, CLOSE_REPLY)
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))
    }
}
