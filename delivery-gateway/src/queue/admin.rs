//! Queue administration: declare, bind and delete consumer queues.
//!
//! Registration is a two-step sequence on the broker: declare the durable
//! queue, then bind it. If the bind fails the queue exists but nothing routes
//! to it, so a forced delete is attempted once on a new connection before
//! the bind error is returned. A failed cleanup leaves the orphan in place;
//! it is logged and not retried.
//!
//! Each sequence runs on its own task. A caller that goes away mid-request
//! does not interrupt it, so the bind, the cleanup and the session release
//! still happen.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use super::connection::{with_session, ConnectionFactory};
use super::error::{BrokerError, CleanupError};
use super::types::{QueueKey, QueueName};

/// Runs queue lifecycle operations against the broker.
#[derive(Clone)]
pub struct QueueAdministrator {
    factory: Arc<dyn ConnectionFactory>,
}

impl QueueAdministrator {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }

    /// Create a durable queue bound to `exchange` and return its key.
    pub async fn declare_and_bind(
        &self,
        exchange: &str,
        routing_key: &str,
    ) -> Result<QueueKey, BrokerError> {
        let admin = self.clone();
        let (exchange, routing_key) = (exchange.to_string(), routing_key.to_string());
        detached(async move { admin.register_queue(&exchange, &routing_key).await }).await
    }

    /// Delete a queue. Unless `force` is set the broker only deletes it when
    /// it holds no messages.
    pub async fn delete(&self, queue: &QueueName, force: bool) -> Result<u32, BrokerError> {
        let admin = self.clone();
        let queue = queue.clone();
        detached(async move { admin.remove_queue(&queue, force).await }).await
    }

    async fn register_queue(
        &self,
        exchange: &str,
        routing_key: &str,
    ) -> Result<QueueKey, BrokerError> {
        let key = QueueKey::generate();
        let queue = key.queue_name();

        let (name, exchange_name, binding) =
            (queue.clone(), exchange.to_string(), routing_key.to_string());
        let outcome = with_session(self.factory.as_ref(), move |session| {
            Box::pin(async move {
                session.declare_durable_queue(&name).await?;
                info!(queue = %name, "queue_declared");
                session.bind_queue(&name, &exchange_name, &binding).await
            })
        })
        .await;

        match outcome {
            Ok(()) => {
                info!(
                    queue = %queue,
                    exchange = %exchange,
                    routing_key = %routing_key,
                    "queue_bound"
                );
                Ok(key)
            }
            Err(err @ BrokerError::Bind { .. }) => {
                error!(
                    queue = %queue,
                    exchange = %exchange,
                    routing_key = %routing_key,
                    error = %err,
                    "queue_bind_failed"
                );
                if let Err(cleanup) = self.remove_orphan(&queue).await {
                    cleanup.discard();
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn remove_queue(&self, queue: &QueueName, force: bool) -> Result<u32, BrokerError> {
        let name = queue.clone();
        let dropped = with_session(self.factory.as_ref(), move |session| {
            Box::pin(async move { session.delete_queue(&name, !force).await })
        })
        .await?;

        info!(
            queue = %queue,
            force = force,
            dropped_messages = dropped,
            "queue_deleted"
        );

        Ok(dropped)
    }

    /// Forced delete of a queue left behind by a failed bind.
    async fn remove_orphan(&self, queue: &QueueName) -> Result<(), CleanupError> {
        info!(queue = %queue, "orphan_cleanup_start");

        self.remove_queue(queue, true)
            .await
            .map(|_| ())
            .map_err(|e| CleanupError::new(queue.clone(), e))
    }
}

/// Run a broker sequence on its own task and wait for it.
async fn detached<T, F>(sequence: F) -> Result<T, BrokerError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, BrokerError>> + Send + 'static,
{
    match tokio::spawn(sequence).await {
        Ok(outcome) => outcome,
        Err(e) => Err(BrokerError::Aborted(e.to_string())),
    }
}
