//! Broker failure types.

use thiserror::Error;
use tracing::warn;

use super::types::QueueName;

/// Failure reported while talking to the broker.
///
/// Each variant keeps the broker's own message as text so the error stays
/// cheap to clone into logs and responses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("cannot connect to broker: {0}")]
    Connect(String),

    #[error("broker connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("cannot declare queue {queue}: {reason}")]
    Declare { queue: String, reason: String },

    #[error("cannot bind queue {queue} to exchange {exchange}: {reason}")]
    Bind {
        queue: String,
        exchange: String,
        reason: String,
    },

    #[error("cannot delete queue {queue}: {reason}")]
    Delete { queue: String, reason: String },

    #[error("broker operation aborted: {0}")]
    Aborted(String),
}

/// Failure of the compensating delete run after a bind failure.
///
/// Never returned to callers: the only way to consume one is [`discard`],
/// which logs it.
///
/// [`discard`]: CleanupError::discard
#[derive(Debug, Error)]
#[error("cleanup of orphaned queue {queue} failed: {source}")]
pub struct CleanupError {
    pub queue: QueueName,
    #[source]
    pub source: BrokerError,
}

impl CleanupError {
    pub fn new(queue: QueueName, source: BrokerError) -> Self {
        Self { queue, source }
    }

    /// Log the failure and drop it.
    pub fn discard(self) {
        warn!(
            queue = %self.queue,
            error = %self.source,
            "orphan_cleanup_failed"
        );
    }
}
