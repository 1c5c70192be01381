//! Queue module for RabbitMQ administration.
//!
//! This module provides:
//! - Queue identity types (`QueueKey` and the derived `QueueName`)
//! - Scoped broker sessions behind the `ConnectionFactory` seam
//! - The `QueueAdministrator` running declare/bind/delete sequences
//!
//! ## Registration
//!
//! ```text
//! generate key → declare durable queue → bind to exchange
//!                                           └─ on failure: forced delete on a new connection
//! ```

pub mod admin;
pub mod connection;
pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use admin::QueueAdministrator;
pub use connection::{with_session, BrokerSession, ConnectionFactory, LapinConnectionFactory};
pub use error::{BrokerError, CleanupError};
pub use types::{QueueKey, QueueName, QUEUE_PREFIX};
