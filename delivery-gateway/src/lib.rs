//! Delivery gateway - provision RabbitMQ consumer queues over HTTP.
//!
//! Callers register a consumer and receive an opaque key. Behind the key
//! sits a durable queue named `delivery-<key>` bound to an exchange. The
//! key is later used to unregister, which deletes the queue. The broker is
//! the only record of which queues exist.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (web) → GatewayService → QueueAdministrator → ConnectionFactory → RabbitMQ
//! ```

pub mod config;
pub mod queue;
pub mod service;
pub mod web;

// Re-export commonly used types
pub use config::{BrokerConfig, Config, ConfigError};
pub use queue::{
    BrokerError, ConnectionFactory, LapinConnectionFactory, QueueAdministrator, QueueKey,
    QueueName,
};
pub use service::{GatewayError, GatewayService, InputError};
pub use web::{router, AppState};
