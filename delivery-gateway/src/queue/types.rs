//! Queue identity types.
//!
//! A registration is identified by an opaque [`QueueKey`] handed to the
//! caller. The broker-side queue name is always derived from it and never
//! stored anywhere else.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every queue this gateway creates.
pub const QUEUE_PREFIX: &str = "delivery-";

/// Opaque caller-facing handle of a registered queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueKey(String);

impl QueueKey {
    /// Generate a fresh random key (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Name of the broker queue this key stands for.
    pub fn queue_name(&self) -> QueueName {
        QueueName(format!("{}{}", QUEUE_PREFIX, self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for QueueKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for QueueKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broker-side queue name, always `QUEUE_PREFIX` followed by a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueName(String);

impl QueueName {
    /// Recover the key from a queue name.
    ///
    /// Returns `None` for names that were not derived from a key.
    pub fn key(&self) -> Option<QueueKey> {
        self.0
            .strip_prefix(QUEUE_PREFIX)
            .map(|key| QueueKey(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
