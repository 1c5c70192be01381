//! Register and unregister flows.
//!
//! The service resolves request inputs against the configuration, hands the
//! broker work to the [`QueueAdministrator`] and reports either a result or
//! a [`GatewayError`]. Input problems are detected before any broker
//! connection is opened.

use thiserror::Error;
use tracing::{error, info};

use crate::queue::{BrokerError, QueueAdministrator, QueueKey};

/// Routing key used when a registration does not supply one.
pub const DEFAULT_ROUTING_KEY: &str = "*";

/// Message returned with a successful unregistration.
pub const DELETION_RESULT: &str = "Queue deletion request sent to the broker.";

/// Problems with the request itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("request body is missing")]
    MissingBody,

    #[error("request body is invalid: {0}")]
    InvalidBody(String),

    #[error("queue key is missing")]
    MissingKey,

    #[error("no exchange given and no default exchange configured")]
    ExchangeUnresolved,
}

/// Why a register or unregister request was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Inputs of a registration.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub exchange: Option<String>,
    pub routing_key: Option<String>,
}

/// Inputs of an unregistration.
#[derive(Debug, Clone, Default)]
pub struct DeregistrationRequest {
    pub key: Option<String>,
    pub force: Option<bool>,
}

/// Outcome of a successful unregistration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistered {
    pub key: QueueKey,
    pub result: &'static str,
}

#[derive(Clone)]
pub struct GatewayService {
    admin: QueueAdministrator,
    default_exchange: Option<String>,
}

impl GatewayService {
    pub fn new(admin: QueueAdministrator, default_exchange: Option<String>) -> Self {
        Self {
            admin,
            default_exchange,
        }
    }

    /// Create a queue bound to the requested (or default) exchange.
    pub async fn register(&self, request: RegistrationRequest) -> Result<QueueKey, GatewayError> {
        let exchange = request
            .exchange
            .or_else(|| self.default_exchange.clone())
            .ok_or(InputError::ExchangeUnresolved)?;
        let routing_key = request
            .routing_key
            .unwrap_or_else(|| DEFAULT_ROUTING_KEY.to_string());

        match self.admin.declare_and_bind(&exchange, &routing_key).await {
            Ok(key) => {
                info!(key = %key, exchange = %exchange, "consumer_registered");
                Ok(key)
            }
            Err(e) => {
                error!(
                    exchange = %exchange,
                    routing_key = %routing_key,
                    error = %e,
                    "consumer_register_failed"
                );
                Err(e.into())
            }
        }
    }

    /// Delete the queue behind a key.
    pub async fn unregister(
        &self,
        request: DeregistrationRequest,
    ) -> Result<Unregistered, GatewayError> {
        let key = request
            .key
            .filter(|k| !k.is_empty())
            .map(QueueKey::from)
            .ok_or(InputError::MissingKey)?;
        let force = request.force.unwrap_or(false);
        let queue = key.queue_name();

        if let Err(e) = self.admin.delete(&queue, force).await {
            error!(
                queue = %queue,
                force = force,
                error = %e,
                "consumer_unregister_failed"
            );
            return Err(e.into());
        }

        info!(key = %key, force = force, "consumer_unregistered");

        Ok(Unregistered {
            key,
            result: DELETION_RESULT,
        })
    }
}
