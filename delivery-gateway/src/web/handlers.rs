//! Delivery endpoint handlers.
//!
//! Bodies are read as raw bytes and decoded here, so that an absent body and
//! a malformed one are both reported through `GatewayError` instead of the
//! extractor's own rejection.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::queue::{ConnectionFactory, QueueAdministrator, QueueKey};
use crate::service::{
    DeregistrationRequest, GatewayError, GatewayService, InputError, RegistrationRequest,
};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: GatewayService,
}

impl AppState {
    pub fn new(config: &Config, factory: Arc<dyn ConnectionFactory>) -> Self {
        let service = GatewayService::new(
            QueueAdministrator::new(factory),
            config.default_exchange.clone(),
        );

        Self { service }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Liveness check.
pub async fn status() -> &'static str {
    "ALIVE"
}

// =============================================================================
// Register Consumer
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterConsumerBody {
    pub exchange: Option<String>,
    #[serde(rename = "routing-key")]
    pub routing_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub key: QueueKey,
}

/// Create a queue bound to an exchange and return its key.
pub async fn register_consumer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RegisterResponse>, GatewayError> {
    let body: RegisterConsumerBody = parse_body(&body)?;

    info!(
        exchange = ?body.exchange,
        routing_key = ?body.routing_key,
        "register_consumer_received"
    );

    let key = state
        .service
        .register(RegistrationRequest {
            exchange: body.exchange,
            routing_key: body.routing_key,
        })
        .await?;

    Ok(Json(RegisterResponse { key }))
}

// =============================================================================
// Unregister Consumer
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UnregisterConsumerBody {
    pub key: Option<String>,
    pub force: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnregisterResponse {
    pub key: QueueKey,
    pub success: bool,
    pub result: String,
}

/// Delete the queue behind a key.
pub async fn unregister_consumer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<UnregisterResponse>, GatewayError> {
    let body: UnregisterConsumerBody = parse_body(&body)?;

    info!(
        key = ?body.key,
        force = ?body.force,
        "unregister_consumer_received"
    );

    let done = state
        .service
        .unregister(DeregistrationRequest {
            key: body.key,
            force: body.force,
        })
        .await?;

    Ok(Json(UnregisterResponse {
        key: done.key,
        success: true,
        result: done.result.to_string(),
    }))
}

/// Decode a JSON object body.
///
/// An empty body, `null`, an empty object, or anything other than an object
/// counts as a missing body.
fn parse_body<T: DeserializeOwned>(raw: &[u8]) -> Result<T, InputError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(InputError::MissingBody);
    }

    let value: Value =
        serde_json::from_slice(raw).map_err(|e| InputError::InvalidBody(e.to_string()))?;
    match value.as_object() {
        Some(fields) if !fields.is_empty() => {}
        _ => return Err(InputError::MissingBody),
    }

    serde_json::from_value(value).map_err(|e| InputError::InvalidBody(e.to_string()))
}
