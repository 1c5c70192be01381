//! HTTP boundary of the gateway.
//!
//! All routes live under `/delivery`:
//! - `GET /status`: liveness check
//! - `POST /register_consumer`: create a queue, return its key
//! - `POST /unregister_consumer`: delete the queue behind a key
//!
//! Handlers only parse the body and delegate to the `GatewayService`.

pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use error::{ErrorBody, ErrorResponse};
pub use handlers::{
    register_consumer, status, unregister_consumer, AppState, RegisterConsumerBody,
    RegisterResponse, UnregisterConsumerBody, UnregisterResponse,
};

/// Path prefix of every route.
pub const ENDPOINT: &str = "/delivery";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(status))
        .route("/register_consumer", post(register_consumer))
        .route("/unregister_consumer", post(unregister_consumer));

    Router::new()
        .nest(ENDPOINT, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
