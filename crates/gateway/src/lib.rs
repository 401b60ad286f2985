//! HTTP shell exposing `/v1/messages` and translating to an OpenAI-shape
//! upstream. Everything that understands the wire shapes lives in
//! `gateway-core`; this crate only parses requests, forwards bytes, and
//! wires the axum router together.

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod upstream;

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use config::GatewayConfig;
use reqwest::Client;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared state handed to every route handler: the gateway's own
/// configuration plus the single reqwest client reused across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub http_client: Client,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let http_client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .expect("failed to build reqwest client");

        Self { config: Arc::new(config), http_client }
    }
}

/// Builds the full axum router: `/v1/messages`, `/health`, and a permissive
/// CORS layer matching the fixed preflight response the spec requires.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("anthropic-version"),
        ]);

    Router::new()
        .route("/v1/messages", post(routes::messages::handle_messages))
        .route("/health", get(routes::health::health_check))
        .layer(cors)
        .with_state(state)
}
