use gateway::config::GatewayConfig;
use gateway::logging::init_tracing;
use gateway::{build_app, AppState};

#[tokio::main]
async fn main() {
    let config = GatewayConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });

    init_tracing(&config.logging);
    tracing::debug!(
        port = config.server.port,
        openai_base_url = %config.openai_base_url,
        has_fallback_api_key = config.openai_api_key.is_some(),
        "loaded configuration"
    );

    let bind_address = format!("0.0.0.0:{}", config.server.port);
    let app = build_app(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, address = %bind_address, "failed to bind listener");
        std::process::exit(1);
    });

    tracing::info!(address = %bind_address, "gateway listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
