use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

mod config;
mod database;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use database::connection::get_db_client;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = config::AppConfig::from_env();
    tracing::info!("✅ App config loaded");
    tracing::info!("🌐 Gateway environment: {}", config.gateway_environment);
    if config.gateway_webhook_secret.is_none() {
        tracing::warn!("GATEWAY_WEBHOOK_SECRET not set, webhook signatures will not be verified");
    }

    let addr = bind_addr(&config.host, config.port);

    let db = get_db_client(&config.database_url).await;
    let app_state = AppState::new(db, config);

    let app = build_router(app_state);
    start_server(app, addr).await;
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/payments", routes::payments::payment_routes())
        .layer(cors)
        .with_state(app_state)
}

fn bind_addr(host: &str, port: u16) -> SocketAddr {
    let ip = host
        .parse()
        .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0]));
    SocketAddr::new(ip, port)
}

async fn start_server(app: Router, addr: SocketAddr) {
    tracing::info!("🚀 Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            axum::serve(listener, app).await.unwrap();
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "💳 Payment Link API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "gateway": state.config.get_config_info(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_uses_configured_host_and_port() {
        let addr = bind_addr("127.0.0.1", 8080);
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn bind_addr_falls_back_to_all_interfaces() {
        let addr = bind_addr("not-an-ip", 3000);
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }
}
