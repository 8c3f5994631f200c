use axum::{
    routing::{get, post},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod adapters;
mod api;
mod config;
mod db;
mod entities;
mod error;
mod services;

use adapters::crawl::PageCrawler;
use adapters::enumeration::SubfinderEnumerator;
use adapters::fingerprint::HttpProber;
use adapters::vulnscan::ZapScanner;
use config::Settings;
use services::orchestrator::Orchestrator;
use services::severity::SeverityOverrides;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub orchestrator: Arc<Orchestrator>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load env vars
    dotenvy::dotenv().ok();
    let settings = Settings::from_env();

    // Connect to DB
    let db = match db::connect().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        db.clone(),
        Arc::new(SubfinderEnumerator),
        Arc::new(PageCrawler::new(settings.crawl_timeout)),
        Arc::new(HttpProber::new(settings.fingerprint_timeout)),
        Arc::new(ZapScanner::new(&settings)),
        Arc::new(SeverityOverrides::default()),
        settings.fanout_limit,
    ));

    let state = AppState { db, orchestrator };

    // CORS Layer
    let cors = CorsLayer::permissive();

    // Build application with routes
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/v1/accounts", post(api::accounts::create_account))
        .route("/api/v1/domains", post(api::domains::create_domain))
        .route("/api/v1/scans", post(api::scans::create_scan))
        .route("/api/v1/scans/{uid}", get(api::scans::get_scan))
        .route("/api/v1/endpoints/{uid}", get(api::endpoints::get_endpoint))
        .with_state(state)
        .layer(cors);

    // Run app
    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn root() -> Json<Value> {
    Json(json!({
        "system": "subscope",
        "status": "operational",
        "modules": {
            "api": "active",
            "orchestrator": "standing_by"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
