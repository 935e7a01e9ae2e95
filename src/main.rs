use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use studyhall::chat::broadcast::Broadcaster;
use studyhall::chat::gateway::MessageGateway;
use studyhall::chat::registry::RoomRegistry;
use studyhall::{auth, db, forums, AppState};
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(30)));

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(dotenv::var("DATABASE_URL").context("DATABASE_URL not set")?.as_str())
        .await?;
    db::init_schema(&db_pool).await?;

    let clients = match dotenv::var("CLIENT_SECRET_PATH") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {path}"))?;
            let public_url = dotenv::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_owned());
            auth::Clients::from_json(serde_json::from_str(&raw)?, &public_url)?
        }
        Err(_) => {
            tracing::warn!("CLIENT_SECRET_PATH not set, sign-in is disabled");
            auth::Clients::disabled()
        }
    };

    let registry = Arc::new(RoomRegistry::new());
    let app_state = AppState {
        broadcaster: Broadcaster::new(registry.clone()),
        gateway: MessageGateway::new(db_pool.clone()),
        db_pool,
        clients,
        registry,
    };

    let app = Router::new()
        .merge(auth::router())
        .merge(forums::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive());

    let addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
