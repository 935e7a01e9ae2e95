pub mod auth;
pub mod chat;
pub mod db;
pub mod error;
pub mod forums;
pub mod session;

use std::sync::Arc;

use axum::extract::FromRef;
use serde_json::Value;
use sqlx::SqlitePool;

use chat::broadcast::Broadcaster;
use chat::gateway::MessageGateway;
use chat::registry::RoomRegistry;

pub use error::{ApiError, ApiResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub clients: auth::Clients,
    pub registry: Arc<RoomRegistry>,
    pub broadcaster: Broadcaster,
    pub gateway: MessageGateway,
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> ApiResult<String>;
    fn get_obj_field(&self, field: &str) -> ApiResult<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> ApiResult<String> {
        Ok(
            self.get(field)
            .ok_or_else(|| anyhow::anyhow!("expected {field} in {self}"))?
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> ApiResult<&Value> {
        Ok(
            self.get(field)
            .ok_or_else(|| anyhow::anyhow!("expected {field} in {self}"))?
        )
    }
}
