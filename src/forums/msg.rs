//! HTTP side of the message log: history fetch, batch ingest, batch delete.

use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::auth::{self, Action, Principal};
use crate::chat::events::Message;
use crate::chat::gateway::{CandidateMessage, MessageGateway};
use crate::db::{self, Forum};
use crate::{session, ApiError, ApiResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryQuery {
    forum_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestQuery {
    selected_forum_id: i64,
    processed_messages: Vec<CandidateMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteQuery {
    forum_id: i64,
    message_ids: Vec<i64>,
}

async fn checked_forum(
    db_pool: &SqlitePool,
    session: &Session,
    forum_id: i64,
    action: Action,
) -> ApiResult<(Principal, Forum)> {
    let principal = session::current_principal(db_pool, session).await?;

    let Some(forum) = db::load_forum(db_pool, forum_id).await? else {
        return Err(ApiError::validation("unknown forum"));
    };
    if !auth::authorize(&principal, action, Some(&forum)) {
        return Err(ApiError::Unauthorized);
    }

    Ok((principal, forum))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn history(
    State(db_pool): State<SqlitePool>,
    State(gateway): State<MessageGateway>,
    session: Session,
    Query(HistoryQuery { forum_id }): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let _ = checked_forum(&db_pool, &session, forum_id, Action::ReadHistory).await?;

    Ok(Json(gateway.history(forum_id).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn ingest(
    State(db_pool): State<SqlitePool>,
    State(gateway): State<MessageGateway>,
    session: Session,
    Json(IngestQuery { selected_forum_id, processed_messages }): Json<IngestQuery>,
) -> ApiResult<Json<Value>> {
    let (principal, forum) =
        checked_forum(&db_pool, &session, selected_forum_id, Action::IngestMessages).await?;
    auth::require_active(&forum)?;

    gateway
        .ingest_batch(selected_forum_id, &principal.user_id, &processed_messages)
        .await?;

    Ok(Json(json!({ "success": true })))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete(
    State(db_pool): State<SqlitePool>,
    State(gateway): State<MessageGateway>,
    session: Session,
    Json(DeleteQuery { forum_id, message_ids }): Json<DeleteQuery>,
) -> ApiResult<Json<Value>> {
    let (_, forum) = checked_forum(&db_pool, &session, forum_id, Action::DeleteMessages).await?;
    auth::require_active(&forum)?;

    let deleted = gateway.delete_batch(forum_id, &message_ids).await?;

    Ok(Json(json!({
        "message": format!("deleted {} message(s)", deleted.len()),
    })))
}
