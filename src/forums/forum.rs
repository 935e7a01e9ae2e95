use axum::{debug_handler, extract::{Path, State}, Json};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::auth::{self, Action};
use crate::db::{self, Forum};
use crate::{session, ApiError, ApiResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_forums(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> ApiResult<Json<Vec<Forum>>> {
    let principal = session::current_principal(&db_pool, &session).await?;

    let forums = db::list_active_forums(&db_pool)
        .await?
        .into_iter()
        .filter(|forum| auth::authorize(&principal, Action::ReadHistory, Some(forum)))
        .collect();

    Ok(Json(forums))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn get_forum(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(forum_id): Path<i64>,
) -> ApiResult<Json<Forum>> {
    let principal = session::current_principal(&db_pool, &session).await?;

    let Some(forum) = db::load_forum(&db_pool, forum_id).await? else {
        return Err(ApiError::validation("unknown forum"));
    };
    if !auth::authorize(&principal, Action::ReadHistory, Some(&forum)) {
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(forum))
}

/// `active` → `archived`. One-way; archived forums stay readable but reject
/// every mutation. Re-archiving is a no-op rather than an error.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn archive_forum(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(forum_id): Path<i64>,
) -> ApiResult<Json<Forum>> {
    let principal = session::current_principal(&db_pool, &session).await?;

    let Some(forum) = db::load_forum(&db_pool, forum_id).await? else {
        return Err(ApiError::validation("unknown forum"));
    };
    if !auth::authorize(&principal, Action::ArchiveForum, Some(&forum)) {
        return Err(ApiError::Unauthorized);
    }

    sqlx::query("UPDATE forums SET status='archived' WHERE id=?")
        .bind(forum_id)
        .execute(&db_pool)
        .await?;

    tracing::info!(forum_id, by = %principal.user_id, "archived forum");

    let Some(forum) = db::load_forum(&db_pool, forum_id).await? else {
        return Err(ApiError::validation("unknown forum"));
    };
    Ok(Json(forum))
}
