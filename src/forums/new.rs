use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::auth::{self, Action};
use crate::db::{Forum, ForumStatus};
use crate::{session, ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewForumQuery {
    name: String,
    course_id: Option<i64>,
    department_id: Option<i64>,
    subject_id: Option<i64>,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    tags: Vec<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_forum(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(query): Json<NewForumQuery>,
) -> ApiResult<(StatusCode, Json<Forum>)> {
    let principal = session::current_principal(&db_pool, &session).await?;
    if !auth::authorize(&principal, Action::CreateForum, None) {
        return Err(ApiError::Unauthorized);
    }

    if query.name.trim().is_empty() {
        return Err(ApiError::validation("forum name must not be empty"));
    }

    let tags = serde_json::to_string(&query.tags)?;
    let result = sqlx::query(
        "INSERT INTO forums (name,course_id,department_id,subject_id,moderator_id,is_private,status,tags)
         VALUES (?,?,?,?,?,?,'active',?)",
    )
    .bind(&query.name)
    .bind(query.course_id)
    .bind(query.department_id)
    .bind(query.subject_id)
    .bind(&principal.user_id)
    .bind(query.is_private)
    .bind(&tags)
    .execute(&db_pool)
    .await?;

    let forum = Forum {
        id: result.last_insert_rowid(),
        name: query.name,
        course_id: query.course_id,
        department_id: query.department_id,
        subject_id: query.subject_id,
        moderator_id: principal.user_id,
        is_private: query.is_private,
        status: ForumStatus::Active,
        tags: query.tags,
    };

    tracing::info!(forum_id = forum.id, moderator = %forum.moderator_id, "created forum");

    Ok((StatusCode::CREATED, Json(forum)))
}
