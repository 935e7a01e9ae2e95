use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        user_id TEXT PRIMARY KEY,
        alias TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'student'
    )",
    "CREATE TABLE IF NOT EXISTS forums (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        course_id INTEGER,
        department_id INTEGER,
        subject_id INTEGER,
        moderator_id TEXT NOT NULL,
        is_private INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        tags TEXT NOT NULL DEFAULT '[]'
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        forum_id INTEGER NOT NULL,
        author_id TEXT NOT NULL,
        client_nonce INTEGER,
        body TEXT NOT NULL,
        attachments TEXT,
        created_at INTEGER NOT NULL,
        UNIQUE (forum_id, author_id, client_nonce)
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_forum_order
        ON messages (forum_id, created_at, id)",
];

pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForumStatus {
    Active,
    Archived,
}

impl ForumStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "archived" => Self::Archived,
            _ => Self::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forum {
    pub id: i64,
    pub name: String,
    pub course_id: Option<i64>,
    pub department_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub moderator_id: String,
    pub is_private: bool,
    pub status: ForumStatus,
    pub tags: Vec<String>,
}

type ForumRow = (
    i64,
    String,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    String,
    bool,
    String,
    String,
);

fn forum_from_row(
    (id, name, course_id, department_id, subject_id, moderator_id, is_private, status, tags): ForumRow,
) -> Forum {
    Forum {
        id,
        name,
        course_id,
        department_id,
        subject_id,
        moderator_id,
        is_private,
        status: ForumStatus::parse(&status),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
    }
}

const FORUM_COLUMNS: &str =
    "id,name,course_id,department_id,subject_id,moderator_id,is_private,status,tags";

pub async fn load_forum(pool: &SqlitePool, id: i64) -> Result<Option<Forum>, sqlx::Error> {
    let row: Option<ForumRow> =
        sqlx::query_as(&format!("SELECT {FORUM_COLUMNS} FROM forums WHERE id=?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(forum_from_row))
}

pub async fn list_active_forums(pool: &SqlitePool) -> Result<Vec<Forum>, sqlx::Error> {
    let rows: Vec<ForumRow> = sqlx::query_as(&format!(
        "SELECT {FORUM_COLUMNS} FROM forums WHERE status='active' ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(forum_from_row).collect())
}

pub async fn load_account(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<(String, String)>, sqlx::Error> {
    sqlx::query_as("SELECT alias,role FROM accounts WHERE user_id=?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
