mod clients;
mod lockin;
mod login;
mod logout;

use axum::routing::get;
use axum::Router;
use rand::seq::IndexedRandom;
use sqlx::SqlitePool;

pub use clients::{ClientProvider, Clients};

use crate::db::{Forum, ForumStatus};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Faculty,
    /// Principal, dean, head-of-department and department admin all carry
    /// the same capabilities in the forum subsystem.
    Authority,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Faculty => "faculty",
            Self::Authority => "authority",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "faculty" => Self::Faculty,
            "authority" => Self::Authority,
            _ => Self::Student,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub alias: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateForum,
    ArchiveForum,
    JoinForum,
    ReadHistory,
    SendMessage,
    IngestMessages,
    DeleteMessages,
}

/// The single capability check every handler and chat signal goes through.
/// `forum` is `None` only for actions that don't target an existing forum.
pub fn authorize(principal: &Principal, action: Action, forum: Option<&Forum>) -> bool {
    match action {
        Action::CreateForum => true,
        Action::ArchiveForum => forum.is_some_and(|f| {
            f.moderator_id == principal.user_id || principal.role == Role::Authority
        }),
        Action::JoinForum
        | Action::ReadHistory
        | Action::SendMessage
        | Action::IngestMessages
        | Action::DeleteMessages => can_enter(principal, forum),
    }
}

fn can_enter(principal: &Principal, forum: Option<&Forum>) -> bool {
    let Some(forum) = forum else {
        return false;
    };

    !forum.is_private
        || forum.moderator_id == principal.user_id
        || matches!(principal.role, Role::Faculty | Role::Authority)
}

pub(crate) async fn ensure_account(db_pool: &SqlitePool, user_id: &str) -> Result<(), sqlx::Error> {
    let adjectives = [
        "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
        "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Sad",
        "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
    ];

    let nouns = [
        "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
        "Falcon", "Hawk", "Shark", "Panda", "Kitten", "Puppy", "Phoenix", "Griffin",
        "Unicorn", "Turtle", "Dolphin", "Whale", "Elephant", "Giraffe", "Zebra",
    ];

    let alias = format!(
        "{} {}",
        adjectives.choose(&mut rand::rng()).copied().unwrap_or("Quick"),
        nouns.choose(&mut rand::rng()).copied().unwrap_or("Fox"),
    );

    let result = sqlx::query("INSERT OR IGNORE INTO accounts (user_id,alias,role) VALUES (?,?,?)")
        .bind(user_id)
        .bind(&alias)
        .bind(Role::Student.as_str())
        .execute(db_pool)
        .await?;

    if result.rows_affected() > 0 {
        tracing::info!(user_id, %alias, "provisioned account");
    }

    Ok(())
}

/// Mutations on archived forums fail loudly; reads stay open.
pub fn require_active(forum: &Forum) -> crate::ApiResult<()> {
    if forum.status == ForumStatus::Archived {
        return Err(crate::ApiError::validation("forum is archived"));
    }
    Ok(())
}
