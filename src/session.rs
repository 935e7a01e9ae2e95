use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::auth::{Principal, Role};
use crate::error::{ApiError, ApiResult};

pub const USER_ID: &str = "user_id";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";

/// Resolves the session to a known account. Anything else — no session, or
/// a session for an account that no longer exists — is `Unauthorized`.
pub async fn current_principal(db_pool: &SqlitePool, session: &Session) -> ApiResult<Principal> {
    let Some(user_id) = session.get::<String>(USER_ID).await? else {
        return Err(ApiError::Unauthorized);
    };

    let Some((alias, role)) = crate::db::load_account(db_pool, &user_id).await? else {
        return Err(ApiError::Unauthorized);
    };

    Ok(Principal {
        user_id,
        alias,
        role: Role::parse(&role),
    })
}
