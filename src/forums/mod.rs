mod forum;
mod msg;
mod new;
mod ws;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/forums", get(forum::list_forums).post(new::create_forum))
        .route("/forums/{id}", get(forum::get_forum))
        .route("/forums/{id}/archive", post(forum::archive_forum))
        .route("/messages", get(msg::history).post(msg::ingest).delete(msg::delete))
        .route("/ws", get(ws::chat_ws))
}
