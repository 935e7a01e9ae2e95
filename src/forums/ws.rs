//! The persistent chat connection.
//!
//! One socket per client. The client joins a forum, may send into it, and is
//! dropped from the registry when the socket goes away for any reason. A
//! reconnecting client is a brand-new connection: it re-joins and re-fetches
//! history over HTTP.

use std::sync::Arc;

use axum::{debug_handler, extract::{ws::{Message as WsMessage, WebSocket, WebSocketUpgrade}, State}, response::Response};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tower_sessions::Session;
use uuid::Uuid;

use crate::auth::{self, Action, Principal};
use crate::chat::broadcast::Broadcaster;
use crate::chat::events::{ClientEvent, OutgoingMessage, ServerEvent};
use crate::chat::gateway::MessageGateway;
use crate::chat::registry::{ConnId, DeliverySender, RoomRegistry};
use crate::db;
use crate::{session, ApiError, ApiResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_ws(
    State(db_pool): State<SqlitePool>,
    State(registry): State<Arc<RoomRegistry>>,
    State(broadcaster): State<Broadcaster>,
    State(gateway): State<MessageGateway>,
    session: Session,

    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let principal = session::current_principal(&db_pool, &session).await?;

    Ok(ws.on_upgrade(async move |stream| {
        let conn = Connection {
            id: Uuid::now_v7(),
            principal,
            db_pool,
            registry,
            broadcaster,
            gateway,
        };
        conn.run(stream).await;
    }))
}

struct Connection {
    id: ConnId,
    principal: Principal,
    db_pool: SqlitePool,
    registry: Arc<RoomRegistry>,
    broadcaster: Broadcaster,
    gateway: MessageGateway,
}

impl Connection {
    async fn run(self, stream: WebSocket) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<ServerEvent>>();
        let (mut sender, mut receiver) = stream.split();

        // Forwards fanned-out events to the socket so a stalled peer only
        // ever stalls its own queue.
        let delivery_task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Ok(text) = serde_json::to_string(&*event) else {
                    continue;
                };
                if sender.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        while let Some(Ok(frame)) = receiver.next().await {
            let Ok(event) = serde_json::from_slice::<ClientEvent>(&frame.into_data()) else {
                continue;
            };

            if let Err(err) = self.handle(event, &tx).await {
                tracing::warn!(
                    conn = %self.id,
                    user = %self.principal.user_id,
                    %err,
                    "dropped chat signal"
                );
            }
        }

        self.registry.on_disconnect(self.id);
        delivery_task.abort();
        tracing::debug!(conn = %self.id, "connection closed");
    }

    async fn handle(&self, event: ClientEvent, tx: &DeliverySender) -> ApiResult<()> {
        match event {
            ClientEvent::JoinRoom { room_id } => {
                let forum = self.checked_forum(room_id, Action::JoinForum).await?;
                auth::require_active(&forum)?;
                self.registry.join(self.id, room_id, tx.clone());
            }
            ClientEvent::LeaveRoom { room_id } => {
                self.registry.leave(self.id, room_id);
            }
            ClientEvent::SendMessage { room_id, message } => {
                self.send_message(room_id, message).await?;
            }
        }
        Ok(())
    }

    async fn send_message(&self, room_id: i64, message: OutgoingMessage) -> ApiResult<()> {
        if self.registry.joined_forum(self.id) != Some(room_id) {
            return Err(ApiError::validation("not joined to this forum"));
        }
        if message.body.trim().is_empty() {
            return Err(ApiError::validation("empty message body"));
        }

        let forum = self.checked_forum(room_id, Action::SendMessage).await?;
        auth::require_active(&forum)?;

        // The log is authoritative; the broadcast is only the low-latency
        // copy. Members missed here catch up from history.
        let persisted = self
            .gateway
            .append(room_id, &self.principal.user_id, &message.body, &message.attachments)
            .await?;

        self.broadcaster.publish(
            room_id,
            ServerEvent::ReceiveMessage {
                room_id,
                message: persisted,
            },
        );

        Ok(())
    }

    async fn checked_forum(&self, forum_id: i64, action: Action) -> ApiResult<db::Forum> {
        let Some(forum) = db::load_forum(&self.db_pool, forum_id).await? else {
            return Err(ApiError::validation("unknown forum"));
        };
        if !auth::authorize(&self.principal, action, Some(&forum)) {
            return Err(ApiError::Unauthorized);
        }
        Ok(forum)
    }
}
