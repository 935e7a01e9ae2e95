//! Wire signals exchanged over the forum chat socket.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A persisted message. `id` and `created_at` are assigned by the store,
/// never by a client; `created_at` is unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub forum_id: i64,
    pub author_id: String,
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: i64,
}

/// Body of a `send_message` signal, before the store has seen it.
#[derive(Debug, Clone, Deserialize)]
pub struct OutgoingMessage {
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: i64 },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: i64 },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        room_id: i64,
        message: OutgoingMessage,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    ReceiveMessage { room_id: i64, message: Message },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_signals_parse() {
        let join: ClientEvent =
            serde_json::from_value(json!({ "event": "join_room", "roomId": 42 })).unwrap();
        assert!(matches!(join, ClientEvent::JoinRoom { room_id: 42 }));

        let leave: ClientEvent =
            serde_json::from_value(json!({ "event": "leave_room", "roomId": 7 })).unwrap();
        assert!(matches!(leave, ClientEvent::LeaveRoom { room_id: 7 }));

        let send: ClientEvent = serde_json::from_value(json!({
            "event": "send_message",
            "roomId": 42,
            "message": { "body": "hi", "attachments": [{ "url": "https://x/y.pdf" }] },
        }))
        .unwrap();
        let ClientEvent::SendMessage { room_id, message } = send else {
            panic!("wrong variant");
        };
        assert_eq!(room_id, 42);
        assert_eq!(message.body, "hi");
        assert_eq!(message.attachments.len(), 1);
    }

    #[test]
    fn unknown_signal_is_rejected() {
        assert!(
            serde_json::from_value::<ClientEvent>(json!({ "event": "shout", "roomId": 1 }))
                .is_err()
        );
    }

    #[test]
    fn receive_message_wire_shape() {
        let event = ServerEvent::ReceiveMessage {
            room_id: 42,
            message: Message {
                id: 5,
                forum_id: 42,
                author_id: "u1".into(),
                body: "hi".into(),
                attachments: vec![],
                created_at: 1_700_000_000_000,
            },
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "receive_message",
                "roomId": 42,
                "message": {
                    "id": 5,
                    "forumId": 42,
                    "authorId": "u1",
                    "body": "hi",
                    "attachments": [],
                    "createdAt": 1_700_000_000_000i64,
                },
            })
        );
    }
}
