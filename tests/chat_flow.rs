use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use studyhall::chat::broadcast::Broadcaster;
use studyhall::chat::events::ServerEvent;
use studyhall::chat::gateway::MessageGateway;
use studyhall::chat::registry::RoomRegistry;
use studyhall::db;
use tokio::sync::mpsc;
use uuid::Uuid;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_schema(&pool).await.unwrap();
    pool
}

async fn seed_forum_42(pool: &SqlitePool) {
    sqlx::query(
        "INSERT INTO forums (id,name,moderator_id,is_private,status,tags)
         VALUES (42,'study hall','mod1',0,'active','[]')",
    )
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn sent_message_reaches_members_and_the_log_exactly_once() {
    let pool = test_pool().await;
    seed_forum_42(&pool).await;

    let registry = Arc::new(RoomRegistry::new());
    let broadcaster = Broadcaster::new(registry.clone());
    let gateway = MessageGateway::new(pool);

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    registry.join(Uuid::now_v7(), 42, tx_a);
    registry.join(Uuid::now_v7(), 42, tx_b);

    let persisted = gateway.append(42, "alice", "hi", &[]).await.unwrap();
    broadcaster.publish(
        42,
        ServerEvent::ReceiveMessage {
            room_id: 42,
            message: persisted.clone(),
        },
    );

    for rx in [&mut rx_a, &mut rx_b] {
        let event = rx.try_recv().unwrap();
        let ServerEvent::ReceiveMessage { room_id, message } = &*event;
        assert_eq!(*room_id, 42);
        assert_eq!(message.body, "hi");
        assert!(rx.try_recv().is_err());
    }

    let history = gateway.history(42).await.unwrap();
    assert_eq!(history, vec![persisted]);
}

#[tokio::test]
async fn undelivered_broadcast_still_lands_in_history() {
    let pool = test_pool().await;
    seed_forum_42(&pool).await;

    let registry = Arc::new(RoomRegistry::new());
    let broadcaster = Broadcaster::new(registry.clone());
    let gateway = MessageGateway::new(pool);

    // the only member's socket died without a leave
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    registry.join(Uuid::now_v7(), 42, tx_b);
    drop(rx_b);

    let persisted = gateway.append(42, "alice", "hi", &[]).await.unwrap();
    let delivered = broadcaster.publish(
        42,
        ServerEvent::ReceiveMessage {
            room_id: 42,
            message: persisted,
        },
    );

    assert_eq!(delivered, 0);
    // the log is authoritative: the next history fetch catches the member up
    assert_eq!(gateway.history(42).await.unwrap().len(), 1);
}

#[tokio::test]
async fn disconnect_removes_the_connection_from_every_snapshot() {
    let registry = Arc::new(RoomRegistry::new());

    let a = Uuid::now_v7();
    let b = Uuid::now_v7();
    let (tx_a, _rx_a) = mpsc::unbounded_channel();
    let (tx_b, _rx_b) = mpsc::unbounded_channel();

    // a roamed between forums before its socket dropped
    registry.join(a, 1, tx_a.clone());
    registry.join(a, 2, tx_a);
    registry.join(b, 2, tx_b);

    registry.on_disconnect(a);

    for forum_id in [1, 2, 3] {
        assert!(registry
            .members_of(forum_id)
            .into_iter()
            .all(|(conn, _)| conn != a));
    }
    assert_eq!(registry.members_of(2).len(), 1);
}

#[tokio::test]
async fn switching_forums_stops_old_room_delivery() {
    let registry = Arc::new(RoomRegistry::new());
    let broadcaster = Broadcaster::new(registry.clone());

    let a = Uuid::now_v7();
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    registry.join(a, 1, tx_a.clone());
    registry.join(a, 2, tx_a);

    let event = |room_id| ServerEvent::ReceiveMessage {
        room_id,
        message: studyhall::chat::events::Message {
            id: 1,
            forum_id: room_id,
            author_id: "alice".into(),
            body: "hi".into(),
            attachments: vec![],
            created_at: 0,
        },
    };

    assert_eq!(broadcaster.publish(1, event(1)), 0);
    assert_eq!(broadcaster.publish(2, event(2)), 1);

    let received = rx_a.try_recv().unwrap();
    let ServerEvent::ReceiveMessage { room_id, .. } = &*received;
    assert_eq!(*room_id, 2);
}
