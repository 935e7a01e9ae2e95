use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use studyhall::chat::gateway::{CandidateMessage, MessageGateway};
use studyhall::db;
use studyhall::ApiError;

// One connection so the whole test shares a single in-memory database.
async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_schema(&pool).await.unwrap();
    pool
}

async fn seed_forum(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query(
        "INSERT INTO forums (name,moderator_id,is_private,status,tags)
         VALUES (?,?,0,'active','[]')",
    )
    .bind(name)
    .bind("mod1")
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

fn candidate(id: i64, body: &str) -> CandidateMessage {
    CandidateMessage {
        id,
        body: body.to_owned(),
        attachments: vec![],
    }
}

#[tokio::test]
async fn ingest_is_idempotent_under_retry() {
    let pool = test_pool().await;
    let forum = seed_forum(&pool, "algorithms").await;
    let gateway = MessageGateway::new(pool);

    let batch = vec![candidate(1, "first"), candidate(2, "second")];

    let persisted = gateway.ingest_batch(forum, "alice", &batch).await.unwrap();
    assert_eq!(persisted.len(), 2);

    // the retried batch is all duplicates, which is a valid empty result
    let retried = gateway.ingest_batch(forum, "alice", &batch).await.unwrap();
    assert!(retried.is_empty());

    let history = gateway.history(forum).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn mixed_batch_adds_only_the_new_message() {
    let pool = test_pool().await;
    let forum = seed_forum(&pool, "algorithms").await;
    let gateway = MessageGateway::new(pool);

    gateway
        .ingest_batch(forum, "alice", &[candidate(1, "already here")])
        .await
        .unwrap();

    let persisted = gateway
        .ingest_batch(forum, "alice", &[candidate(1, "already here"), candidate(2, "new")])
        .await
        .unwrap();

    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].body, "new");
    assert_eq!(gateway.history(forum).await.unwrap().len(), 2);
}

#[tokio::test]
async fn duplicates_inside_one_batch_collapse() {
    let pool = test_pool().await;
    let forum = seed_forum(&pool, "algorithms").await;
    let gateway = MessageGateway::new(pool);

    let persisted = gateway
        .ingest_batch(forum, "alice", &[candidate(7, "once"), candidate(7, "twice")])
        .await
        .unwrap();

    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].body, "once");
}

#[tokio::test]
async fn provisional_ids_do_not_collide_across_authors() {
    let pool = test_pool().await;
    let forum = seed_forum(&pool, "algorithms").await;
    let gateway = MessageGateway::new(pool);

    let from_alice = gateway
        .ingest_batch(forum, "alice", &[candidate(1, "from alice")])
        .await
        .unwrap();
    let from_bob = gateway
        .ingest_batch(forum, "bob", &[candidate(1, "from bob")])
        .await
        .unwrap();

    assert_eq!(from_alice.len(), 1);
    assert_eq!(from_bob.len(), 1);
    assert_eq!(gateway.history(forum).await.unwrap().len(), 2);
}

#[tokio::test]
async fn store_assigns_final_ids_and_order() {
    let pool = test_pool().await;
    let forum = seed_forum(&pool, "algorithms").await;
    let gateway = MessageGateway::new(pool);

    let persisted = gateway
        .ingest_batch(
            forum,
            "alice",
            &[candidate(900, "a"), candidate(901, "b"), candidate(902, "c")],
        )
        .await
        .unwrap();

    // client ids are nonces, not identifiers
    assert!(persisted.iter().all(|m| m.id < 900));

    let history = gateway.history(forum).await.unwrap();
    let bodies: Vec<&str> = history.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["a", "b", "c"]);
    assert!(history.windows(2).all(|w| (w[0].created_at, w[0].id) < (w[1].created_at, w[1].id)));
}

#[tokio::test]
async fn live_append_assigns_id_and_timestamp() {
    let pool = test_pool().await;
    let forum = seed_forum(&pool, "algorithms").await;
    let gateway = MessageGateway::new(pool);

    let message = gateway.append(forum, "alice", "hi", &[]).await.unwrap();
    assert!(message.id > 0);
    assert!(message.created_at > 0);
    assert_eq!(message.forum_id, forum);

    let history = gateway.history(forum).await.unwrap();
    assert_eq!(history, vec![message]);
}

#[tokio::test]
async fn empty_batches_are_rejected() {
    let pool = test_pool().await;
    let forum = seed_forum(&pool, "algorithms").await;
    let gateway = MessageGateway::new(pool);

    assert!(matches!(
        gateway.ingest_batch(forum, "alice", &[]).await,
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        gateway.delete_batch(forum, &[]).await,
        Err(ApiError::Validation(_))
    ));
}

#[tokio::test]
async fn delete_ignores_unknown_ids_and_is_idempotent() {
    let pool = test_pool().await;
    let forum = seed_forum(&pool, "algorithms").await;
    let gateway = MessageGateway::new(pool);

    let message = gateway.append(forum, "alice", "hi", &[]).await.unwrap();

    // id 999 doesn't exist; no error, only the real row goes away
    let deleted = gateway.delete_batch(forum, &[message.id, 999]).await.unwrap();
    assert_eq!(deleted, vec![message.id]);
    assert!(gateway.history(forum).await.unwrap().is_empty());

    // same call again converges to the same state without error
    let deleted = gateway.delete_batch(forum, &[message.id, 999]).await.unwrap();
    assert!(deleted.is_empty());
}

#[tokio::test]
async fn delete_is_scoped_to_the_forum() {
    let pool = test_pool().await;
    let forum_a = seed_forum(&pool, "algorithms").await;
    let forum_b = seed_forum(&pool, "compilers").await;
    let gateway = MessageGateway::new(pool);

    let message = gateway.append(forum_a, "alice", "hi", &[]).await.unwrap();

    let deleted = gateway.delete_batch(forum_b, &[message.id]).await.unwrap();
    assert!(deleted.is_empty());
    assert_eq!(gateway.history(forum_a).await.unwrap().len(), 1);
}
