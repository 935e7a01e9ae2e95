//! Sole writer to the durable message log.
//!
//! Clients resubmit whole batches after a dropped acknowledgment, so the
//! ingest path filters candidates against what is already persisted before
//! appending. The dedup key is `(author, provisional id)` scoped to the
//! forum: two independent clients reusing the same provisional id can never
//! shadow each other. Final ids and timestamps are assigned here, never
//! taken from the client.

use std::collections::HashSet;

use serde::Deserialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::error::{ApiError, ApiResult};

use super::events::{Attachment, Message};

/// A client-submitted message. `id` is the client's provisional identifier
/// and only ever serves as the dedup nonce.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMessage {
    pub id: i64,
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Clone)]
pub struct MessageGateway {
    pool: SqlitePool,
}

impl MessageGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists one live message and returns it with its store id and
    /// timestamp.
    pub async fn append(
        &self,
        forum_id: i64,
        author_id: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> ApiResult<Message> {
        let created_at = now_millis();
        let result = sqlx::query(
            "INSERT INTO messages (forum_id,author_id,client_nonce,body,attachments,created_at)
             VALUES (?,?,NULL,?,?,?)",
        )
        .bind(forum_id)
        .bind(author_id)
        .bind(body)
        .bind(attachments_column(attachments)?)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id: result.last_insert_rowid(),
            forum_id,
            author_id: author_id.to_owned(),
            body: body.to_owned(),
            attachments: attachments.to_vec(),
            created_at,
        })
    }

    /// Appends the candidates that are not already persisted and returns the
    /// newly persisted messages. An empty result means every candidate was a
    /// duplicate, which is not an error. The filtered batch is written in a
    /// single transaction, so a retried call either sees its rows or can
    /// reapply safely.
    pub async fn ingest_batch(
        &self,
        forum_id: i64,
        author_id: &str,
        candidates: &[CandidateMessage],
    ) -> ApiResult<Vec<Message>> {
        if candidates.is_empty() {
            return Err(ApiError::validation("empty message batch"));
        }

        let mut tx = self.pool.begin().await?;

        let known_rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT client_nonce FROM messages
             WHERE forum_id=? AND author_id=? AND client_nonce IS NOT NULL",
        )
        .bind(forum_id)
        .bind(author_id)
        .fetch_all(&mut *tx)
        .await?;
        let mut known: HashSet<i64> = known_rows.into_iter().map(|(nonce,)| nonce).collect();

        let created_at = now_millis();
        let mut persisted = Vec::new();
        for candidate in candidates {
            // also collapses duplicates within the batch itself
            if !known.insert(candidate.id) {
                continue;
            }

            let result = sqlx::query(
                "INSERT INTO messages (forum_id,author_id,client_nonce,body,attachments,created_at)
                 VALUES (?,?,?,?,?,?)",
            )
            .bind(forum_id)
            .bind(author_id)
            .bind(candidate.id)
            .bind(&candidate.body)
            .bind(attachments_column(&candidate.attachments)?)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            persisted.push(Message {
                id: result.last_insert_rowid(),
                forum_id,
                author_id: author_id.to_owned(),
                body: candidate.body.clone(),
                attachments: candidate.attachments.clone(),
                created_at,
            });
        }

        tx.commit().await?;

        tracing::debug!(
            forum_id,
            submitted = candidates.len(),
            persisted = persisted.len(),
            "ingested message batch"
        );

        Ok(persisted)
    }

    /// Deletes the intersection of `message_ids` with the rows actually in
    /// the forum; ids that don't exist are silently ignored, which keeps the
    /// call idempotent under retries. Returns the ids that were removed.
    pub async fn delete_batch(&self, forum_id: i64, message_ids: &[i64]) -> ApiResult<Vec<i64>> {
        if message_ids.is_empty() {
            return Err(ApiError::validation("empty id batch"));
        }

        let mut tx = self.pool.begin().await?;

        let mut deleted = Vec::new();
        for id in message_ids {
            let result = sqlx::query("DELETE FROM messages WHERE forum_id=? AND id=?")
                .bind(forum_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() > 0 {
                deleted.push(*id);
            }
        }

        tx.commit().await?;
        Ok(deleted)
    }

    /// The forum's full log, totally ordered by creation time with ties
    /// broken by id. Authoritative over anything delivered live.
    pub async fn history(&self, forum_id: i64) -> ApiResult<Vec<Message>> {
        let rows: Vec<(i64, String, String, Option<String>, i64)> = sqlx::query_as(
            "SELECT id,author_id,body,attachments,created_at FROM messages
             WHERE forum_id=? ORDER BY created_at,id",
        )
        .bind(forum_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, author_id, body, attachments, created_at)| Message {
                id,
                forum_id,
                author_id,
                body,
                attachments: attachments
                    .as_deref()
                    .and_then(|json| serde_json::from_str(json).ok())
                    .unwrap_or_default(),
                created_at,
            })
            .collect())
    }
}

fn attachments_column(attachments: &[Attachment]) -> ApiResult<Option<String>> {
    if attachments.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(attachments)?))
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
