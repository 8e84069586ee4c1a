use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Which table a message endpoint (or token owner) id refers to.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "party_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PartyType {
    User,
    Association,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Party {
    pub id: Uuid,
    pub kind: PartyType,
}

impl Party {
    pub fn user(id: Uuid) -> Self {
        Self {
            id,
            kind: PartyType::User,
        }
    }

    pub fn association(id: Uuid) -> Self {
        Self {
            id,
            kind: PartyType::Association,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_type: PartyType,
    pub receiver_id: Uuid,
    pub receiver_type: PartyType,
    pub message_content: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub sender: Party,
    pub receiver: Party,
    pub message_content: String,
}

const MESSAGE_COLUMNS: &str =
    "id, sender_id, sender_type, receiver_id, receiver_type, message_content, sent_at, read_at";

impl Message {
    pub fn sender(&self) -> Party {
        Party {
            id: self.sender_id,
            kind: self.sender_type,
        }
    }

    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateMessage,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO messages (id, sender_id, sender_type, receiver_id, receiver_type, message_content, sent_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {MESSAGE_COLUMNS}"
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .bind(data.sender.id)
            .bind(data.sender.kind)
            .bind(data.receiver.id)
            .bind(data.receiver.kind)
            .bind(&data.message_content)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    /// Both directions of the thread between a user and an association, oldest first.
    pub async fn find_conversation(
        pool: &SqlitePool,
        user_id: Uuid,
        association_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = $1 AND sender_type = 'user'
                    AND receiver_id = $2 AND receiver_type = 'association')
                OR (sender_id = $2 AND sender_type = 'association'
                    AND receiver_id = $1 AND receiver_type = 'user')
             ORDER BY sent_at ASC, rowid ASC"
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(user_id)
            .bind(association_id)
            .fetch_all(pool)
            .await
    }

    /// Inbox of `receiver`, newest first.
    pub async fn find_received(pool: &SqlitePool, receiver: Party) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE receiver_id = $1 AND receiver_type = $2
             ORDER BY sent_at DESC, rowid DESC"
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(receiver.id)
            .bind(receiver.kind)
            .fetch_all(pool)
            .await
    }

    /// Marks every unread message from `sender_id` to `receiver` as read.
    pub async fn mark_read(
        pool: &SqlitePool,
        receiver: Party,
        sender_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE messages SET read_at = $4
             WHERE receiver_id = $1 AND receiver_type = $2 AND sender_id = $3 AND read_at IS NULL",
        )
        .bind(receiver.id)
        .bind(receiver.kind)
        .bind(sender_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_party<'e, E>(executor: E, party: Party) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "DELETE FROM messages
             WHERE (sender_id = $1 AND sender_type = $2)
                OR (receiver_id = $1 AND receiver_type = $2)",
        )
        .bind(party.id)
        .bind(party.kind)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
