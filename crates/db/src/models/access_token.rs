use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

use super::message::{Party, PartyType};

/// Bearer token issued at login. Only the SHA-256 digest of the token is stored.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessToken {
    pub id: Uuid,
    pub owner_type: PartyType,
    pub owner_id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub token_hash: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const TOKEN_COLUMNS: &str = "id, owner_type, owner_id, name, token_hash, last_used_at, created_at";

impl AccessToken {
    pub fn owner(&self) -> Party {
        Party {
            id: self.owner_id,
            kind: self.owner_type,
        }
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        owner: Party,
        name: &str,
        token_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO access_tokens (id, owner_type, owner_id, name, token_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {TOKEN_COLUMNS}"
        );
        sqlx::query_as::<_, AccessToken>(&sql)
            .bind(id)
            .bind(owner.kind)
            .bind(owner.id)
            .bind(name)
            .bind(token_hash)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    /// Looks a token up by digest and records the use.
    pub async fn find_by_hash(
        pool: &SqlitePool,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE access_tokens SET last_used_at = $2 WHERE token_hash = $1 RETURNING {TOKEN_COLUMNS}"
        );
        sqlx::query_as::<_, AccessToken>(&sql)
            .bind(token_hash)
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_owner<'e, E>(executor: E, owner: Party) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM access_tokens WHERE owner_id = $1 AND owner_type = $2")
            .bind(owner.id)
            .bind(owner.kind)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn lookup_touches_last_used_and_revocation_removes() {
        let db = DBService::new_in_memory().await.unwrap();
        let owner = Party::association(Uuid::new_v4());
        let created = AccessToken::create(&db.pool, Uuid::new_v4(), owner, "auth_token", "abc123")
            .await
            .unwrap();
        assert!(created.last_used_at.is_none());

        let found = AccessToken::find_by_hash(&db.pool, "abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.owner(), owner);
        assert!(found.last_used_at.is_some());

        AccessToken::create(&db.pool, Uuid::new_v4(), owner, "second", "def456")
            .await
            .unwrap();
        assert_eq!(AccessToken::delete_for_owner(&db.pool, owner).await.unwrap(), 2);
        assert!(
            AccessToken::find_by_hash(&db.pool, "abc123")
                .await
                .unwrap()
                .is_none()
        );
    }
}
