use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "user_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserType {
    Donor,
    Recipient,
    Admin,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub user_type: UserType,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user embedded in offers, conversations and inboxes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub user_type: UserType,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub user_type: Option<UserType>,
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, phone, address, user_type, deleted_at, created_at, updated_at";

impl User {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            user_type: self.user_type,
        }
    }

    pub async fn create(pool: &SqlitePool, id: Uuid, data: &CreateUser) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, phone, address, user_type, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&data.first_name)
            .bind(&data.last_name)
            .bind(&data.email)
            .bind(&data.password_hash)
            .bind(&data.phone)
            .bind(&data.address)
            .bind(data.user_type)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Live (not soft-deleted) user by id.
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id_with_trashed(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 COLLATE NOCASE AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Whether `email` belongs to any user other than `except`, trashed rows included.
    pub async fn email_taken(
        pool: &SqlitePool,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE email = $1 COLLATE NOCASE AND ($2 IS NULL OR id != $2)",
        )
        .bind(email)
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY created_at ASC, rowid ASC"
        );
        sqlx::query_as::<_, User>(&sql).fetch_all(pool).await
    }

    pub async fn find_trashed(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NOT NULL ORDER BY deleted_at DESC"
        );
        sqlx::query_as::<_, User>(&sql).fetch_all(pool).await
    }

    pub async fn update(pool: &SqlitePool, id: Uuid, data: &UpdateUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "UPDATE users
             SET first_name    = COALESCE($2, first_name),
                 last_name     = COALESCE($3, last_name),
                 email         = COALESCE($4, email),
                 password_hash = COALESCE($5, password_hash),
                 phone         = COALESCE($6, phone),
                 address       = COALESCE($7, address),
                 user_type     = COALESCE($8, user_type),
                 updated_at    = $9
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&data.first_name)
            .bind(&data.last_name)
            .bind(&data.email)
            .bind(&data.password_hash)
            .bind(&data.phone)
            .bind(&data.address)
            .bind(data.user_type)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result =
            sqlx::query("UPDATE users SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .bind(Utc::now())
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn restore(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET deleted_at = NULL, updated_at = $2 WHERE id = $1 AND deleted_at IS NOT NULL")
            .bind(id)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Permanent removal; offers and requests cascade.
    pub async fn force_delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
