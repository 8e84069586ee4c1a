use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "association_category")]
pub enum AssociationCategory {
    Food,
    Clothes,
    Healthcare,
    Education,
    #[sqlx(rename = "Home supplies")]
    #[serde(rename = "Home supplies")]
    #[strum(serialize = "Home supplies")]
    HomeSupplies,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Association {
    pub id: Uuid,
    pub user_id: Option<Uuid>, // Owning user, set when an admin creates the association
    pub name: String,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub category: Option<AssociationCategory>,
    pub logo_url: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct AssociationSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub category: Option<AssociationCategory>,
    pub logo_url: Option<String>,
}

/// Query parameters for the association directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct AssociationFilter {
    pub category: Option<AssociationCategory>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateAssociation {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub category: Option<AssociationCategory>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateAssociation {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub category: Option<AssociationCategory>,
}

const ASSOCIATION_COLUMNS: &str = "id, user_id, name, email, password_hash, phone, address, description, category, logo_url, deleted_at, created_at, updated_at";

impl Association {
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn summary(&self) -> AssociationSummary {
        AssociationSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            category: self.category,
            logo_url: self.logo_url.clone(),
        }
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateAssociation,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "INSERT INTO associations (id, user_id, name, email, password_hash, phone, address, description, category, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
             RETURNING {ASSOCIATION_COLUMNS}"
        );
        sqlx::query_as::<_, Association>(&sql)
            .bind(id)
            .bind(data.user_id)
            .bind(&data.name)
            .bind(&data.email)
            .bind(&data.password_hash)
            .bind(&data.phone)
            .bind(&data.address)
            .bind(&data.description)
            .bind(data.category)
            .bind(Utc::now())
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, Association>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id_with_trashed(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE id = $1");
        sqlx::query_as::<_, Association>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE email = $1 COLLATE NOCASE AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, Association>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// The live association owned by `user_id`, if any.
    pub async fn find_by_owner(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM associations
             WHERE user_id = $1 AND deleted_at IS NULL
             ORDER BY created_at ASC
             LIMIT 1"
        );
        sqlx::query_as::<_, Association>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn email_taken(
        pool: &SqlitePool,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM associations WHERE email = $1 COLLATE NOCASE AND ($2 IS NULL OR id != $2)",
        )
        .bind(email)
        .bind(except)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn find_all(
        pool: &SqlitePool,
        filter: &AssociationFilter,
        include_trashed: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));
        let sql = format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM associations
             WHERE ($1 IS NULL OR category = $1)
               AND ($2 IS NULL OR name LIKE $2 ESCAPE '\\' OR description LIKE $2 ESCAPE '\\')
               AND ($3 OR deleted_at IS NULL)
             ORDER BY name COLLATE NOCASE ASC"
        );
        sqlx::query_as::<_, Association>(&sql)
            .bind(filter.category)
            .bind(pattern)
            .bind(include_trashed)
            .fetch_all(pool)
            .await
    }

    pub async fn find_trashed(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM associations WHERE deleted_at IS NOT NULL ORDER BY deleted_at DESC"
        );
        sqlx::query_as::<_, Association>(&sql).fetch_all(pool).await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateAssociation,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "UPDATE associations
             SET name          = COALESCE($2, name),
                 email         = COALESCE($3, email),
                 password_hash = COALESCE($4, password_hash),
                 phone         = COALESCE($5, phone),
                 address       = COALESCE($6, address),
                 description   = COALESCE($7, description),
                 category      = COALESCE($8, category),
                 updated_at    = $9
             WHERE id = $1
             RETURNING {ASSOCIATION_COLUMNS}"
        );
        sqlx::query_as::<_, Association>(&sql)
            .bind(id)
            .bind(&data.name)
            .bind(&data.email)
            .bind(&data.password_hash)
            .bind(&data.phone)
            .bind(&data.address)
            .bind(&data.description)
            .bind(data.category)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn set_logo_url<'e, E>(
        executor: E,
        id: Uuid,
        logo_url: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "UPDATE associations SET logo_url = $2, updated_at = $3 WHERE id = $1 RETURNING {ASSOCIATION_COLUMNS}"
        );
        sqlx::query_as::<_, Association>(&sql)
            .bind(id)
            .bind(logo_url)
            .bind(Utc::now())
            .fetch_one(executor)
            .await
    }

    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE associations SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn restore(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE associations SET deleted_at = NULL, updated_at = $2 WHERE id = $1 AND deleted_at IS NOT NULL")
                .bind(id)
                .bind(Utc::now())
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn force_delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM associations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Makes `%` and `_` in user input match literally under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::DBService;

    fn association(name: &str, email: &str, category: AssociationCategory) -> CreateAssociation {
        CreateAssociation {
            user_id: None,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            phone: None,
            address: None,
            description: Some(format!("{} helps families", name)),
            category: Some(category),
        }
    }

    #[test]
    fn home_supplies_keeps_its_space() {
        assert_eq!(
            AssociationCategory::from_str("Home supplies").unwrap(),
            AssociationCategory::HomeSupplies
        );
        assert_eq!(AssociationCategory::HomeSupplies.to_string(), "Home supplies");
        assert_eq!(
            serde_json::to_value(AssociationCategory::HomeSupplies).unwrap(),
            "Home supplies"
        );
        assert!(AssociationCategory::from_str("Toys").is_err());
    }

    #[tokio::test]
    async fn directory_filters_by_category_and_search() {
        let db = DBService::new_in_memory().await.unwrap();
        Association::create(
            &db.pool,
            Uuid::new_v4(),
            &association("Banque Alimentaire", "ba@example.org", AssociationCategory::Food),
        )
        .await
        .unwrap();
        Association::create(
            &db.pool,
            Uuid::new_v4(),
            &association("Secours Textile", "st@example.org", AssociationCategory::Clothes),
        )
        .await
        .unwrap();
        let home = Association::create(
            &db.pool,
            Uuid::new_v4(),
            &association("Maison Pour Tous", "mpt@example.org", AssociationCategory::HomeSupplies),
        )
        .await
        .unwrap();

        let food = Association::find_all(
            &db.pool,
            &AssociationFilter {
                category: Some(AssociationCategory::Food),
                search: None,
            },
            false,
        )
        .await
        .unwrap();
        assert_eq!(food.len(), 1);
        assert_eq!(food[0].name, "Banque Alimentaire");

        let search = Association::find_all(
            &db.pool,
            &AssociationFilter {
                category: None,
                search: Some("textile".to_string()),
            },
            false,
        )
        .await
        .unwrap();
        assert_eq!(search.len(), 1);

        Association::soft_delete(&db.pool, home.id).await.unwrap();
        let live = Association::find_all(&db.pool, &AssociationFilter::default(), false)
            .await
            .unwrap();
        assert_eq!(live.len(), 2);
        let all = Association::find_all(&db.pool, &AssociationFilter::default(), true)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        let stored = all.iter().find(|a| a.id == home.id).unwrap();
        assert_eq!(stored.category, Some(AssociationCategory::HomeSupplies));

        // Wildcards typed into the search box match literally.
        let search = |term: &str| AssociationFilter {
            category: None,
            search: Some(term.to_string()),
        };
        for term in ["%", "_", "B_nque", "Secours%Textile"] {
            let found = Association::find_all(&db.pool, &search(term), false)
                .await
                .unwrap();
            assert!(found.is_empty(), "{term:?} matched {} rows", found.len());
        }
        Association::create(
            &db.pool,
            Uuid::new_v4(),
            &association("100% Solidaire", "cent@example.org", AssociationCategory::Food),
        )
        .await
        .unwrap();
        let percent = Association::find_all(&db.pool, &search("100%"), false)
            .await
            .unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].name, "100% Solidaire");
    }

    #[tokio::test]
    async fn logo_url_can_be_set_and_cleared() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = Association::create(
            &db.pool,
            Uuid::new_v4(),
            &association("Banque Alimentaire", "ba@example.org", AssociationCategory::Food),
        )
        .await
        .unwrap();

        let with_logo = Association::set_logo_url(
            &db.pool,
            created.id,
            Some("/storage/associations/logos/a.png"),
        )
        .await
        .unwrap();
        assert_eq!(
            with_logo.logo_url.as_deref(),
            Some("/storage/associations/logos/a.png")
        );

        let cleared = Association::set_logo_url(&db.pool, created.id, None)
            .await
            .unwrap();
        assert!(cleared.logo_url.is_none());
    }
}
