//! Donor offers and recipient requests.
//!
//! Both are a user's proposal addressed to an association, reviewed through
//! the same `pending → approved | rejected` status. They live in separate
//! tables; [`OfferKind`] selects which one a query runs against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    association::{AssociationCategory, AssociationSummary},
    user::{UserSummary, UserType},
};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "offer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl OfferStatus {
    /// A decision is final: only a pending proposal can be approved or rejected.
    pub fn can_transition_to(self, next: OfferStatus) -> bool {
        matches!(
            (self, next),
            (OfferStatus::Pending, OfferStatus::Approved | OfferStatus::Rejected)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferKind {
    /// A donor offering goods to an association.
    Donation,
    /// A recipient asking an association for help.
    Recipient,
}

impl OfferKind {
    fn table(self) -> &'static str {
        match self {
            OfferKind::Donation => "offers",
            OfferKind::Recipient => "recipient_offers",
        }
    }

    /// The only user type allowed to submit this kind.
    pub fn submitter_type(self) -> UserType {
        match self {
            OfferKind::Donation => UserType::Donor,
            OfferKind::Recipient => UserType::Recipient,
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            OfferKind::Donation => "offer",
            OfferKind::Recipient => "request",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Offer {
    pub id: Uuid,
    pub association_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An offer as the receiving association sees it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OfferWithUser {
    #[serde(flatten)]
    #[ts(flatten)]
    pub offer: Offer,
    pub user: Option<UserSummary>,
}

/// An offer as its submitter sees it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OfferWithAssociation {
    #[serde(flatten)]
    #[ts(flatten)]
    pub offer: Offer,
    pub association: Option<AssociationSummary>,
}

impl std::ops::Deref for OfferWithUser {
    type Target = Offer;
    fn deref(&self) -> &Self::Target {
        &self.offer
    }
}

impl std::ops::Deref for OfferWithAssociation {
    type Target = Offer;
    fn deref(&self) -> &Self::Target {
        &self.offer
    }
}

#[derive(Debug, Clone)]
pub struct CreateOffer {
    pub association_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(FromRow)]
struct OfferUserRow {
    #[sqlx(flatten)]
    offer: Offer,
    submitter_first_name: Option<String>,
    submitter_last_name: Option<String>,
    submitter_email: Option<String>,
    submitter_user_type: Option<UserType>,
}

#[derive(FromRow)]
struct OfferAssociationRow {
    #[sqlx(flatten)]
    offer: Offer,
    target_name: Option<String>,
    target_email: Option<String>,
    target_category: Option<AssociationCategory>,
    target_logo_url: Option<String>,
}

const OFFER_COLUMNS: &str =
    "o.id, o.association_id, o.user_id, o.title, o.description, o.status, o.created_at, o.updated_at";
const RETURNING_COLUMNS: &str =
    "id, association_id, user_id, title, description, status, created_at, updated_at";

impl Offer {
    /// New proposals always start out pending.
    pub async fn create(
        pool: &SqlitePool,
        kind: OfferKind,
        id: Uuid,
        data: &CreateOffer,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO {table} (id, association_id, user_id, title, description, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {RETURNING_COLUMNS}",
            table = kind.table()
        );
        sqlx::query_as::<_, Offer>(&sql)
            .bind(id)
            .bind(data.association_id)
            .bind(data.user_id)
            .bind(&data.title)
            .bind(&data.description)
            .bind(OfferStatus::Pending)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        kind: OfferKind,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS} FROM {table} o WHERE o.id = $1",
            table = kind.table()
        );
        sqlx::query_as::<_, Offer>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Proposals addressed to an association, each with its submitter.
    pub async fn find_for_association(
        pool: &SqlitePool,
        kind: OfferKind,
        association_id: Uuid,
    ) -> Result<Vec<OfferWithUser>, sqlx::Error> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS},
                    u.first_name AS submitter_first_name,
                    u.last_name  AS submitter_last_name,
                    u.email      AS submitter_email,
                    u.user_type  AS submitter_user_type
             FROM {table} o
             LEFT JOIN users u ON u.id = o.user_id
             WHERE o.association_id = $1
             ORDER BY o.created_at ASC, o.rowid ASC",
            table = kind.table()
        );
        let rows = sqlx::query_as::<_, OfferUserRow>(&sql)
            .bind(association_id)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let user = match (
                    row.submitter_first_name,
                    row.submitter_last_name,
                    row.submitter_email,
                    row.submitter_user_type,
                ) {
                    (Some(first_name), Some(last_name), Some(email), Some(user_type)) => {
                        Some(UserSummary {
                            id: row.offer.user_id,
                            first_name,
                            last_name,
                            email,
                            user_type,
                        })
                    }
                    _ => None,
                };
                OfferWithUser {
                    offer: row.offer,
                    user,
                }
            })
            .collect())
    }

    /// A user's own proposals, most recent first, each with its association.
    pub async fn find_for_user(
        pool: &SqlitePool,
        kind: OfferKind,
        user_id: Uuid,
    ) -> Result<Vec<OfferWithAssociation>, sqlx::Error> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS},
                    a.name     AS target_name,
                    a.email    AS target_email,
                    a.category AS target_category,
                    a.logo_url AS target_logo_url
             FROM {table} o
             LEFT JOIN associations a ON a.id = o.association_id
             WHERE o.user_id = $1
             ORDER BY o.created_at DESC, o.rowid DESC",
            table = kind.table()
        );
        let rows = sqlx::query_as::<_, OfferAssociationRow>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let association = match (row.target_name, row.target_email) {
                    (Some(name), Some(email)) => Some(AssociationSummary {
                        id: row.offer.association_id,
                        name,
                        email,
                        category: row.target_category,
                        logo_url: row.target_logo_url,
                    }),
                    _ => None,
                };
                OfferWithAssociation {
                    offer: row.offer,
                    association,
                }
            })
            .collect())
    }

    /// Moves a pending proposal of `association_id` to `status`.
    ///
    /// The update is conditional on the stored status still being pending, so
    /// two concurrent decisions cannot both succeed. Returns `None` when no row
    /// matched.
    pub async fn transition_status(
        pool: &SqlitePool,
        kind: OfferKind,
        id: Uuid,
        association_id: Uuid,
        status: OfferStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE {table}
             SET status = $3, updated_at = $4
             WHERE id = $1 AND association_id = $2 AND status = $5
             RETURNING {RETURNING_COLUMNS}",
            table = kind.table()
        );
        sqlx::query_as::<_, Offer>(&sql)
            .bind(id)
            .bind(association_id)
            .bind(status)
            .bind(Utc::now())
            .bind(OfferStatus::Pending)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            association::{Association, CreateAssociation},
            user::{CreateUser, User},
        },
    };

    async fn seed(db: &DBService) -> (User, Association) {
        let donor = User::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateUser {
                first_name: "Karim".to_string(),
                last_name: "Haddad".to_string(),
                email: "karim@example.org".to_string(),
                password_hash: "hash".to_string(),
                phone: None,
                address: None,
                user_type: UserType::Donor,
            },
        )
        .await
        .unwrap();
        let association = Association::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateAssociation {
                user_id: None,
                name: "Resto du Coeur".to_string(),
                email: "resto@example.org".to_string(),
                password_hash: "hash".to_string(),
                phone: None,
                address: None,
                description: None,
                category: Some(AssociationCategory::Food),
            },
        )
        .await
        .unwrap();
        (donor, association)
    }

    #[test]
    fn only_pending_can_be_decided() {
        assert!(OfferStatus::Pending.can_transition_to(OfferStatus::Approved));
        assert!(OfferStatus::Pending.can_transition_to(OfferStatus::Rejected));
        assert!(!OfferStatus::Pending.can_transition_to(OfferStatus::Pending));
        assert!(!OfferStatus::Approved.can_transition_to(OfferStatus::Rejected));
        assert!(!OfferStatus::Rejected.can_transition_to(OfferStatus::Approved));
    }

    #[tokio::test]
    async fn kinds_use_separate_tables() {
        let db = DBService::new_in_memory().await.unwrap();
        let (donor, association) = seed(&db).await;
        let data = CreateOffer {
            association_id: association.id,
            user_id: donor.id,
            title: "Winter coats".to_string(),
            description: Some("Ten coats, adult sizes".to_string()),
        };

        let offer = Offer::create(&db.pool, OfferKind::Donation, Uuid::new_v4(), &data)
            .await
            .unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);

        assert!(
            Offer::find_by_id(&db.pool, OfferKind::Recipient, offer.id)
                .await
                .unwrap()
                .is_none()
        );
        let listed = Offer::find_for_association(&db.pool, OfferKind::Donation, association.id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user.as_ref().unwrap().first_name, "Karim");

        let mine = Offer::find_for_user(&db.pool, OfferKind::Donation, donor.id)
            .await
            .unwrap();
        assert_eq!(mine[0].association.as_ref().unwrap().name, "Resto du Coeur");
    }

    #[tokio::test]
    async fn transition_applies_once() {
        let db = DBService::new_in_memory().await.unwrap();
        let (donor, association) = seed(&db).await;
        let offer = Offer::create(
            &db.pool,
            OfferKind::Donation,
            Uuid::new_v4(),
            &CreateOffer {
                association_id: association.id,
                user_id: donor.id,
                title: "Rice".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

        let approved = Offer::transition_status(
            &db.pool,
            OfferKind::Donation,
            offer.id,
            association.id,
            OfferStatus::Approved,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(approved.status, OfferStatus::Approved);

        let again = Offer::transition_status(
            &db.pool,
            OfferKind::Donation,
            offer.id,
            association.id,
            OfferStatus::Rejected,
        )
        .await
        .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn force_deleting_the_donor_cascades() {
        let db = DBService::new_in_memory().await.unwrap();
        let (donor, association) = seed(&db).await;
        Offer::create(
            &db.pool,
            OfferKind::Donation,
            Uuid::new_v4(),
            &CreateOffer {
                association_id: association.id,
                user_id: donor.id,
                title: "Blankets".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

        User::force_delete(&db.pool, donor.id).await.unwrap();
        let listed = Offer::find_for_association(&db.pool, OfferKind::Donation, association.id)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }
}
