//! Donor offers and recipient requests addressed to associations, and the
//! association's approve/reject decision on them.

use db::models::{
    association::Association,
    offer::{CreateOffer, Offer, OfferKind, OfferStatus, OfferWithAssociation, OfferWithUser},
    user::User,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::validation::ValidationErrors;
use uuid::Uuid;

use super::{
    auth::Principal,
    form::{non_blank, parse_choice},
};

#[derive(Debug, Error)]
pub enum DonationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidTransition(String),
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SubmitOffer {
    pub association_id: Option<Uuid>,
    /// Defaults to the caller.
    pub user_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateOfferStatus {
    pub status: Option<String>,
    /// Defaults to the calling association.
    pub association_id: Option<Uuid>,
}

pub struct DonationService {
    pool: SqlitePool,
}

impl DonationService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn submit(
        &self,
        kind: OfferKind,
        caller: &Principal,
        payload: SubmitOffer,
    ) -> Result<Offer, DonationError> {
        let mut errors = ValidationErrors::new();
        let user_id = payload
            .user_id
            .or_else(|| caller.as_user().map(|user| user.id));
        if payload.association_id.is_none() {
            errors.add("association_id", "The association id field is required.");
        }
        if user_id.is_none() {
            errors.add("user_id", "The user id field is required.");
        }
        let title = non_blank(payload.title);
        if errors.required("title", title.as_deref()) {
            errors.max_len("title", title.as_deref(), 255);
        }
        errors.into_result()?;

        let (Some(association_id), Some(user_id), Some(title)) =
            (payload.association_id, user_id, title)
        else {
            return Err(ValidationErrors::single("title", "The title field is required.").into());
        };

        if !caller.is_admin() && caller.as_user().map(|user| user.id) != Some(user_id) {
            return Err(DonationError::Forbidden(format!(
                "You can only submit a {} for yourself.",
                kind.noun()
            )));
        }

        if Association::find_by_id(&self.pool, association_id)
            .await?
            .is_none()
        {
            return Err(ValidationErrors::single(
                "association_id",
                "The selected association id is invalid.",
            )
            .into());
        }

        let submitter = User::find_by_id(&self.pool, user_id)
            .await?
            .filter(|user| user.user_type == kind.submitter_type())
            .ok_or_else(|| {
                ValidationErrors::single(
                    "user_id",
                    format!("Invalid {} user_id", kind.submitter_type()),
                )
            })?;

        let offer = Offer::create(
            &self.pool,
            kind,
            Uuid::new_v4(),
            &CreateOffer {
                association_id,
                user_id: submitter.id,
                title,
                description: non_blank(payload.description),
            },
        )
        .await?;

        info!(
            offer_id = %offer.id,
            kind = kind.noun(),
            association_id = %association_id,
            user_id = %submitter.id,
            "Proposal submitted"
        );
        Ok(offer)
    }

    /// Proposals an association received. Visible to the association, its
    /// owning user and admins.
    pub async fn list_for_association(
        &self,
        kind: OfferKind,
        caller: &Principal,
        association_id: Uuid,
    ) -> Result<Vec<OfferWithUser>, DonationError> {
        let association = Association::find_by_id(&self.pool, association_id)
            .await?
            .ok_or_else(|| DonationError::NotFound("Association not found".to_string()))?;
        if !caller.can_manage_association(&association) {
            return Err(DonationError::Forbidden(format!(
                "Only the association can view its {}s.",
                kind.noun()
            )));
        }
        Ok(Offer::find_for_association(&self.pool, kind, association.id).await?)
    }

    /// The caller's own proposals; only the submitting user type has any.
    pub async fn list_mine(
        &self,
        kind: OfferKind,
        caller: &Principal,
    ) -> Result<Vec<OfferWithAssociation>, DonationError> {
        let required = kind.submitter_type();
        let Some(user) = caller.as_user().filter(|user| user.user_type == required) else {
            return Err(DonationError::Forbidden(format!(
                "Only {}s can view their {}s",
                required,
                kind.noun()
            )));
        };
        Ok(Offer::find_for_user(&self.pool, kind, user.id).await?)
    }

    pub async fn list_for_user(
        &self,
        kind: OfferKind,
        caller: &Principal,
        user_id: Uuid,
    ) -> Result<Vec<OfferWithAssociation>, DonationError> {
        if !caller.can_manage_user(user_id) {
            return Err(DonationError::Forbidden("Unauthorized action.".to_string()));
        }
        if User::find_by_id(&self.pool, user_id).await?.is_none() {
            return Err(DonationError::NotFound("User not found".to_string()));
        }
        Ok(Offer::find_for_user(&self.pool, kind, user_id).await?)
    }

    pub async fn update_status(
        &self,
        kind: OfferKind,
        caller: &Principal,
        id: Uuid,
        payload: UpdateOfferStatus,
    ) -> Result<Offer, DonationError> {
        let mut errors = ValidationErrors::new();
        let status = if errors.required("status", payload.status.as_deref()) {
            parse_choice::<OfferStatus>(&mut errors, "status", payload.status.as_deref())
                .filter(|status| *status != OfferStatus::Pending)
        } else {
            None
        };
        if payload.status.is_some() && status.is_none() && !errors.has("status") {
            errors.add("status", "The selected status is invalid.");
        }
        let association_id = payload
            .association_id
            .or_else(|| caller.as_association().map(|association| association.id));
        if association_id.is_none() {
            errors.add("association_id", "The association id field is required.");
        }
        errors.into_result()?;

        let (Some(status), Some(association_id)) = (status, association_id) else {
            return Err(ValidationErrors::single("status", "The status field is required.").into());
        };

        let association = Association::find_by_id(&self.pool, association_id)
            .await?
            .ok_or_else(|| {
                ValidationErrors::single("association_id", "The selected association id is invalid.")
            })?;
        if !caller.can_manage_association(&association) {
            return Err(DonationError::Forbidden(format!(
                "Only the association can decide on this {}.",
                kind.noun()
            )));
        }

        let not_found = || DonationError::NotFound("Offer not found or not authorized".to_string());
        let current = Offer::find_by_id(&self.pool, kind, id)
            .await?
            .filter(|offer| offer.association_id == association.id)
            .ok_or_else(not_found)?;
        if !current.status.can_transition_to(status) {
            return Err(DonationError::InvalidTransition(
                "Offer status can only be changed from pending".to_string(),
            ));
        }

        // A concurrent decision may have landed since the read above.
        let updated = Offer::transition_status(&self.pool, kind, id, association.id, status)
            .await?
            .ok_or_else(|| {
                DonationError::InvalidTransition(
                    "Offer status can only be changed from pending".to_string(),
                )
            })?;

        info!(
            offer_id = %updated.id,
            kind = kind.noun(),
            status = %updated.status,
            "Proposal status changed"
        );
        Ok(updated)
    }
}
