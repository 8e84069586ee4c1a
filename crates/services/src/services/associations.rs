//! Associations: self-registration, the admin directory and logo handling.

use db::models::{
    access_token::AccessToken,
    association::{
        Association, AssociationCategory, AssociationFilter, CreateAssociation, UpdateAssociation,
    },
    message::{Message, Party},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::validation::ValidationErrors;
use uuid::Uuid;

use super::{
    auth::{AuthError, MIN_PASSWORD_LEN, Principal, hash_password},
    form::{non_blank, parse_choice},
    logo_storage::{LogoStorage, LogoStorageError, LogoUpload},
};

#[derive(Debug, Error)]
pub enum AssociationServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] LogoStorageError),
    #[error("Association not found")]
    NotFound,
    #[error("{0}")]
    Forbidden(&'static str),
}

/// Fields accepted by the register, create and update forms. Every field is
/// optional at this level; each operation decides what is required.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct AssociationFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

struct ValidFields {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    description: Option<String>,
    category: Option<AssociationCategory>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Register,
    AdminCreate,
    Update(Uuid),
}

pub struct AssociationService {
    pool: SqlitePool,
    storage: LogoStorage,
}

impl AssociationService {
    pub fn new(pool: SqlitePool, storage: LogoStorage) -> Self {
        Self { pool, storage }
    }

    async fn validate(
        &self,
        fields: AssociationFields,
        logo: Option<&LogoUpload>,
        mode: Mode,
    ) -> Result<ValidFields, AssociationServiceError> {
        let mut errors = ValidationErrors::new();
        let creating = !matches!(mode, Mode::Update(_));

        let name = non_blank(fields.name);
        let email = non_blank(fields.email);
        let password = fields.password.filter(|p| !p.is_empty());
        if creating {
            errors.required("name", name.as_deref());
            errors.required("email", email.as_deref());
            errors.required("password", password.as_deref());
        }
        errors.max_len("name", name.as_deref(), 255);
        errors.email("email", email.as_deref());
        errors.max_len("email", email.as_deref(), 255);
        errors.min_len("password", password.as_deref(), MIN_PASSWORD_LEN);
        if mode != Mode::Register {
            errors.confirmed(
                "password",
                password.as_deref(),
                fields.password_confirmation.as_deref(),
            );
        }
        let phone = non_blank(fields.phone);
        errors.max_len("phone", phone.as_deref(), 20);
        let address = non_blank(fields.address);
        errors.max_len("address", address.as_deref(), 255);
        let category = non_blank(fields.category);
        let category =
            parse_choice::<AssociationCategory>(&mut errors, "category", category.as_deref());

        if let Some(upload) = logo {
            if let Err(logo_errors) = self.storage.validate(upload) {
                for (field, messages) in logo_errors.errors {
                    for message in messages {
                        errors.add(&field, message);
                    }
                }
            }
        }

        if let Some(email) = email.as_deref().filter(|_| !errors.has("email")) {
            let except = match mode {
                Mode::Update(id) => Some(id),
                _ => None,
            };
            if Association::email_taken(&self.pool, email, except).await? {
                errors.add("email", "The email has already been taken.");
            }
        }
        errors.into_result()?;

        Ok(ValidFields {
            name,
            email,
            password,
            phone,
            address,
            description: non_blank(fields.description),
            category,
        })
    }

    /// Writes the logo before the row so a failed write leaves nothing behind;
    /// the file is removed again if the row cannot be created.
    async fn insert(
        &self,
        valid: ValidFields,
        owner: Option<Uuid>,
        logo: Option<&LogoUpload>,
    ) -> Result<Association, AssociationServiceError> {
        let password_hash = hash_password(valid.password.as_deref().unwrap_or_default())?;
        let logo_url = match logo {
            Some(upload) => Some(self.storage.store(upload).await?),
            None => None,
        };

        let created = async {
            let mut tx = self.pool.begin().await?;
            let association = Association::create(
                &mut *tx,
                Uuid::new_v4(),
                &CreateAssociation {
                    user_id: owner,
                    name: valid.name.unwrap_or_default(),
                    email: valid.email.unwrap_or_default(),
                    password_hash,
                    phone: valid.phone,
                    address: valid.address,
                    description: valid.description,
                    category: valid.category,
                },
            )
            .await?;
            let association = match logo_url.as_deref() {
                Some(url) => {
                    Association::set_logo_url(&mut *tx, association.id, Some(url)).await?
                }
                None => association,
            };
            tx.commit().await?;
            Ok::<_, sqlx::Error>(association)
        }
        .await;

        match created {
            Ok(association) => Ok(association),
            Err(e) => {
                if let Some(url) = logo_url.as_deref() {
                    self.remove_logo(url).await;
                }
                Err(e.into())
            }
        }
    }

    /// Public sign-up. The caller issues the session token.
    pub async fn register(
        &self,
        fields: AssociationFields,
        logo: Option<LogoUpload>,
    ) -> Result<Association, AssociationServiceError> {
        let valid = self.validate(fields, logo.as_ref(), Mode::Register).await?;
        let association = self.insert(valid, None, logo.as_ref()).await?;
        info!(association_id = %association.id, "Association registered");
        Ok(association)
    }

    /// Admin creation; the creating admin becomes the owner.
    pub async fn create(
        &self,
        caller: &Principal,
        fields: AssociationFields,
        logo: Option<LogoUpload>,
    ) -> Result<Association, AssociationServiceError> {
        let Some(admin) = caller.as_user().filter(|user| user.is_admin()) else {
            return Err(AssociationServiceError::Forbidden(
                "Only admins can create associations.",
            ));
        };
        let valid = self.validate(fields, logo.as_ref(), Mode::AdminCreate).await?;
        let association = self.insert(valid, Some(admin.id), logo.as_ref()).await?;
        info!(association_id = %association.id, admin_id = %admin.id, "Association created");
        Ok(association)
    }

    /// Directory listing. Soft-deleted associations are only shown to admins.
    pub async fn list(
        &self,
        caller: &Principal,
        filter: &AssociationFilter,
    ) -> Result<Vec<Association>, AssociationServiceError> {
        Ok(Association::find_all(&self.pool, filter, caller.is_admin()).await?)
    }

    pub async fn get(
        &self,
        caller: &Principal,
        id: Uuid,
    ) -> Result<Association, AssociationServiceError> {
        let association = Association::find_by_id(&self.pool, id)
            .await?
            .ok_or(AssociationServiceError::NotFound)?;
        if !caller.can_manage_association(&association) {
            return Err(AssociationServiceError::Forbidden("Unauthorized action."));
        }
        Ok(association)
    }

    /// The association a principal acts for: itself, or the one its user owns.
    pub async fn find_owned_by(
        &self,
        caller: &Principal,
    ) -> Result<Association, AssociationServiceError> {
        match caller {
            Principal::Association(association) => Ok(association.clone()),
            Principal::User(user) => Association::find_by_owner(&self.pool, user.id)
                .await?
                .ok_or(AssociationServiceError::NotFound),
        }
    }

    /// Partial update; a new logo replaces (and removes) the previous file.
    pub async fn update(
        &self,
        caller: &Principal,
        id: Uuid,
        fields: AssociationFields,
        logo: Option<LogoUpload>,
    ) -> Result<Association, AssociationServiceError> {
        let existing = Association::find_by_id(&self.pool, id)
            .await?
            .ok_or(AssociationServiceError::NotFound)?;
        if !caller.can_manage_association(&existing) {
            return Err(AssociationServiceError::Forbidden(
                "Unauthorized: You do not own this association.",
            ));
        }

        let valid = self
            .validate(fields, logo.as_ref(), Mode::Update(existing.id))
            .await?;
        let password_hash = match valid.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let mut association = Association::update(
            &self.pool,
            existing.id,
            &UpdateAssociation {
                name: valid.name,
                email: valid.email,
                password_hash,
                phone: valid.phone,
                address: valid.address,
                description: valid.description,
                category: valid.category,
            },
        )
        .await?;

        if let Some(upload) = logo.as_ref() {
            let url = self.storage.store(upload).await?;
            association = Association::set_logo_url(&self.pool, association.id, Some(&url)).await?;
            if let Some(old) = existing.logo_url.as_deref() {
                self.remove_logo(old).await;
            }
        }

        info!(association_id = %association.id, "Association updated");
        Ok(association)
    }

    pub async fn delete(&self, caller: &Principal, id: Uuid) -> Result<(), AssociationServiceError> {
        let association = Association::find_by_id(&self.pool, id)
            .await?
            .ok_or(AssociationServiceError::NotFound)?;
        if !caller.can_manage_association(&association) {
            return Err(AssociationServiceError::Forbidden("Unauthorized action."));
        }
        self.trash(&association).await?;
        info!(association_id = %association.id, "Association soft-deleted");
        Ok(())
    }

    /// Closes the association the caller acts for and revokes its tokens.
    pub async fn delete_self(&self, caller: &Principal) -> Result<(), AssociationServiceError> {
        let association = self.find_owned_by(caller).await?;
        AccessToken::delete_for_owner(&self.pool, Party::association(association.id)).await?;
        self.trash(&association).await?;
        info!(association_id = %association.id, "Association deleted own account");
        Ok(())
    }

    async fn trash(&self, association: &Association) -> Result<(), AssociationServiceError> {
        if let Some(url) = association.logo_url.as_deref() {
            self.remove_logo(url).await;
            Association::set_logo_url(&self.pool, association.id, None).await?;
        }
        Association::soft_delete(&self.pool, association.id).await?;
        Ok(())
    }

    pub async fn list_deleted(
        &self,
        caller: &Principal,
    ) -> Result<Vec<Association>, AssociationServiceError> {
        if !caller.is_admin() {
            return Err(AssociationServiceError::Forbidden("Admin access required"));
        }
        Ok(Association::find_trashed(&self.pool).await?)
    }

    pub async fn restore(
        &self,
        caller: &Principal,
        id: Uuid,
    ) -> Result<Association, AssociationServiceError> {
        if !caller.is_admin() {
            return Err(AssociationServiceError::Forbidden("Admin access required"));
        }
        if Association::restore(&self.pool, id).await? == 0 {
            return Err(AssociationServiceError::NotFound);
        }
        info!(association_id = %id, "Association restored");
        Association::find_by_id(&self.pool, id)
            .await?
            .ok_or(AssociationServiceError::NotFound)
    }

    /// Permanent removal of a live or trashed association, including its logo,
    /// tokens and messages. Offers and requests addressed to it cascade.
    pub async fn force_delete(
        &self,
        caller: &Principal,
        id: Uuid,
    ) -> Result<(), AssociationServiceError> {
        if !caller.is_admin() {
            return Err(AssociationServiceError::Forbidden("Admin access required"));
        }
        let association = Association::find_by_id_with_trashed(&self.pool, id)
            .await?
            .ok_or(AssociationServiceError::NotFound)?;

        let party = Party::association(association.id);
        let mut tx = self.pool.begin().await?;
        AccessToken::delete_for_owner(&mut *tx, party).await?;
        Message::delete_for_party(&mut *tx, party).await?;
        Association::force_delete(&mut *tx, association.id).await?;
        tx.commit().await?;

        if let Some(url) = association.logo_url.as_deref() {
            self.remove_logo(url).await;
        }
        info!(association_id = %association.id, "Association permanently deleted");
        Ok(())
    }

    // A stale file is not worth failing the request over.
    async fn remove_logo(&self, url: &str) {
        if let Err(e) = self.storage.delete(url).await {
            warn!(url, error = %e, "Failed to remove logo file");
        }
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            message::CreateMessage,
            offer::{CreateOffer, Offer, OfferKind},
            user::{CreateUser, User, UserType},
        },
    };
    use tempfile::TempDir;

    use super::*;

    struct Fixture {
        _dir: TempDir,
        db: DBService,
        service: AssociationService,
        storage: LogoStorage,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db = DBService::new_in_memory().await.unwrap();
        let storage = LogoStorage::new(dir.path());
        let service = AssociationService::new(db.pool.clone(), storage.clone());
        Fixture {
            _dir: dir,
            db,
            service,
            storage,
        }
    }

    async fn user(db: &DBService, email: &str, user_type: UserType) -> User {
        User::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateUser {
                first_name: "Nadia".to_string(),
                last_name: "Benali".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                phone: None,
                address: None,
                user_type,
            },
        )
        .await
        .unwrap()
    }

    fn fields(name: &str, email: &str) -> AssociationFields {
        AssociationFields {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some("password123".to_string()),
            password_confirmation: Some("password123".to_string()),
            category: Some("Home supplies".to_string()),
            ..Default::default()
        }
    }

    fn png() -> LogoUpload {
        LogoUpload {
            file_name: Some("logo.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[tokio::test]
    async fn register_stores_logo_and_category() {
        let f = fixture().await;
        let association = f
            .service
            .register(fields("Al Amal", "amal@example.org"), Some(png()))
            .await
            .unwrap();
        assert_eq!(association.category, Some(AssociationCategory::HomeSupplies));
        assert!(association.user_id.is_none());
        let url = association.logo_url.unwrap();
        assert!(url.starts_with("/storage/associations/logos/"));
        let relative = url.trim_start_matches("/storage/");
        assert!(f.storage.root().join(relative).exists());
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let f = fixture().await;
        f.service
            .register(fields("Al Amal", "amal@example.org"), None)
            .await
            .unwrap();

        let mut bad = fields("", "amal@example.org");
        bad.category = Some("Toys".to_string());
        let pdf = LogoUpload {
            file_name: Some("logo.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
            bytes: vec![1, 2, 3],
        };
        match f.service.register(bad, Some(pdf)).await {
            Err(AssociationServiceError::Validation(errors)) => {
                for field in ["name", "email", "category", "logo_url"] {
                    assert!(errors.has(field), "missing error for {}", field);
                }
            }
            other => panic!("expected validation error, got {:?}", other.map(|a| a.id)),
        }
    }

    #[tokio::test]
    async fn admin_create_requires_confirmation_and_sets_owner() {
        let f = fixture().await;
        let admin = Principal::User(user(&f.db, "admin@example.org", UserType::Admin).await);
        let donor = Principal::User(user(&f.db, "donor@example.org", UserType::Donor).await);

        assert!(matches!(
            f.service
                .create(&donor, fields("Al Amal", "amal@example.org"), None)
                .await,
            Err(AssociationServiceError::Forbidden(_))
        ));

        let mut unconfirmed = fields("Al Amal", "amal@example.org");
        unconfirmed.password_confirmation = None;
        assert!(matches!(
            f.service.create(&admin, unconfirmed, None).await,
            Err(AssociationServiceError::Validation(e)) if e.has("password")
        ));

        let created = f
            .service
            .create(&admin, fields("Al Amal", "amal@example.org"), None)
            .await
            .unwrap();
        assert_eq!(created.user_id, admin.as_user().map(|u| u.id));
        let owned = f.service.find_owned_by(&admin).await.unwrap();
        assert_eq!(owned.id, created.id);
    }

    #[tokio::test]
    async fn update_replaces_logo_and_checks_ownership() {
        let f = fixture().await;
        let association = f
            .service
            .register(fields("Al Amal", "amal@example.org"), Some(png()))
            .await
            .unwrap();
        let old_url = association.logo_url.clone().unwrap();
        let itself = Principal::Association(association.clone());

        let stranger = Principal::User(user(&f.db, "donor@example.org", UserType::Donor).await);
        assert!(matches!(
            f.service
                .update(&stranger, association.id, AssociationFields::default(), None)
                .await,
            Err(AssociationServiceError::Forbidden(_))
        ));

        let updated = f
            .service
            .update(
                &itself,
                association.id,
                AssociationFields {
                    description: Some("Distribution de repas".to_string()),
                    ..Default::default()
                },
                Some(png()),
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Al Amal");
        assert_eq!(updated.description.as_deref(), Some("Distribution de repas"));
        let new_url = updated.logo_url.unwrap();
        assert_ne!(new_url, old_url);
        assert!(
            !f.storage
                .root()
                .join(old_url.trim_start_matches("/storage/"))
                .exists()
        );
    }

    #[tokio::test]
    async fn directory_hides_trashed_from_non_admins() {
        let f = fixture().await;
        let admin = Principal::User(user(&f.db, "admin@example.org", UserType::Admin).await);
        let donor = Principal::User(user(&f.db, "donor@example.org", UserType::Donor).await);
        let kept = f
            .service
            .register(fields("Al Amal", "amal@example.org"), None)
            .await
            .unwrap();
        let trashed = f
            .service
            .register(fields("Basma", "basma@example.org"), Some(png()))
            .await
            .unwrap();

        f.service.delete(&admin, trashed.id).await.unwrap();

        let visible = f
            .service
            .list(&donor, &AssociationFilter::default())
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, kept.id);

        let all = f
            .service
            .list(&admin, &AssociationFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        let stored = all.iter().find(|a| a.id == trashed.id).unwrap();
        assert!(stored.logo_url.is_none());
    }

    #[tokio::test]
    async fn delete_self_revokes_tokens_and_force_delete_removes_row() {
        let f = fixture().await;
        let admin = Principal::User(user(&f.db, "admin@example.org", UserType::Admin).await);
        let association = f
            .service
            .register(fields("Al Amal", "amal@example.org"), None)
            .await
            .unwrap();
        AccessToken::create(
            &f.db.pool,
            Uuid::new_v4(),
            Party::association(association.id),
            "auth_token",
            "digest",
        )
        .await
        .unwrap();

        f.service
            .delete_self(&Principal::Association(association.clone()))
            .await
            .unwrap();
        assert!(
            AccessToken::find_by_hash(&f.db.pool, "digest")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(f.service.list_deleted(&admin).await.unwrap().len(), 1);

        let restored = f.service.restore(&admin, association.id).await.unwrap();
        assert!(restored.deleted_at.is_none());

        f.service.force_delete(&admin, association.id).await.unwrap();
        assert!(
            Association::find_by_id_with_trashed(&f.db.pool, association.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn force_delete_removes_proposals_messages_and_tokens() {
        let f = fixture().await;
        let admin = Principal::User(user(&f.db, "admin@example.org", UserType::Admin).await);
        let donor = user(&f.db, "donor@example.org", UserType::Donor).await;
        let recipient = user(&f.db, "recipient@example.org", UserType::Recipient).await;
        let association = f
            .service
            .register(fields("Al Amal", "amal@example.org"), Some(png()))
            .await
            .unwrap();

        let mut proposals = Vec::new();
        for (kind, user_id) in [
            (OfferKind::Donation, donor.id),
            (OfferKind::Recipient, recipient.id),
        ] {
            let offer = Offer::create(
                &f.db.pool,
                kind,
                Uuid::new_v4(),
                &CreateOffer {
                    association_id: association.id,
                    user_id,
                    title: "Blankets".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();
            proposals.push((kind, offer.id));
        }
        for (sender, receiver) in [
            (Party::user(donor.id), Party::association(association.id)),
            (Party::association(association.id), Party::user(donor.id)),
        ] {
            Message::create(
                &f.db.pool,
                Uuid::new_v4(),
                &CreateMessage {
                    sender,
                    receiver,
                    message_content: "Salam".to_string(),
                },
            )
            .await
            .unwrap();
        }
        AccessToken::create(
            &f.db.pool,
            Uuid::new_v4(),
            Party::association(association.id),
            "auth_token",
            "association-digest",
        )
        .await
        .unwrap();

        f.service.force_delete(&admin, association.id).await.unwrap();

        for (kind, id) in proposals {
            assert!(Offer::find_by_id(&f.db.pool, kind, id).await.unwrap().is_none());
        }
        assert!(
            Message::find_conversation(&f.db.pool, donor.id, association.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            AccessToken::find_by_hash(&f.db.pool, "association-digest")
                .await
                .unwrap()
                .is_none()
        );
        let logo = association.logo_url.unwrap();
        let relative = logo.trim_start_matches("/storage/");
        assert!(!f.storage.root().join(relative).exists());
        // The submitters themselves are untouched.
        assert!(User::find_by_id(&f.db.pool, donor.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_logo_write_leaves_no_association() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"x").unwrap();
        let db = DBService::new_in_memory().await.unwrap();
        let service = AssociationService::new(db.pool.clone(), LogoStorage::new(&blocker));

        let result = service
            .register(fields("Al Amal", "amal@example.org"), Some(png()))
            .await;
        assert!(matches!(result, Err(AssociationServiceError::Storage(_))));
        assert!(
            Association::find_by_email(&db.pool, "amal@example.org")
                .await
                .unwrap()
                .is_none()
        );
    }
}
