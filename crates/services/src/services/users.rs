//! User accounts: registration, profile management and the admin lifecycle
//! (soft delete, restore, permanent removal).

use db::models::{
    access_token::AccessToken,
    message::{Message, Party},
    user::{CreateUser, UpdateUser, User, UserType},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::validation::ValidationErrors;
use uuid::Uuid;

use super::{
    auth::{AuthError, MIN_PASSWORD_LEN, Principal, hash_password},
    form::{non_blank, parse_choice},
};

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("User not found")]
    NotFound,
    #[error("{0}")]
    Forbidden(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct RegisterUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub user_type: Option<String>,
}

pub struct UserService {
    pool: SqlitePool,
}

impl UserService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Public sign-up; the admin `create` goes through the same rules.
    pub async fn register(&self, payload: RegisterUser) -> Result<User, UserServiceError> {
        let mut errors = ValidationErrors::new();

        let first_name = payload.first_name.as_deref().map(str::trim);
        if errors.required("first_name", first_name) {
            errors.max_len("first_name", first_name, 255);
        }
        let last_name = payload.last_name.as_deref().map(str::trim);
        if errors.required("last_name", last_name) {
            errors.max_len("last_name", last_name, 255);
        }
        let email = payload.email.as_deref().map(str::trim);
        if errors.required("email", email) {
            errors.email("email", email);
            errors.max_len("email", email, 255);
        }
        if errors.required("password", payload.password.as_deref()) {
            errors.min_len("password", payload.password.as_deref(), MIN_PASSWORD_LEN);
        }
        let phone = non_blank(payload.phone);
        errors.max_len("phone", phone.as_deref(), 20);
        let user_type = if errors.required("user_type", payload.user_type.as_deref()) {
            parse_choice::<UserType>(&mut errors, "user_type", payload.user_type.as_deref())
        } else {
            None
        };

        if let Some(email) = email.filter(|_| !errors.has("email")) {
            if User::email_taken(&self.pool, email, None).await? {
                errors.add("email", "The email has already been taken.");
            }
        }
        errors.into_result()?;
        let Some(user_type) = user_type else {
            return Err(ValidationErrors::single("user_type", "The user type field is required.").into());
        };

        let user = User::create(
            &self.pool,
            Uuid::new_v4(),
            &CreateUser {
                first_name: first_name.unwrap_or_default().to_string(),
                last_name: last_name.unwrap_or_default().to_string(),
                email: email.unwrap_or_default().to_string(),
                password_hash: hash_password(payload.password.as_deref().unwrap_or_default())?,
                phone,
                address: non_blank(payload.address),
                user_type,
            },
        )
        .await?;

        info!(user_id = %user.id, user_type = %user.user_type, "User registered");
        Ok(user)
    }

    pub async fn list(&self, caller: &Principal) -> Result<Vec<User>, UserServiceError> {
        if !caller.is_admin() {
            return Err(UserServiceError::Forbidden("Only admins can view all users."));
        }
        Ok(User::find_all(&self.pool).await?)
    }

    pub async fn create(
        &self,
        caller: &Principal,
        payload: RegisterUser,
    ) -> Result<User, UserServiceError> {
        if !caller.is_admin() {
            return Err(UserServiceError::Forbidden("Only admins can create users."));
        }
        self.register(payload).await
    }

    pub async fn get(&self, caller: &Principal, id: Uuid) -> Result<User, UserServiceError> {
        if !caller.can_manage_user(id) {
            return Err(UserServiceError::Forbidden("Unauthorized action."));
        }
        User::find_by_id(&self.pool, id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Partial profile update. `user_type` is only honoured for admins.
    pub async fn update(
        &self,
        caller: &Principal,
        id: Uuid,
        payload: UpdateUserRequest,
    ) -> Result<User, UserServiceError> {
        if !caller.can_manage_user(id) {
            return Err(UserServiceError::Forbidden("Unauthorized action."));
        }
        let existing = User::find_by_id(&self.pool, id)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        let mut errors = ValidationErrors::new();
        let first_name = non_blank(payload.first_name);
        errors.max_len("first_name", first_name.as_deref(), 255);
        let last_name = non_blank(payload.last_name);
        errors.max_len("last_name", last_name.as_deref(), 255);
        let email = non_blank(payload.email);
        errors.email("email", email.as_deref());
        let phone = non_blank(payload.phone);
        errors.max_len("phone", phone.as_deref(), 20);
        let password = payload.password.filter(|p| !p.is_empty());
        errors.min_len("password", password.as_deref(), MIN_PASSWORD_LEN);
        errors.confirmed(
            "password",
            password.as_deref(),
            payload.password_confirmation.as_deref(),
        );
        let user_type = if caller.is_admin() {
            let requested = non_blank(payload.user_type);
            parse_choice::<UserType>(&mut errors, "user_type", requested.as_deref())
        } else {
            None
        };

        if let Some(email) = email.as_deref().filter(|_| !errors.has("email")) {
            if User::email_taken(&self.pool, email, Some(existing.id)).await? {
                errors.add("email", "The email has already been taken.");
            }
        }
        errors.into_result()?;

        let password_hash = match password {
            Some(password) => Some(hash_password(&password)?),
            None => None,
        };

        let user = User::update(
            &self.pool,
            existing.id,
            &UpdateUser {
                first_name,
                last_name,
                email,
                password_hash,
                phone,
                address: non_blank(payload.address),
                user_type,
            },
        )
        .await?;
        info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    pub async fn delete(&self, caller: &Principal, id: Uuid) -> Result<(), UserServiceError> {
        if !caller.can_manage_user(id) {
            return Err(UserServiceError::Forbidden("Unauthorized action."));
        }
        if User::soft_delete(&self.pool, id).await? == 0 {
            return Err(UserServiceError::NotFound);
        }
        info!(user_id = %id, "User soft-deleted");
        Ok(())
    }

    /// Closes the caller's own account: every token is revoked first.
    pub async fn delete_self(&self, user: &User) -> Result<(), UserServiceError> {
        let mut tx = self.pool.begin().await?;
        AccessToken::delete_for_owner(&mut *tx, Party::user(user.id)).await?;
        User::soft_delete(&mut *tx, user.id).await?;
        tx.commit().await?;
        info!(user_id = %user.id, "User deleted own account");
        Ok(())
    }

    pub async fn list_deleted(&self, caller: &Principal) -> Result<Vec<User>, UserServiceError> {
        if !caller.is_admin() {
            return Err(UserServiceError::Forbidden(
                "Only admins can view deleted accounts.",
            ));
        }
        Ok(User::find_trashed(&self.pool).await?)
    }

    pub async fn restore(&self, caller: &Principal, id: Uuid) -> Result<User, UserServiceError> {
        if !caller.is_admin() {
            return Err(UserServiceError::Forbidden("Only admins can restore accounts"));
        }
        if User::restore(&self.pool, id).await? == 0 {
            return Err(UserServiceError::NotFound);
        }
        info!(user_id = %id, "User restored");
        User::find_by_id(&self.pool, id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Permanently removes a user, trashed or not, with their tokens and messages.
    pub async fn force_delete(&self, caller: &Principal, id: Uuid) -> Result<(), UserServiceError> {
        if !caller.is_admin() {
            return Err(UserServiceError::Forbidden(
                "Only admins can permanently delete accounts",
            ));
        }
        let user = User::find_by_id_with_trashed(&self.pool, id)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        let party = Party::user(user.id);
        let mut tx = self.pool.begin().await?;
        AccessToken::delete_for_owner(&mut *tx, party).await?;
        Message::delete_for_party(&mut *tx, party).await?;
        User::force_delete(&mut *tx, user.id).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "User permanently deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    fn registration(email: &str, user_type: &str) -> RegisterUser {
        RegisterUser {
            first_name: Some("Youssef".to_string()),
            last_name: Some("Amrani".to_string()),
            email: Some(email.to_string()),
            password: Some("password123".to_string()),
            phone: Some("0612345678".to_string()),
            address: None,
            user_type: Some(user_type.to_string()),
        }
    }

    #[tokio::test]
    async fn register_validates_and_rejects_duplicates() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = UserService::new(db.pool.clone());

        let user = service
            .register(registration("youssef@example.org", "donor"))
            .await
            .unwrap();
        assert_eq!(user.user_type, UserType::Donor);
        assert_ne!(user.password_hash, "password123");

        match service
            .register(registration("youssef@example.org", "recipient"))
            .await
        {
            Err(UserServiceError::Validation(errors)) => assert!(errors.has("email")),
            other => panic!("expected duplicate email error, got {:?}", other.map(|u| u.id)),
        }

        match service
            .register(RegisterUser {
                password: Some("short".to_string()),
                user_type: Some("superuser".to_string()),
                ..Default::default()
            })
            .await
        {
            Err(UserServiceError::Validation(errors)) => {
                for field in ["first_name", "last_name", "email", "password", "user_type"] {
                    assert!(errors.has(field), "missing error for {}", field);
                }
            }
            other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn only_admins_change_user_type() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = UserService::new(db.pool.clone());
        let donor = service
            .register(registration("donor@example.org", "donor"))
            .await
            .unwrap();
        let admin = service
            .register(registration("admin@example.org", "admin"))
            .await
            .unwrap();

        let as_self = Principal::User(donor.clone());
        let updated = service
            .update(
                &as_self,
                donor.id,
                UpdateUserRequest {
                    user_type: Some("admin".to_string()),
                    address: Some("3 avenue Hassan II".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.user_type, UserType::Donor);
        assert_eq!(updated.address.as_deref(), Some("3 avenue Hassan II"));

        let as_admin = Principal::User(admin);
        let promoted = service
            .update(
                &as_admin,
                donor.id,
                UpdateUserRequest {
                    user_type: Some("recipient".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.user_type, UserType::Recipient);
    }

    #[tokio::test]
    async fn password_change_requires_confirmation() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = UserService::new(db.pool.clone());
        let donor = service
            .register(registration("donor@example.org", "donor"))
            .await
            .unwrap();

        let result = service
            .update(
                &Principal::User(donor.clone()),
                donor.id,
                UpdateUserRequest {
                    password: Some("newpassword".to_string()),
                    password_confirmation: Some("different".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(UserServiceError::Validation(e)) if e.has("password")));
    }

    #[tokio::test]
    async fn users_cannot_touch_each_other() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = UserService::new(db.pool.clone());
        let first = service
            .register(registration("first@example.org", "donor"))
            .await
            .unwrap();
        let second = service
            .register(registration("second@example.org", "recipient"))
            .await
            .unwrap();

        let caller = Principal::User(first);
        assert!(matches!(
            service.delete(&caller, second.id).await,
            Err(UserServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.list(&caller).await,
            Err(UserServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn admin_lifecycle_soft_delete_restore_force() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = UserService::new(db.pool.clone());
        let admin = Principal::User(
            service
                .register(registration("admin@example.org", "admin"))
                .await
                .unwrap(),
        );
        let donor = service
            .register(registration("donor@example.org", "donor"))
            .await
            .unwrap();

        service.delete(&admin, donor.id).await.unwrap();
        let deleted = service.list_deleted(&admin).await.unwrap();
        assert_eq!(deleted.len(), 1);

        let restored = service.restore(&admin, donor.id).await.unwrap();
        assert!(restored.deleted_at.is_none());

        service.force_delete(&admin, donor.id).await.unwrap();
        assert!(
            User::find_by_id_with_trashed(&db.pool, donor.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            service.force_delete(&admin, donor.id).await,
            Err(UserServiceError::NotFound)
        ));
    }
}
