//! Password hashing, bearer tokens and the authenticated principal.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use db::models::{
    access_token::AccessToken,
    association::Association,
    message::{Party, PartyType},
    user::User,
};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use utils::validation::ValidationErrors;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Whoever a bearer token belongs to.
#[derive(Debug, Clone)]
pub enum Principal {
    User(User),
    Association(Association),
}

impl Principal {
    pub fn party(&self) -> Party {
        match self {
            Principal::User(user) => Party::user(user.id),
            Principal::Association(association) => Party::association(association.id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::User(user) if user.is_admin())
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Principal::User(user) => Some(user),
            Principal::Association(_) => None,
        }
    }

    pub fn as_association(&self) -> Option<&Association> {
        match self {
            Principal::Association(association) => Some(association),
            Principal::User(_) => None,
        }
    }

    /// Admins manage every account; users manage only their own.
    pub fn can_manage_user(&self, user_id: Uuid) -> bool {
        match self {
            Principal::User(user) => user.is_admin() || user.id == user_id,
            Principal::Association(_) => false,
        }
    }

    /// An association is managed by itself, by the user owning it, or by an admin.
    pub fn can_manage_association(&self, association: &Association) -> bool {
        match self {
            Principal::User(user) => user.is_admin() || association.user_id == Some(user.id),
            Principal::Association(own) => own.id == association.id,
        }
    }
}

/// Result of a successful token lookup.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub principal: Principal,
    pub token_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
    pub device_name: Option<String>,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct AuthService {
    pool: SqlitePool,
}

impl AuthService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issues a new bearer token for `owner`. The plaintext is only ever returned here.
    pub async fn issue_token(&self, owner: Party, name: &str) -> Result<String, AuthError> {
        let token = generate_token();
        AccessToken::create(&self.pool, Uuid::new_v4(), owner, name, &digest(&token)).await?;
        debug!(owner_id = %owner.id, owner_type = %owner.kind, "Issued access token");
        Ok(token)
    }

    pub async fn authenticate(&self, token: &str) -> Result<Authenticated, AuthError> {
        let record = AccessToken::find_by_hash(&self.pool, &digest(token))
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        // Live lookups: a soft-deleted owner cannot use old tokens.
        let principal = match record.owner_type {
            PartyType::User => User::find_by_id(&self.pool, record.owner_id)
                .await?
                .map(Principal::User),
            PartyType::Association => Association::find_by_id(&self.pool, record.owner_id)
                .await?
                .map(Principal::Association),
        }
        .ok_or(AuthError::Unauthenticated)?;

        Ok(Authenticated {
            principal,
            token_id: record.id,
        })
    }

    pub async fn login_user(&self, credentials: Credentials) -> Result<(User, String), AuthError> {
        let (email, password) = validate_credentials(&credentials)?;

        let user = User::find_by_email(&self.pool, &email)
            .await?
            .filter(|user| verify_password(&password, &user.password_hash))
            .ok_or(AuthError::InvalidCredentials)?;

        let name = credentials.device_name.as_deref().unwrap_or("api_token");
        let token = self.issue_token(Party::user(user.id), name).await?;
        info!(user_id = %user.id, user_type = %user.user_type, "User logged in");
        Ok((user, token))
    }

    pub async fn login_association(
        &self,
        credentials: Credentials,
    ) -> Result<(Association, String), AuthError> {
        let (email, password) = validate_credentials(&credentials)?;

        let association = Association::find_by_email(&self.pool, &email)
            .await?
            .filter(|association| verify_password(&password, &association.password_hash))
            .ok_or(AuthError::InvalidCredentials)?;

        let token = self
            .issue_token(Party::association(association.id), "association_token")
            .await?;
        info!(association_id = %association.id, "Association logged in");
        Ok((association, token))
    }

    /// Revokes the token used for the current request.
    pub async fn logout(&self, token_id: Uuid) -> Result<(), AuthError> {
        AccessToken::delete(&self.pool, token_id).await?;
        Ok(())
    }

    pub async fn revoke_all(&self, owner: Party) -> Result<u64, AuthError> {
        Ok(AccessToken::delete_for_owner(&self.pool, owner).await?)
    }
}

fn validate_credentials(credentials: &Credentials) -> Result<(String, String), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = credentials.email.as_deref().map(str::trim);
    if errors.required("email", email) {
        errors.email("email", email);
    }
    errors.required("password", credentials.password.as_deref());
    errors.into_result()?;

    Ok((
        email.unwrap_or_default().to_string(),
        credentials.password.clone().unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::user::{CreateUser, UserType},
    };

    use super::*;

    async fn seed_user(db: &DBService, user_type: UserType) -> User {
        User::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateUser {
                first_name: "Sara".to_string(),
                last_name: "Idrissi".to_string(),
                email: "sara@example.org".to_string(),
                password_hash: hash_password("password123").unwrap(),
                phone: None,
                address: None,
                user_type,
            },
        )
        .await
        .unwrap()
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn login_then_authenticate_then_logout() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = seed_user(&db, UserType::Donor).await;
        let auth = AuthService::new(db.pool.clone());

        let (logged_in, token) = auth
            .login_user(Credentials {
                email: Some("SARA@example.org".to_string()),
                password: Some("password123".to_string()),
                device_name: None,
            })
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let session = auth.authenticate(&token).await.unwrap();
        assert!(matches!(&session.principal, Principal::User(u) if u.id == user.id));
        assert!(!session.principal.is_admin());

        auth.logout(session.token_id).await.unwrap();
        assert!(matches!(
            auth.authenticate(&token).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_trashed_users_are_rejected() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = seed_user(&db, UserType::Recipient).await;
        let auth = AuthService::new(db.pool.clone());

        let bad = auth
            .login_user(Credentials {
                email: Some("sara@example.org".to_string()),
                password: Some("password124".to_string()),
                device_name: None,
            })
            .await;
        assert!(matches!(bad, Err(AuthError::InvalidCredentials)));

        let token = auth.issue_token(Party::user(user.id), "test").await.unwrap();
        User::soft_delete(&db.pool, user.id).await.unwrap();
        assert!(matches!(
            auth.authenticate(&token).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors() {
        let db = DBService::new_in_memory().await.unwrap();
        let auth = AuthService::new(db.pool.clone());
        match auth.login_association(Credentials::default()).await {
            Err(AuthError::Validation(errors)) => {
                assert!(errors.has("email"));
                assert!(errors.has("password"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|(a, _)| a.id)),
        }
    }
}
