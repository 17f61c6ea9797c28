//! Registration, login, and role-gated account CRUD.
//!
//! One service holds the store and security knobs, is constructed once at
//! startup, and is shared by every request handler through the app state.

use axum::http::HeaderMap;
use thiserror::Error;
use tracing::info;

use crate::config::SecurityConfig;
use crate::db::{SecretType, Store, UpdateOutcome, User};
use crate::entities::users::Role;
use crate::services::token::{Claims, TokenError};
use crate::services::{password, token};

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("username is already taken")]
    DuplicateUsername,

    #[error("user not found in the system")]
    UserNotFound,

    #[error("please wait for an admin to approve your registration")]
    NotApproved,

    #[error("incorrect password")]
    WrongPassword,

    #[error("wrong admin secret key")]
    WrongSecret,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("user not found")]
    NotFound,

    #[error("{0} secret is not configured")]
    SecretMissing(SecretType),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

pub struct AccountService {
    store: Store,
    security: SecurityConfig,
}

impl AccountService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    /// Register a new account. The role is decided by the supplied secret
    /// key: none grants a regular unapproved account, the configured admin
    /// secret grants an approved admin, anything else is rejected.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        secret_key: Option<&str>,
    ) -> Result<User, AccountError> {
        validate_credentials(username, password)?;

        let admin_key = self
            .store
            .get_secret(SecretType::AdminSignup)
            .await?
            .ok_or(AccountError::SecretMissing(SecretType::AdminSignup))?;

        let (role, approved) = determine_role(secret_key, &admin_key)?;

        let password_hash = password::hash_blocking(password, &self.security).await?;

        let user = self
            .store
            .insert_user(username, &password_hash, role, approved)
            .await?
            .ok_or(AccountError::DuplicateUsername)?;

        info!("Registered '{}' (role: {:?})", user.username, user.role);

        Ok(user)
    }

    /// Verify credentials and issue a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AccountError> {
        validate_credentials(username, password)?;

        let (user, stored_hash) = self
            .store
            .get_user_by_username_with_password(username)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        if !user.approved {
            return Err(AccountError::NotApproved);
        }

        let matches = password::verify_blocking(stored_hash, password.to_string()).await?;
        if !matches {
            return Err(AccountError::WrongPassword);
        }

        let signing_key = self
            .store
            .get_secret(SecretType::TokenKey)
            .await?
            .ok_or(AccountError::SecretMissing(SecretType::TokenKey))?;

        let bearer = token::issue(user.id, &user.username, user.role, &signing_key)?;

        info!("Issued token for '{}'", user.username);

        Ok(bearer)
    }

    /// Extract and verify the caller's bearer token against the current
    /// signing key.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AccountError> {
        let bearer = token::bearer_token(headers)?;

        let signing_key = self
            .store
            .get_secret(SecretType::TokenKey)
            .await?
            .ok_or(AccountError::SecretMissing(SecretType::TokenKey))?;

        Ok(token::verify(&bearer, &signing_key)?)
    }

    /// List every account, admin only.
    pub async fn list_users(&self, claims: &Claims) -> Result<Vec<User>, AccountError> {
        if claims.role != Role::Admin {
            return Err(AccountError::Forbidden("only admins may list accounts"));
        }

        Ok(self.store.list_users().await?)
    }

    /// Update username and/or password. Self-service for regular accounts:
    /// the target id is forced to the token subject no matter what the
    /// request body claims. Admins name their target explicitly.
    pub async fn update_user(
        &self,
        claims: &Claims,
        target_id: Option<i32>,
        new_username: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<User, AccountError> {
        let id = match claims.role {
            Role::Admin => target_id.ok_or_else(|| {
                AccountError::Validation("id is required for admin updates".to_string())
            })?,
            Role::User => claims.sub,
        };

        let password_hash = match new_password {
            Some(p) if !p.is_empty() => Some(password::hash_blocking(p, &self.security).await?),
            _ => None,
        };

        match self
            .store
            .update_user(id, new_username, password_hash.as_deref())
            .await?
        {
            UpdateOutcome::Updated(user) => Ok(user),
            UpdateOutcome::NotFound => Err(AccountError::NotFound),
            UpdateOutcome::UsernameTaken => Err(AccountError::DuplicateUsername),
        }
    }

    /// Hard-delete an account, admin only.
    pub async fn delete_user(&self, claims: &Claims, id: i32) -> Result<(), AccountError> {
        if claims.role != Role::Admin {
            return Err(AccountError::Forbidden("only admins may delete accounts"));
        }

        if self.store.delete_user(id).await? {
            info!("Deleted account {id}");
            Ok(())
        } else {
            Err(AccountError::NotFound)
        }
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), AccountError> {
    if username.is_empty() || password.is_empty() {
        return Err(AccountError::Validation(
            "username or password cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Pure function of the caller-supplied secret and the configured admin
/// secret; decided once at registration.
fn determine_role(secret_key: Option<&str>, admin_key: &str) -> Result<(Role, bool), AccountError> {
    match secret_key {
        None | Some("") => Ok((Role::User, false)),
        Some(key) if key == admin_key => Ok((Role::Admin, true)),
        Some(_) => Err(AccountError::WrongSecret),
    }
}
