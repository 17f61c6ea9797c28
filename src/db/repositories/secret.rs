use std::fmt;

use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::secrets;

/// The two secrets the service depends on. Exactly one row per type must
/// exist for the corresponding flow to work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretType {
    /// Shared value that grants the admin role at registration.
    AdminSignup,
    /// Symmetric key for signing and verifying bearer tokens.
    TokenKey,
}

impl SecretType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdminSignup => "admin-login",
            Self::TokenKey => "token-key",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct SecretRepository {
    conn: DatabaseConnection,
}

impl SecretRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Point lookup by type. `None` means the deployment was never
    /// provisioned with this secret.
    pub async fn get(&self, secret_type: SecretType) -> Result<Option<String>> {
        let secret = secrets::Entity::find()
            .filter(secrets::Column::SecretType.eq(secret_type.as_str()))
            .one(&self.conn)
            .await
            .with_context(|| format!("Failed to query {secret_type} secret"))?;

        Ok(secret.map(|s| s.value))
    }

    /// Startup seeding: insert the secret only when no row of this type
    /// exists yet. Returns true when a row was inserted.
    pub async fn set_if_missing(&self, secret_type: SecretType, value: &str) -> Result<bool> {
        if self.get(secret_type).await?.is_some() {
            return Ok(false);
        }

        let active = secrets::ActiveModel {
            secret_type: Set(secret_type.as_str().to_string()),
            value: Set(value.to_string()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .with_context(|| format!("Failed to seed {secret_type} secret"))?;

        Ok(true)
    }
}
