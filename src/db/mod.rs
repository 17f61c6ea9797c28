use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::AuthConfig;
use crate::entities::users::Role;

pub mod migrator;
pub mod repositories;

pub use repositories::secret::SecretType;
pub use repositories::user::{UpdateOutcome, User};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn secret_repo(&self) -> repositories::secret::SecretRepository {
        repositories::secret::SecretRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        approved: bool,
    ) -> Result<Option<User>> {
        self.user_repo()
            .insert(username, password_hash, role, approved)
            .await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo()
            .get_by_username_with_password(username)
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list_all().await
    }

    pub async fn update_user(
        &self,
        id: i32,
        new_username: Option<&str>,
        new_password_hash: Option<&str>,
    ) -> Result<UpdateOutcome> {
        self.user_repo()
            .update(id, new_username, new_password_hash)
            .await
    }

    pub async fn approve_user(&self, id: i32, approved: bool) -> Result<bool> {
        self.user_repo().set_approved(id, approved).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    // ========== Secrets ==========

    pub async fn get_secret(&self, secret_type: SecretType) -> Result<Option<String>> {
        self.secret_repo().get(secret_type).await
    }

    /// Seed the secrets table from config values, insert-if-absent. Rows
    /// already provisioned (out of band or by an earlier run) win.
    pub async fn initialize_secrets(&self, auth: &AuthConfig) -> Result<()> {
        let repo = self.secret_repo();

        if let Some(value) = &auth.admin_signup_secret
            && repo.set_if_missing(SecretType::AdminSignup, value).await?
        {
            info!("Seeded {} secret from config", SecretType::AdminSignup);
        }

        if let Some(value) = &auth.token_signing_key
            && repo.set_if_missing(SecretType::TokenKey, value).await?
        {
            info!("Seeded {} secret from config", SecretType::TokenKey);
        }

        Ok(())
    }
}
