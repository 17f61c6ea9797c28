use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Set, SqlErr,
};

use crate::entities::users::{self, Role};

/// User data returned from the repository (without the sensitive password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub approved: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: model.role,
            approved: model.approved,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Outcome of an update: the row may be missing, or a rename may collide
/// with an existing username.
#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(User),
    NotFound,
    UsernameTaken,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a new user. Returns `None` when the unique index on username
    /// rejects the row.
    pub async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        approved: bool,
    ) -> Result<Option<User>> {
        let now = Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role),
            approved: Set(approved),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(Some(model.into())),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err).context("Failed to insert user"),
        }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Get user by username with password hash (login path only)
    pub async fn get_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    /// List all users in insertion (id) order
    pub async fn list_all(&self) -> Result<Vec<User>> {
        let users = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    /// Update username and/or password hash for a user.
    ///
    /// A field is applied only when it is supplied, non-empty, and differs
    /// from the stored value; anything else is a no-op for that field.
    pub async fn update(
        &self,
        id: i32,
        new_username: Option<&str>,
        new_password_hash: Option<&str>,
    ) -> Result<UpdateOutcome> {
        let Some(model) = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(UpdateOutcome::NotFound);
        };

        let mut active: users::ActiveModel = model.clone().into();
        let mut changed = false;

        if let Some(username) = new_username
            && !username.is_empty()
            && username != model.username
        {
            active.username = Set(username.to_string());
            changed = true;
        }

        if let Some(hash) = new_password_hash
            && !hash.is_empty()
            && hash != model.password_hash
        {
            active.password_hash = Set(hash.to_string());
            changed = true;
        }

        if !changed {
            return Ok(UpdateOutcome::Updated(model.into()));
        }

        active.updated_at = Set(Utc::now().to_rfc3339());

        match active.update(&self.conn).await {
            Ok(model) => Ok(UpdateOutcome::Updated(model.into())),
            Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::UsernameTaken),
            Err(err) => Err(err).context("Failed to update user"),
        }
    }

    /// Flip the approval gate for an account. Administrative path with no
    /// HTTP surface; reachable only through the store handle.
    pub async fn set_approved(&self, id: i32, approved: bool) -> Result<bool> {
        let Some(model) = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for approval")?
        else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = model.into();
        active.approved = Set(approved);
        active.updated_at = Set(Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to update approval flag")?;

        Ok(true)
    }

    /// Hard delete. Returns false when no row had the given id.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
