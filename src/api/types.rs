use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::entities::users::Role;

/// Uniform response envelope for everything except the admin list endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub status: Status,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Fail,
}

impl Envelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,

    pub password: String,

    #[serde(default, rename = "secretKey")]
    pub secret_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,

    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub id: Option<i32>,

    pub username: Option<String>,

    pub password: Option<String>,
}

/// Raw query params for DELETE /users, parsed by hand so both a missing
/// and a non-numeric id produce the envelope.
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: Option<String>,
}

/// Account record as exposed over the API. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub approved: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            approved: user.approved,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
