use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::contract::model::{NewUser, User, UserUpdate};

/// REST DTO for user representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Request bodies carrying a user name, checked against the configured `NameRules`.
pub trait NamedBody {
    fn name(&self) -> &str;
}

/// REST DTO for creating a new user.
///
/// Missing fields deserialize as empty strings and are reported by validation.
/// Name length limits come from `users_info.min_name_length`/`max_name_length`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserReq {
    #[schema(example = "Dana Lee")]
    pub name: String,
    #[validate(
        length(min = 1, message = "Email is required."),
        email(message = "Please enter a valid email address.")
    )]
    #[schema(example = "dana@example.com")]
    pub email: String,
}

/// REST DTO for replacing a user's mutable fields
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUserReq {
    pub name: String,
    #[validate(
        length(min = 1, message = "Email is required."),
        email(message = "Please enter a valid email address.")
    )]
    pub email: String,
    /// Defaults to `true` when omitted.
    pub is_active: bool,
}

impl Default for UpdateUserReq {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            is_active: true,
        }
    }
}

impl NamedBody for CreateUserReq {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedBody for UpdateUserReq {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Body of 401/404/409 responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDto {
    pub error: String,
}

/// Body of 400 responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrorDto {
    pub error: String,
    /// Field name to rule violations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Vec<String>>,
}

/// Body of 500 responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InternalErrorDto {
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// Conversion implementations between REST DTOs and contract models

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
            is_active: user.is_active,
        }
    }
}

impl From<CreateUserReq> for NewUser {
    fn from(req: CreateUserReq) -> Self {
        Self {
            name: req.name,
            email: req.email,
        }
    }
}

impl From<UpdateUserReq> for UserUpdate {
    fn from(req: UpdateUserReq) -> Self {
        Self {
            name: req.name,
            email: req.email,
            is_active: req.is_active,
        }
    }
}
