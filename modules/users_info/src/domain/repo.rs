use async_trait::async_trait;
use thiserror::Error;

use crate::contract::model::{NewUser, User, UserUpdate};

/// Failures of the mutating repository calls.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Another record already uses this email (compared case-insensitively).
    #[error("email '{0}' is already in use")]
    EmailTaken(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Port for the domain layer: persistence operations the domain needs.
/// Object-safe and async-friendly via `async_trait`.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// All users, ascending by id.
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Load a user by id.
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    /// Case-insensitive email lookup, optionally ignoring one record.
    async fn email_exists(&self, email: &str, exclude_id: Option<i64>) -> anyhow::Result<bool>;
    /// Assign the next id and timestamps, then store.
    ///
    /// The email check and the insert are atomic.
    async fn insert(&self, new_user: NewUser) -> Result<User, RepoError>;
    /// Overwrite the mutable fields and refresh `updated_at`.
    /// `Ok(None)` when no user has this id.
    async fn update(&self, id: i64, changes: UserUpdate) -> Result<Option<User>, RepoError>;
    /// Delete by id. Returns true if a record was removed.
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
}
