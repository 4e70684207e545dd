use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::contract::model::{NewUser, User, UserUpdate};
use crate::domain::error::DomainError;
use crate::domain::repo::{RepoError, UsersRepository};

/// Domain service with business rules for user management.
/// Depends only on the repository port, not on infra types.
/// Inputs arrive already validated by the REST layer.
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn UsersRepository>,
}

fn storage(e: anyhow::Error) -> DomainError {
    DomainError::storage(format!("{e:#}"))
}

impl From<RepoError> for DomainError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::EmailTaken(email) => DomainError::email_already_exists(email),
            RepoError::Storage(e) => storage(e),
        }
    }
}

impl Service {
    /// Create a service with dependencies.
    pub fn new(repo: Arc<dyn UsersRepository>) -> Self {
        Self { repo }
    }

    #[instrument(name = "users_info.service.list", skip(self))]
    pub async fn list(&self) -> Result<Vec<User>, DomainError> {
        let users = self.repo.list().await.map_err(storage)?;
        debug!("Listed {} users", users.len());
        Ok(users)
    }

    #[instrument(name = "users_info.service.list_active", skip(self))]
    pub async fn list_active(&self) -> Result<Vec<User>, DomainError> {
        let mut users = self.list().await?;
        users.retain(|u| u.is_active);
        Ok(users)
    }

    #[instrument(name = "users_info.service.get", skip(self), fields(user_id = id))]
    pub async fn get(&self, id: i64) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(storage)?
            .ok_or_else(|| DomainError::user_not_found(id))
    }

    #[instrument(
        name = "users_info.service.create",
        skip(self),
        fields(email = %new_user.email)
    )]
    pub async fn create(&self, new_user: NewUser) -> Result<User, DomainError> {
        let user = self.repo.insert(new_user).await?;

        info!(user_id = user.id, "Created user");
        Ok(user)
    }

    /// Returns `false` when no user has `id`.
    #[instrument(name = "users_info.service.update", skip(self), fields(user_id = id))]
    pub async fn update(&self, id: i64, changes: UserUpdate) -> Result<bool, DomainError> {
        let updated = self.repo.update(id, changes).await?.is_some();
        if updated {
            info!("Updated user");
        }
        Ok(updated)
    }

    /// Returns `false` when no user has `id`.
    #[instrument(name = "users_info.service.delete", skip(self), fields(user_id = id))]
    pub async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let deleted = self.repo.delete(id).await.map_err(storage)?;
        if deleted {
            info!("Deleted user");
        }
        Ok(deleted)
    }

    /// Case-insensitive; `exclude_id` lets an update keep its own email.
    #[instrument(name = "users_info.service.email_exists", skip(self))]
    pub async fn email_exists(
        &self,
        email: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, DomainError> {
        self.repo
            .email_exists(email, exclude_id)
            .await
            .map_err(storage)
    }
}
