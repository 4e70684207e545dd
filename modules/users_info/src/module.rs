use std::sync::Arc;

use axum::Router;
use tracing::info;
use utoipa::OpenApi;

use crate::api::rest::{openapi::UsersApiDoc, routes};
use crate::config::{NameRules, UsersInfoConfig};
use crate::domain::repo::UsersRepository;
use crate::domain::service::Service;
use crate::infra::storage::InMemoryUsersRepository;

/// The users feature, wired: store → service → REST routes.
#[derive(Clone)]
pub struct UsersInfo {
    service: Arc<Service>,
    name_rules: NameRules,
}

impl UsersInfo {
    pub fn from_config(cfg: &UsersInfoConfig) -> Self {
        let repo = if cfg.seed_demo_users {
            InMemoryUsersRepository::with_demo_users()
        } else {
            InMemoryUsersRepository::new()
        };
        info!(
            seeded = cfg.seed_demo_users,
            users = repo.len(),
            "Initializing users_info module"
        );
        Self::with_repository(Arc::new(repo), cfg.name_rules())
    }

    pub fn with_repository(repo: Arc<dyn UsersRepository>, name_rules: NameRules) -> Self {
        Self {
            service: Arc::new(Service::new(repo)),
            name_rules,
        }
    }

    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    /// `router` with the users endpoints added.
    pub fn register_rest(&self, router: Router) -> Router {
        let router = routes::register_routes(router, self.service.clone(), self.name_rules);
        info!("Users REST routes registered successfully");
        router
    }

    pub fn openapi() -> utoipa::openapi::OpenApi {
        UsersApiDoc::openapi()
    }
}
