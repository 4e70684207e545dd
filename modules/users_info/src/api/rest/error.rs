use api_ingress::AppError;

use crate::domain::error::DomainError;

/// Map a domain error onto the HTTP error shapes served by the ingress.
pub fn map_domain_error(e: DomainError) -> AppError {
    match e {
        DomainError::UserNotFound { .. } => AppError::not_found(e.to_string()),
        DomainError::EmailAlreadyExists { .. } => AppError::conflict(e.to_string()),
        DomainError::Storage { message } => AppError::internal(anyhow::anyhow!(message)),
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        map_domain_error(e)
    }
}
