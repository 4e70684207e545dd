use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use tracing::{info, warn};

use api_ingress::AppError;

use crate::api::rest::dto::{
    CreateUserReq, ErrorDto, InternalErrorDto, UpdateUserReq, UserDto, ValidationErrorDto,
};
use crate::api::rest::extract::{UserId, ValidatedJson};
use crate::domain::error::DomainError;
use crate::domain::service::Service;

pub const USERS_PATH: &str = "/api/users";

fn users_dto(users: Vec<crate::contract::model::User>) -> Vec<UserDto> {
    users.into_iter().map(UserDto::from).collect()
}

/// List all users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "All users ordered by id", body = [UserDto]),
        (status = 401, description = "Missing or invalid API key", body = ErrorDto)
    )
)]
pub async fn list_users(
    Extension(svc): Extension<Arc<Service>>,
) -> Result<Json<Vec<UserDto>>, AppError> {
    info!("Listing all users");
    let users = users_dto(svc.list().await?);
    info!("Listed {} users", users.len());
    Ok(Json(users))
}

/// List active users
#[utoipa::path(
    get,
    path = "/api/users/active",
    tag = "users",
    responses(
        (status = 200, description = "Users with isActive = true, ordered by id", body = [UserDto]),
        (status = 401, description = "Missing or invalid API key", body = ErrorDto)
    )
)]
pub async fn list_active_users(
    Extension(svc): Extension<Arc<Service>>,
) -> Result<Json<Vec<UserDto>>, AppError> {
    Ok(Json(users_dto(svc.list_active().await?)))
}

/// Get a specific user by id
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserDto),
        (status = 404, description = "User does not exist", body = ErrorDto)
    )
)]
pub async fn get_user(
    Extension(svc): Extension<Arc<Service>>,
    UserId(id): UserId,
) -> Result<Json<UserDto>, AppError> {
    let user = svc.get(id).await?;
    Ok(Json(UserDto::from(user)))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = UserDto,
            headers(("Location" = String, description = "URL of the new user"))),
        (status = 400, description = "Invalid input", body = ValidationErrorDto),
        (status = 409, description = "Email already in use", body = ErrorDto)
    )
)]
pub async fn create_user(
    Extension(svc): Extension<Arc<Service>>,
    ValidatedJson(req): ValidatedJson<CreateUserReq>,
) -> Result<Response, AppError> {
    info!(email = %req.email, "Attempting to create user");

    if svc.email_exists(&req.email, None).await? {
        warn!(email = %req.email, "Create rejected, email already in use");
        return Err(DomainError::email_already_exists(req.email).into());
    }

    let user = svc.create(req.into()).await?;
    info!(email = %user.email, user_id = user.id, "User created");

    let location = format!("{USERS_PATH}/{}", user.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(UserDto::from(user)),
    )
        .into_response())
}

/// Replace the name, email and active flag of a user
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUserReq,
    responses(
        (status = 200, description = "Updated user", body = UserDto),
        (status = 400, description = "Invalid input", body = ValidationErrorDto),
        (status = 404, description = "User does not exist", body = ErrorDto),
        (status = 409, description = "Email used by another user", body = ErrorDto)
    )
)]
pub async fn update_user(
    Extension(svc): Extension<Arc<Service>>,
    UserId(id): UserId,
    ValidatedJson(req): ValidatedJson<UpdateUserReq>,
) -> Result<Json<UserDto>, AppError> {
    // 404 wins over 409.
    svc.get(id).await?;

    if svc.email_exists(&req.email, Some(id)).await? {
        warn!(user_id = id, email = %req.email, "Update rejected, email used by another user");
        return Err(AppError::conflict(format!(
            "Email '{}' is already in use by another user.",
            req.email
        )));
    }

    if !svc.update(id, req.into()).await? {
        return Err(DomainError::user_not_found(id).into());
    }

    let user = svc.get(id).await?;
    Ok(Json(UserDto::from(user)))
}

/// Delete a user by id
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User does not exist", body = ErrorDto)
    )
)]
pub async fn delete_user(
    Extension(svc): Extension<Arc<Service>>,
    UserId(id): UserId,
) -> Result<StatusCode, AppError> {
    info!(user_id = id, "Attempting to delete user");

    if !svc.delete(id).await? {
        warn!(user_id = id, "Delete failed, user does not exist");
        return Err(DomainError::user_not_found(id).into());
    }

    info!(user_id = id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Always fails; exercises the unhandled-error path
#[utoipa::path(
    get,
    path = "/api/users/test-exception",
    tag = "users",
    responses(
        (status = 500, description = "Unhandled failure", body = InternalErrorDto)
    )
)]
pub async fn test_exception() -> Result<StatusCode, AppError> {
    Err(AppError::internal(anyhow::anyhow!(
        "This is a test exception to verify the global exception handling middleware"
    )))
}
