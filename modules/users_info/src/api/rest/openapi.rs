use utoipa::OpenApi;

use crate::api::rest::dto::{
    CreateUserReq, ErrorDto, InternalErrorDto, UpdateUserReq, UserDto, ValidationErrorDto,
};
use crate::api::rest::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "User Management API",
        description = "CRUD over users behind an API key"
    ),
    paths(
        handlers::list_users,
        handlers::list_active_users,
        handlers::get_user,
        handlers::create_user,
        handlers::update_user,
        handlers::delete_user,
        handlers::test_exception
    ),
    components(schemas(
        UserDto,
        CreateUserReq,
        UpdateUserReq,
        ErrorDto,
        ValidationErrorDto,
        InternalErrorDto
    )),
    tags((name = "users", description = "User management"))
)]
pub struct UsersApiDoc;
