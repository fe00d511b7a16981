use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Extension, Router,
};

use crate::{
    dto::user_dto::{
        ChangePasswordPayload, CreateUserPayload, UpdateUserPayload, UserListQuery,
        UserListResponse, UserResponse,
    },
    error::{Error, Result},
    middleware::{auth, auth::Principal, guard},
    utils::validation::{ApiPath, ApiQuery, ValidatedJson},
    AppState,
};

/// The `/users` endpoints behind bearer authentication and the role guard.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/:id/change-password", patch(change_password))
        .route_layer(from_fn(guard::enforce_route_roles))
        .route_layer(from_fn_with_state(state, auth::require_bearer_auth))
}

/// Error translation for mutating endpoints: duplicate email and other
/// failures surface as 400, missing users as 404.
fn client_error(err: Error) -> Error {
    match err {
        Error::NotFound(_) | Error::BadRequest(_) | Error::Validation(_) => err,
        Error::Conflict(msg) => Error::BadRequest(msg),
        other => {
            tracing::warn!(error = %other, "user operation failed");
            Error::BadRequest(other.client_message())
        }
    }
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid payload or email already exists"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin role required")
    )
)]
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserPayload>,
) -> Result<impl IntoResponse> {
    let user = state
        .user_service
        .create(payload)
        .await
        .map_err(client_error)?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(UserListQuery),
    responses(
        (status = 200, description = "One page of users", body = UserListResponse),
        (status = 403, description = "Admin or instructor role required")
    )
)]
#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Result<impl IntoResponse> {
    let result = state.user_service.find_all(query).await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.find_one(id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UpdateUserPayload,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateUserPayload>,
) -> Result<impl IntoResponse> {
    tracing::info!(actor = %principal.id, user_id = id, "update requested");
    let user = state
        .user_service
        .update(id, payload)
        .await
        .map_err(client_error)?;
    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deactivated"),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse> {
    tracing::info!(actor = %principal.id, user_id = id, "deactivation requested");
    state
        .user_service
        .remove(id)
        .await
        .map_err(client_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/users/{id}/change-password",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = ChangePasswordPayload,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid payload or current password is incorrect"),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<ChangePasswordPayload>,
) -> Result<impl IntoResponse> {
    state
        .user_service
        .change_password(id, payload.current_password, payload.new_password)
        .await
        .map_err(client_error)?;
    Ok(StatusCode::NO_CONTENT)
}
