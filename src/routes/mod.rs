pub mod health;
pub mod users;

use axum::{routing::get, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::database::repository::{SortField, SortOrder};
use crate::dto::user_dto::{
    ChangePasswordPayload, CreateUserPayload, UpdateUserPayload, UserListResponse, UserResponse,
};
use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        users::create_user,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::change_password,
    ),
    components(schemas(
        CreateUserPayload,
        UpdateUserPayload,
        ChangePasswordPayload,
        UserResponse,
        UserListResponse,
        SortField,
        SortOrder,
    )),
    tags((name = "users", description = "User management"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(users::router(state.clone()))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
