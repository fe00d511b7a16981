#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use lms_backend::{
    database::InMemoryUserRepository,
    dto::user_dto::{CreateUserPayload, UserResponse},
    middleware::auth::Claims,
    models::role::Role,
    routes, AppState,
};
use serde_json::Value as JsonValue;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test_secret_key";
pub const TEST_HASH_COST: u32 = 4;

pub const ADMIN_ROLE_ID: i64 = 1;
pub const INSTRUCTOR_ROLE_ID: i64 = 2;
pub const STUDENT_ROLE_ID: i64 = 3;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub repo: InMemoryUserRepository,
}

pub fn setup_app() -> TestApp {
    let repo = InMemoryUserRepository::with_roles([
        Role::new(ADMIN_ROLE_ID, "admin"),
        Role::new(INSTRUCTOR_ROLE_ID, "instructor"),
        Role::new(STUDENT_ROLE_ID, "student"),
    ]);
    let state = AppState::with_repository(Arc::new(repo.clone()), JWT_SECRET, TEST_HASH_COST);
    TestApp {
        app: routes::build_router(state.clone()),
        state,
        repo,
    }
}

pub fn token_with_roles(roles: Option<&[&str]>) -> String {
    let claims = Claims {
        sub: "1".into(),
        email: Some("principal@test.com".into()),
        roles: roles.map(|r| r.iter().map(|s| s.to_string()).collect()),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

pub fn admin_token() -> String {
    token_with_roles(Some(&["admin"]))
}

pub fn instructor_token() -> String {
    token_with_roles(Some(&["instructor"]))
}

pub fn student_token() -> String {
    token_with_roles(Some(&["student"]))
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }

    pub async fn seed_user(
        &self,
        name: &str,
        email: &str,
        faculty: &str,
        role_ids: &[i64],
    ) -> UserResponse {
        self.state
            .user_service
            .create(CreateUserPayload {
                name: name.into(),
                email: email.into(),
                password: "password123".into(),
                faculty: faculty.into(),
                role_ids: Some(role_ids.to_vec()),
            })
            .await
            .expect("seed user")
    }
}

/// Walks a JSON value and reports whether any object has a `password` key.
pub fn contains_password_key(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => {
            map.contains_key("password") || map.values().any(contains_password_key)
        }
        JsonValue::Array(items) => items.iter().any(contains_password_key),
        _ => false,
    }
}
