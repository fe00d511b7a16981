//! Role-based authorization.
//!
//! Each protected endpoint has an entry in [`ROUTE_ROLES`]. The guard looks up
//! the entry for the matched route and method and lets the request through when
//! the principal holds at least one of the listed roles. Routes without an entry
//! only require authentication.

use axum::{
    extract::{MatchedPath, Request},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::Error;
use crate::middleware::auth::Principal;

pub const ADMIN: &str = "admin";
pub const INSTRUCTOR: &str = "instructor";

/// `(method, route, roles)`; any one of `roles` grants access.
pub const ROUTE_ROLES: &[(&str, &str, &[&str])] = &[
    ("POST", "/users", &[ADMIN]),
    ("GET", "/users", &[ADMIN, INSTRUCTOR]),
    ("GET", "/users/:id", &[ADMIN, INSTRUCTOR]),
    ("PATCH", "/users/:id", &[ADMIN]),
    ("DELETE", "/users/:id", &[ADMIN]),
];

pub fn required_roles(method: &Method, route: &str) -> Option<&'static [&'static str]> {
    ROUTE_ROLES
        .iter()
        .find(|(m, r, _)| *m == method.as_str() && *r == route)
        .map(|(_, _, roles)| *roles)
}

pub fn authorize(principal: Option<&Principal>, required: Option<&[&str]>) -> bool {
    let Some(required) = required else {
        return true;
    };
    let Some(roles) = principal.and_then(|p| p.roles.as_ref()) else {
        return false;
    };
    roles.iter().any(|role| required.contains(&role.as_str()))
}

/// Must run after `require_bearer_auth`, which attaches the principal.
pub async fn enforce_route_roles(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let required = required_roles(req.method(), &route);

    if !authorize(req.extensions().get::<Principal>(), required) {
        tracing::warn!(method = %req.method(), route = %route, "forbidden");
        return Error::Forbidden("forbidden".to_string()).into_response();
    }
    next.run(req).await
}
