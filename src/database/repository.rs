//! Storage port for users and their roles.
//!
//! Services depend on [`UserRepository`] only; `PgUserRepository` backs it with
//! PostgreSQL and `InMemoryUserRepository` with a process-local map.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;
use crate::models::role::Role;
use crate::models::user::{NewUser, User};

/// Columns a user listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Id,
    Name,
    Email,
    Faculty,
    IsActive,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Name => "name",
            SortField::Email => "email",
            SortField::Faculty => "faculty",
            SortField::IsActive => "is_active",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum SortOrder {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[default]
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A resolved listing request: defaults applied, bounds checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub page: i64,
    pub limit: i64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub role_id: Option<i64>,
    pub faculty: Option<String>,
}

impl UserQuery {
    /// Saturates instead of overflowing, so a page far past the end is simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            role_id: None,
            faculty: None,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Round trip to the store, used by the health check.
    async fn ping(&self) -> Result<()>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Loads a user with its roles and each role's permissions.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Returns the subset of `ids` that name existing roles.
    async fn find_roles_by_ids(&self, ids: &[i64]) -> Result<Vec<Role>>;

    /// Inserts the user and its role links. A taken email yields `Error::Conflict`.
    async fn insert(&self, user: NewUser) -> Result<User>;

    /// Persists scalar fields and replaces the role set with `user.roles`.
    async fn save(&self, user: &User) -> Result<User>;

    /// Returns one page of users and the total number of matches.
    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, i64)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_zero_based() {
        let query = UserQuery {
            page: 3,
            limit: 10,
            ..UserQuery::default()
        };
        assert_eq!(query.offset(), 20);
        assert_eq!(UserQuery::default().offset(), 0);
    }

    #[test]
    fn offset_saturates_for_huge_pages() {
        let query = UserQuery {
            page: i64::MAX,
            limit: 10,
            ..UserQuery::default()
        };
        assert_eq!(query.offset(), i64::MAX);
    }

    #[test]
    fn sort_field_parses_camel_case() {
        let field: SortField = serde_json::from_str("\"createdAt\"").unwrap();
        assert_eq!(field, SortField::CreatedAt);
        assert_eq!(field.column(), "created_at");
        assert!(serde_json::from_str::<SortField>("\"password\"").is_err());
    }

    #[test]
    fn sort_order_accepts_either_case() {
        assert_eq!(serde_json::from_str::<SortOrder>("\"ASC\"").unwrap(), SortOrder::Asc);
        assert_eq!(serde_json::from_str::<SortOrder>("\"desc\"").unwrap(), SortOrder::Desc);
    }
}
