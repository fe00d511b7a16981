use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::database::repository::{SortField, SortOrder, UserQuery};
use crate::error::Error;
use crate::models::user::User;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    pub faculty: String,
    #[serde(default, deserialize_with = "deserialize_role_ids")]
    pub role_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub faculty: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_role_ids")]
    pub role_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    #[validate(length(min = 6))]
    pub current_password: String,
    #[validate(length(min = 6))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, IntoParams)]
#[serde(default, rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Page number, starting at 1
    pub page: Option<i64>,
    /// Items per page
    pub limit: Option<i64>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    /// Only users holding this role id
    pub filter_by_role: Option<i64>,
    /// Only users whose faculty equals this value exactly
    pub filter_by_faculty: Option<String>,
}

impl UserListQuery {
    /// Applies defaults. The requested `limit` is used as sent; values below 1
    /// are rejected.
    pub fn resolve(self) -> crate::error::Result<UserQuery> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit < 1 {
            return Err(Error::BadRequest("limit must be at least 1".to_string()));
        }
        Ok(UserQuery {
            page: self.page.unwrap_or(1).max(1),
            limit,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
            role_id: self.filter_by_role,
            faculty: self.filter_by_faculty,
        })
    }
}

/// Public view of a user. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub faculty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            faculty: value.faculty,
            profile_image: value.profile_image,
            is_active: value.is_active,
            roles: value.roles.into_iter().map(|r| r.name).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRoleId {
    Number(i64),
    Text(String),
}

/// Role ids arrive as numbers or numeric strings. Entries that are neither can
/// never match a role, so they are dropped here.
fn deserialize_role_ids<'de, D>(deserializer: D) -> Result<Option<Vec<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<RawRoleId>>::deserialize(deserializer)?;
    Ok(raw.map(|ids| {
        ids.into_iter()
            .filter_map(|id| match id {
                RawRoleId::Number(n) => Some(n),
                RawRoleId::Text(s) => s.trim().parse().ok(),
            })
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use serde_json::json;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "$2b$10$abcdefghijklmnopqrstuv".into(),
            profile_image: None,
            faculty: "CS".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
            roles: vec![Role::new(1, "admin"), Role::new(2, "instructor")],
        }
    }

    #[test]
    fn response_never_carries_password() {
        let value = serde_json::to_value(UserResponse::from(sample_user())).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("profileImage"));
        assert_eq!(value["roles"], json!(["admin", "instructor"]));
        assert_eq!(value["isActive"], json!(true));
    }

    #[test]
    fn role_ids_accept_numbers_and_numeric_strings() {
        let payload: CreateUserPayload = serde_json::from_value(json!({
            "name": "Ada",
            "email": "ada@example.com",
            "password": "secret1",
            "faculty": "CS",
            "roleIds": [1, "2", " 3 ", "admin"]
        }))
        .unwrap();
        assert_eq!(payload.role_ids, Some(vec![1, 2, 3]));
    }

    #[test]
    fn missing_role_ids_stay_absent() {
        let payload: UpdateUserPayload =
            serde_json::from_value(json!({ "name": "Grace" })).unwrap();
        assert_eq!(payload.role_ids, None);

        let payload: UpdateUserPayload = serde_json::from_value(json!({ "roleIds": [] })).unwrap();
        assert_eq!(payload.role_ids, Some(vec![]));
    }

    #[test]
    fn create_payload_rules() {
        let payload = CreateUserPayload {
            name: "".into(),
            email: "not-an-email".into(),
            password: "123".into(),
            faculty: "CS".into(),
            role_ids: None,
        };
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn single_letter_name_is_accepted() {
        let payload = CreateUserPayload {
            name: "A".into(),
            email: "a@x.com".into(),
            password: "secret1".into(),
            faculty: "CS".into(),
            role_ids: None,
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn list_query_defaults() {
        let query = UserListQuery::default().resolve().unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(query.sort_by, SortField::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Desc);

        let query = UserListQuery {
            page: Some(0),
            ..UserListQuery::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(query.page, 1);
    }

    #[test]
    fn list_query_keeps_requested_limit() {
        let query = UserListQuery {
            limit: Some(500),
            ..UserListQuery::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(query.limit, 500);

        let err = UserListQuery {
            limit: Some(0),
            ..UserListQuery::default()
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
