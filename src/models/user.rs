use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::models::role::Role;

/// A persisted user together with its role set.
///
/// `password` holds the bcrypt hash. The type does not implement `Serialize`;
/// responses go through `UserResponse`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub profile_image: Option<String>,
    pub faculty: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub roles: Vec<Role>,
}

/// Row shape of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub profile_image: Option<String>,
    pub faculty: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn with_roles(self, roles: Vec<Role>) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            password: self.password,
            profile_image: self.profile_image,
            faculty: self.faculty,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            roles,
        }
    }
}

/// Values for a user that has not been inserted yet. `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub faculty: String,
    pub is_active: bool,
    pub roles: Vec<Role>,
}
