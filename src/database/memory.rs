use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::database::repository::{SortField, SortOrder, UserQuery, UserRepository};
use crate::error::{Error, Result};
use crate::models::role::Role;
use crate::models::user::{NewUser, User};

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    users: BTreeMap<i64, StoredUser>,
    roles: BTreeMap<i64, Role>,
}

/// Users keep role ids only, like the `user_roles` join table.
#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    role_ids: Vec<i64>,
}

impl Store {
    fn hydrate(&self, stored: &StoredUser) -> User {
        let mut user = stored.user.clone();
        user.roles = stored
            .role_ids
            .iter()
            .filter_map(|id| self.roles.get(id).cloned())
            .collect();
        user
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|s| s.user.email == email && Some(s.user.id) != except)
    }
}

/// Process-local [`UserRepository`] with the same observable behaviour as the
/// PostgreSQL one. Roles are seeded up front with [`InMemoryUserRepository::with_roles`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryUserRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let store = Store {
            roles: roles.into_iter().map(|r| (r.id, r)).collect(),
            ..Store::default()
        };
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn insert_role(&self, role: Role) {
        let mut store = self.store.lock().await;
        store.roles.insert(role.id, role);
    }
}

fn compare(a: &User, b: &User, field: SortField) -> std::cmp::Ordering {
    let primary = match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Name => a.name.cmp(&b.name),
        SortField::Email => a.email.cmp(&b.email),
        SortField::Faculty => a.faculty.cmp(&b.faculty),
        SortField::IsActive => a.is_active.cmp(&b.is_active),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let store = self.store.lock().await;
        Ok(store
            .users
            .values()
            .find(|s| s.user.email == email)
            .map(|s| store.hydrate(s)))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let store = self.store.lock().await;
        Ok(store.users.get(&id).map(|s| store.hydrate(s)))
    }

    async fn find_roles_by_ids(&self, ids: &[i64]) -> Result<Vec<Role>> {
        let store = self.store.lock().await;
        Ok(store
            .roles
            .values()
            .filter(|r| ids.contains(&r.id))
            .map(|r| Role {
                permissions: Vec::new(),
                ..r.clone()
            })
            .collect())
    }

    async fn insert(&self, new_user: NewUser) -> Result<User> {
        let mut store = self.store.lock().await;
        if store.email_taken(&new_user.email, None) {
            return Err(Error::Conflict("Email already exists".to_string()));
        }

        store.next_id += 1;
        let now = Utc::now();
        let mut role_ids: Vec<i64> = new_user.roles.iter().map(|r| r.id).collect();
        role_ids.sort_unstable();
        role_ids.dedup();
        let stored = StoredUser {
            user: User {
                id: store.next_id,
                name: new_user.name,
                email: new_user.email,
                password: new_user.password,
                profile_image: None,
                faculty: new_user.faculty,
                is_active: new_user.is_active,
                created_at: now,
                updated_at: now,
                roles: Vec::new(),
            },
            role_ids,
        };
        let user = store.hydrate(&stored);
        store.users.insert(user.id, stored);
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<User> {
        let mut store = self.store.lock().await;
        if !store.users.contains_key(&user.id) {
            return Err(Error::NotFound("Resource not found".to_string()));
        }
        if store.email_taken(&user.email, Some(user.id)) {
            return Err(Error::Conflict("Email already exists".to_string()));
        }

        let mut updated = user.clone();
        updated.roles = Vec::new();
        updated.updated_at = Utc::now();
        let mut role_ids: Vec<i64> = user.roles.iter().map(|r| r.id).collect();
        role_ids.sort_unstable();
        role_ids.dedup();
        let stored = StoredUser {
            user: updated,
            role_ids,
        };
        let saved = store.hydrate(&stored);
        store.users.insert(user.id, stored);
        Ok(saved)
    }

    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, i64)> {
        let store = self.store.lock().await;
        let mut matches: Vec<User> = store
            .users
            .values()
            .filter(|s| query.role_id.map_or(true, |id| s.role_ids.contains(&id)))
            .filter(|s| {
                query
                    .faculty
                    .as_deref()
                    .map_or(true, |f| s.user.faculty == f)
            })
            .map(|s| store.hydrate(s))
            .collect();

        matches.sort_by(|a, b| {
            let ord = compare(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(query.offset().max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, roles: Vec<Role>) -> NewUser {
        NewUser {
            name: "Someone".into(),
            email: email.into(),
            password: "hash".into(),
            faculty: "CS".into(),
            is_active: true,
            roles,
        }
    }

    #[tokio::test]
    async fn unknown_role_ids_are_ignored() {
        let repo = InMemoryUserRepository::with_roles([Role::new(1, "admin")]);
        let roles = repo.find_roles_by_ids(&[1, 7]).await.unwrap();
        assert_eq!(roles, vec![Role::new(1, "admin")]);
    }

    #[tokio::test]
    async fn save_rejects_taken_email_and_missing_user() {
        let repo = InMemoryUserRepository::new();
        repo.insert(new_user("a@x.com", vec![])).await.unwrap();
        let mut b = repo.insert(new_user("b@x.com", vec![])).await.unwrap();

        b.email = "a@x.com".into();
        assert!(matches!(repo.save(&b).await, Err(Error::Conflict(_))));

        b.id = 42;
        assert!(matches!(repo.save(&b).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn inserted_role_can_be_assigned() {
        let repo = InMemoryUserRepository::new();
        repo.insert_role(Role::new(5, "mentor")).await;
        let roles = repo.find_roles_by_ids(&[5]).await.unwrap();
        let user = repo.insert(new_user("m@x.com", roles)).await.unwrap();

        let loaded = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.roles[0].name, "mentor");
    }
}
