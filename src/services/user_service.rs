use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::database::repository::UserRepository;
use crate::dto::user_dto::{
    CreateUserPayload, UpdateUserPayload, UserListQuery, UserListResponse, UserResponse,
};
use crate::error::{Error, Result};
use crate::models::role::Role;
use crate::models::user::{NewUser, User};
use crate::utils::crypto;

#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    hash_cost: u32,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, hash_cost: u32) -> Self {
        Self {
            repository,
            hash_cost,
        }
    }

    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.repository
    }

    #[instrument(skip(self, payload), fields(email = %payload.email))]
    pub async fn create(&self, payload: CreateUserPayload) -> Result<UserResponse> {
        if self
            .repository
            .find_by_email(&payload.email)
            .await?
            .is_some()
        {
            return Err(Error::Conflict("Email already exists".to_string()));
        }

        let password = self.hash(payload.password).await?;
        let roles = self.resolve_roles(payload.role_ids.as_deref()).await?;

        let user = self
            .repository
            .insert(NewUser {
                name: payload.name,
                email: payload.email,
                password,
                faculty: payload.faculty,
                is_active: true,
                roles,
            })
            .await?;

        info!(user_id = user.id, "created user");
        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn find_all(&self, query: UserListQuery) -> Result<UserListResponse> {
        let query = query.resolve()?;
        let (users, total) = self.repository.list(&query).await?;

        Ok(UserListResponse {
            items: users.into_iter().map(Into::into).collect(),
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    #[instrument(skip(self))]
    pub async fn find_one(&self, id: i64) -> Result<UserResponse> {
        Ok(self.load(id).await?.into())
    }

    #[instrument(skip(self, payload))]
    pub async fn update(&self, id: i64, payload: UpdateUserPayload) -> Result<UserResponse> {
        let mut user = self.load(id).await?;

        if let Some(role_ids) = payload.role_ids.as_deref() {
            user.roles = self.resolve_roles(Some(role_ids)).await?;
        }
        if let Some(name) = payload.name {
            user.name = name;
        }
        if let Some(profile_image) = payload.profile_image {
            user.profile_image = Some(profile_image);
        }
        if let Some(faculty) = payload.faculty {
            user.faculty = faculty;
        }
        if let Some(is_active) = payload.is_active {
            user.is_active = is_active;
        }

        let saved = self.repository.save(&user).await?;
        info!(user_id = id, "updated user");
        Ok(saved.into())
    }

    /// Soft delete: the row stays, `is_active` becomes false.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: i64) -> Result<()> {
        let mut user = self.load(id).await?;
        user.is_active = false;
        self.repository.save(&user).await?;
        info!(user_id = id, "deactivated user");
        Ok(())
    }

    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        id: i64,
        current_password: String,
        new_password: String,
    ) -> Result<()> {
        let mut user = self.load(id).await?;

        if !self.verify(current_password, user.password.clone()).await? {
            warn!(user_id = id, "password change rejected");
            return Err(Error::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        user.password = self.hash(new_password).await?;
        self.repository.save(&user).await?;
        info!(user_id = id, "changed password");
        Ok(())
    }

    /// Checks credentials for an active user. The login flow that issues
    /// tokens lives outside this service.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: String) -> Result<UserResponse> {
        let invalid = || Error::Unauthorized("Invalid email or password".to_string());

        let user = self
            .repository
            .find_by_email(email)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(invalid)?;

        if !self.verify(password, user.password.clone()).await? {
            return Err(invalid());
        }
        Ok(user.into())
    }

    async fn load(&self, id: i64) -> Result<User> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("User with ID {} not found", id)))
    }

    async fn resolve_roles(&self, role_ids: Option<&[i64]>) -> Result<Vec<Role>> {
        match role_ids {
            Some(ids) if !ids.is_empty() => self.repository.find_roles_by_ids(ids).await,
            _ => Ok(Vec::new()),
        }
    }

    async fn hash(&self, plain: String) -> Result<String> {
        let cost = self.hash_cost;
        let hashed = tokio::task::spawn_blocking(move || crypto::hash_password(&plain, cost))
            .await
            .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))??;
        Ok(hashed)
    }

    async fn verify(&self, plain: String, hashed: String) -> Result<bool> {
        let ok = tokio::task::spawn_blocking(move || crypto::verify_password(&plain, &hashed))
            .await
            .map_err(|e| Error::Internal(format!("Password verification task failed: {}", e)))??;
        Ok(ok)
    }
}
