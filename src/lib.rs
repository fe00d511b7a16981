pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::database::{repository::UserRepository, PgUserRepository};
use crate::services::user_service::UserService;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        Self::with_repository(
            Arc::new(PgUserRepository::new(pool)),
            &config.jwt_secret,
            config.bcrypt_cost,
        )
    }

    pub fn with_repository(
        repository: Arc<dyn UserRepository>,
        jwt_secret: &str,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            user_service: UserService::new(repository, bcrypt_cost),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
