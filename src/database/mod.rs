pub mod memory;
pub mod pool;
pub mod postgres;
pub mod repository;

pub use memory::InMemoryUserRepository;
pub use postgres::PgUserRepository;
pub use repository::{SortField, SortOrder, UserQuery, UserRepository};
