//! Persistence implementations

pub mod correlation_repository;
pub mod database;
pub mod memory;

pub use correlation_repository::PgCorrelationStore;
pub use database::{create_pool, run_migrations, DatabaseConfig};
pub use memory::InMemoryCorrelationStore;
