pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, ping, table_exists, DbPool};
pub use repositories::{InMemoryRequestRepository, RepositoryError, SqlRequestRepository};
