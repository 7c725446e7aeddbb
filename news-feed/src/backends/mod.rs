pub mod rest;
pub mod sqlite;

pub use rest::RestStore;
pub use sqlite::SqliteStore;
