//! Persistence layer: the `Storage` trait and its libSQL backend.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibsqlStorage;
pub use traits::Storage;
