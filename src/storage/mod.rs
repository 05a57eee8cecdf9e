pub mod db;
pub mod models;
pub mod resources;
pub mod tables;
pub mod users;

pub use db::{Database, StorageError};
