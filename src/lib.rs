pub mod accounts;
pub mod api;
pub mod blobstore;
pub mod config;
pub mod lifecycle;
pub mod notify;
pub mod promotion;
pub mod session_client;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use std::sync::Arc;

use crate::blobstore::BlobStore;
use crate::config::Config;
use crate::notify::Notifier;
use crate::storage::Database;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub blobs: Arc<dyn BlobStore>,
    pub config: Arc<Config>,
    pub db: Database,
    pub notifier: Arc<dyn Notifier>,
}
