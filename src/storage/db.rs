use redb::{Database as RedbDatabase, ReadTransaction, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// Embedded redb database. Cheap to clone; all clones share the same
/// underlying store.
#[derive(Clone)]
pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("studyshelf.redb");
        let db = RedbDatabase::create(db_path)?;

        // Create tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
            let _ = write_txn.open_table(RESOURCES)?;
            let _ = write_txn.open_table(OWNER_RESOURCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, StorageError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, StorageError> {
        Ok(self.db.begin_write()?)
    }
}
