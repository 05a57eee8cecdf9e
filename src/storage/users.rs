use redb::ReadableTable;

use super::db::{Database, StorageError};
use super::models::User;
use super::tables::*;

impl Database {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Store a user record, maintaining the unique email index
    pub fn put_user(&self, user: &User) -> Result<(), StorageError> {
        debug_assert!(!user.id.is_empty(), "user id must not be empty");
        debug_assert!(!user.email.is_empty(), "user email must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            let data = bincode::serialize(user)?;
            table.insert(user.id.as_str(), data.as_slice())?;

            let mut email_table = write_txn.open_table(USER_EMAILS)?;
            email_table.insert(user.email.as_str(), user.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a user by id
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        match table.get(user_id)? {
            Some(data) => {
                let user: User = bincode::deserialize(data.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Get a user by email (via the unique email index)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let user_id = {
            let read_txn = self.begin_read()?;
            let table = read_txn.open_table(USER_EMAILS)?;
            match table.get(email)? {
                Some(data) => data.value().to_string(),
                None => return Ok(None),
            }
        };
        self.get_user(&user_id)
    }

    /// Delete a user and their email index entry, returning the removed
    /// record if it existed. The caller is responsible for cleaning up
    /// the user's resources first.
    pub fn delete_user(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        let write_txn = self.begin_write()?;

        let user: Option<User> = {
            let table = write_txn.open_table(USERS)?;
            let result = table.get(user_id)?;
            match result {
                Some(data) => Some(bincode::deserialize(data.value())?),
                None => None,
            }
        };

        if let Some(ref user) = user {
            {
                let mut table = write_txn.open_table(USERS)?;
                table.remove(user_id)?;
            }
            {
                let mut email_table = write_txn.open_table(USER_EMAILS)?;
                email_table.remove(user.email.as_str())?;
            }
        }

        write_txn.commit()?;
        Ok(user)
    }

    /// Get every user record
    pub fn get_all_users(&self) -> Result<Vec<User>, StorageError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        let mut users = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let user: User = bincode::deserialize(value.value())?;
            users.push(user);
        }

        Ok(users)
    }

    /// Adjust a user's contribution counter inside a single write
    /// transaction (read-modify-write is safe here because redb
    /// serializes write transactions).
    pub fn adjust_contributions(&self, user_id: &str, delta: i64) -> Result<(), StorageError> {
        let write_txn = self.begin_write()?;
        {
            let current: Option<User> = {
                let table = write_txn.open_table(USERS)?;
                let result = table.get(user_id)?;
                match result {
                    Some(data) => Some(bincode::deserialize(data.value())?),
                    None => None,
                }
            };

            if let Some(mut user) = current {
                user.contributions = (user.contributions + delta).max(0);
                user.updated_at = chrono::Utc::now();
                let data = bincode::serialize(&user)?;
                let mut table = write_txn.open_table(USERS)?;
                table.insert(user_id, data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{make_user, setup_db};

    #[test]
    fn email_index_lookup() {
        let (db, _temp) = setup_db();
        db.put_user(&make_user("u1", "alice@campus.edu")).unwrap();

        let user = db.get_user_by_email("alice@campus.edu").unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert!(db.get_user_by_email("nobody@campus.edu").unwrap().is_none());
    }

    #[test]
    fn delete_cleans_email_index() {
        let (db, _temp) = setup_db();
        db.put_user(&make_user("u1", "alice@campus.edu")).unwrap();

        let removed = db.delete_user("u1").unwrap().unwrap();
        assert_eq!(removed.email, "alice@campus.edu");
        assert!(db.get_user("u1").unwrap().is_none());
        assert!(db.get_user_by_email("alice@campus.edu").unwrap().is_none());
    }

    #[test]
    fn contributions_never_go_negative() {
        let (db, _temp) = setup_db();
        db.put_user(&make_user("u1", "alice@campus.edu")).unwrap();

        db.adjust_contributions("u1", 2).unwrap();
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 2);

        db.adjust_contributions("u1", -5).unwrap();
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 0);

        // Missing user is a no-op.
        db.adjust_contributions("ghost", 1).unwrap();
    }
}
