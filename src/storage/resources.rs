use redb::ReadableTable;

use super::db::{Database, StorageError};
use super::models::{ModerationStatus, Resource, ResourceKind, User};
use super::tables::*;

/// Apply a contribution delta to a user inside an already-open write
/// transaction, clamped at zero. A missing user is a no-op.
fn bump_contributions(
    write_txn: &redb::WriteTransaction,
    owner_id: &str,
    delta: i64,
) -> Result<(), StorageError> {
    let current: Option<User> = {
        let table = write_txn.open_table(USERS)?;
        let result = table.get(owner_id)?;
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
        table.insert(owner_id, data.as_slice())?;
    }
    Ok(())
}

/// Result of a conditional status transition.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// The mutation was applied and committed; the updated record is returned.
    Applied(Resource),
    /// No resource with that id exists.
    NotFound,
    /// The resource exists but is not in the expected status.
    WrongStatus(ModerationStatus),
}

impl Database {
    // ========================================================================
    // Resource operations
    // ========================================================================

    /// Store a resource record
    pub fn put_resource(&self, resource: &Resource) -> Result<(), StorageError> {
        debug_assert!(!resource.id.is_empty(), "resource id must not be empty");
        debug_assert!(
            !resource.owner_id.is_empty(),
            "resource owner_id must not be empty"
        );

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(RESOURCES)?;
            let data = bincode::serialize(resource)?;
            table.insert(resource.id.as_str(), data.as_slice())?;

            // Update owner_resources index
            let mut index_table = write_txn.open_table(OWNER_RESOURCES)?;
            let mut ids: Vec<String> = index_table
                .get(resource.owner_id.as_str())?
                .map(|v| bincode::deserialize(v.value()))
                .transpose()?
                .unwrap_or_default();

            if !ids.contains(&resource.id) {
                ids.push(resource.id.clone());
                let index_data = bincode::serialize(&ids)?;
                index_table.insert(resource.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a resource by id
    pub fn get_resource(&self, resource_id: &str) -> Result<Option<Resource>, StorageError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(RESOURCES)?;

        match table.get(resource_id)? {
            Some(data) => {
                let resource: Resource = bincode::deserialize(data.value())?;
                Ok(Some(resource))
            }
            None => Ok(None),
        }
    }

    /// Delete a resource, returning the removed record if it existed
    pub fn delete_resource(&self, resource_id: &str) -> Result<Option<Resource>, StorageError> {
        let write_txn = self.begin_write()?;

        // First, get the resource for index cleanup
        let resource: Option<Resource> = {
            let table = write_txn.open_table(RESOURCES)?;
            let result = table.get(resource_id)?;
            match result {
                Some(data) => Some(bincode::deserialize(data.value())?),
                None => None,
            }
        };

        if let Some(ref resource) = resource {
            {
                let mut table = write_txn.open_table(RESOURCES)?;
                table.remove(resource_id)?;
            }

            // Update owner_resources index
            let ids: Option<Vec<String>> = {
                let index_table = write_txn.open_table(OWNER_RESOURCES)?;
                let result = index_table.get(resource.owner_id.as_str())?;
                match result {
                    Some(data) => Some(bincode::deserialize(data.value())?),
                    None => None,
                }
            };

            if let Some(mut ids) = ids {
                ids.retain(|id| id != resource_id);
                let mut index_table = write_txn.open_table(OWNER_RESOURCES)?;
                if ids.is_empty() {
                    index_table.remove(resource.owner_id.as_str())?;
                } else {
                    let new_index_data = bincode::serialize(&ids)?;
                    index_table.insert(resource.owner_id.as_str(), new_index_data.as_slice())?;
                }
            }
        }

        write_txn.commit()?;
        Ok(resource)
    }

    /// Conditionally mutate a resource inside a single write transaction.
    ///
    /// The mutation is applied only when the current status equals
    /// `expected`; two concurrent transitions on the same record
    /// therefore serialize through the write transaction and exactly one
    /// of them observes the expected status. The loser gets
    /// [`TransitionOutcome::WrongStatus`] instead of silently
    /// overwriting the first write. The closure returns a contribution
    /// delta for the owner, applied in the same transaction so the
    /// counter and the status never commit separately.
    pub fn transition_resource<F>(
        &self,
        resource_id: &str,
        expected: ModerationStatus,
        mutate: F,
    ) -> Result<TransitionOutcome, StorageError>
    where
        F: FnOnce(&mut Resource) -> i64,
    {
        let write_txn = self.begin_write()?;

        let current: Option<Resource> = {
            let table = write_txn.open_table(RESOURCES)?;
            let result = table.get(resource_id)?;
            match result {
                Some(data) => Some(bincode::deserialize(data.value())?),
                None => None,
            }
        };

        let outcome = match current {
            None => TransitionOutcome::NotFound,
            Some(resource) if resource.status != expected => {
                TransitionOutcome::WrongStatus(resource.status)
            }
            Some(mut resource) => {
                let delta = mutate(&mut resource);
                resource.updated_at = chrono::Utc::now();
                let data = bincode::serialize(&resource)?;
                {
                    let mut table = write_txn.open_table(RESOURCES)?;
                    table.insert(resource_id, data.as_slice())?;
                }
                if delta != 0 {
                    bump_contributions(&write_txn, &resource.owner_id, delta)?;
                }
                TransitionOutcome::Applied(resource)
            }
        };

        write_txn.commit()?;
        Ok(outcome)
    }

    /// Mutate a resource in place inside a single write transaction.
    ///
    /// Unconditional companion to [`Database::transition_resource`]: the
    /// closure sees the committed record, so decisions such as "was this
    /// approved" cannot be made against a stale read, and the returned
    /// contribution delta lands in the same transaction. Returns `None`
    /// when the resource no longer exists.
    pub fn update_resource_with<F>(
        &self,
        resource_id: &str,
        mutate: F,
    ) -> Result<Option<Resource>, StorageError>
    where
        F: FnOnce(&mut Resource) -> i64,
    {
        let write_txn = self.begin_write()?;

        let current: Option<Resource> = {
            let table = write_txn.open_table(RESOURCES)?;
            let result = table.get(resource_id)?;
            match result {
                Some(data) => Some(bincode::deserialize(data.value())?),
                None => None,
            }
        };

        let updated = match current {
            None => None,
            Some(mut resource) => {
                let delta = mutate(&mut resource);
                resource.updated_at = chrono::Utc::now();
                let data = bincode::serialize(&resource)?;
                {
                    let mut table = write_txn.open_table(RESOURCES)?;
                    table.insert(resource_id, data.as_slice())?;
                }
                if delta != 0 {
                    bump_contributions(&write_txn, &resource.owner_id, delta)?;
                }
                Some(resource)
            }
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Get all resources of a kind with the given status, newest first
    pub fn get_resources_by_status(
        &self,
        kind: ResourceKind,
        status: ModerationStatus,
    ) -> Result<Vec<Resource>, StorageError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(RESOURCES)?;

        let mut resources = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let resource: Resource = bincode::deserialize(value.value())?;
            if resource.kind == kind && resource.status == status {
                resources.push(resource);
            }
        }

        resources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(resources)
    }

    /// Get all of an owner's resources, optionally filtered by kind,
    /// newest first, regardless of moderation state
    pub fn get_resources_by_owner(
        &self,
        owner_id: &str,
        kind: Option<ResourceKind>,
    ) -> Result<Vec<Resource>, StorageError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(OWNER_RESOURCES)?;
        let resources_table = read_txn.open_table(RESOURCES)?;

        let ids: Vec<String> = match index_table.get(owner_id)? {
            Some(data) => bincode::deserialize(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut resources = Vec::new();
        for id in ids {
            if let Some(data) = resources_table.get(id.as_str())? {
                let resource: Resource = bincode::deserialize(data.value())?;
                if kind.is_none() || kind == Some(resource.kind) {
                    resources.push(resource);
                }
            }
        }

        resources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::FileRef;
    use crate::testutil::setup_db;
    use chrono::Utc;

    fn make_resource(id: &str, owner: &str, kind: ResourceKind) -> Resource {
        let now = Utc::now();
        Resource {
            approved_at: None,
            approved_by: None,
            course_code: "CSE101".to_string(),
            course_name: "Data Structures".to_string(),
            created_at: now,
            file: FileRef {
                blob_id: format!("blob-{id}"),
                url: format!("https://blobs.example/{id}"),
            },
            id: id.to_string(),
            kind,
            owner_id: owner.to_string(),
            program: "B.Tech CSE".to_string(),
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            semester: 3,
            status: ModerationStatus::Pending,
            title: format!("Resource {id}"),
            updated_at: now,
            year: None,
        }
    }

    #[test]
    fn put_get_delete_round_trip() {
        let (db, _temp) = setup_db();
        let resource = make_resource("r1", "u1", ResourceKind::Note);

        db.put_resource(&resource).unwrap();
        let fetched = db.get_resource("r1").unwrap().unwrap();
        assert_eq!(fetched.title, "Resource r1");

        let removed = db.delete_resource("r1").unwrap().unwrap();
        assert_eq!(removed.id, "r1");
        assert!(db.get_resource("r1").unwrap().is_none());
        assert!(db.delete_resource("r1").unwrap().is_none());
    }

    #[test]
    fn owner_index_tracks_membership() {
        let (db, _temp) = setup_db();
        db.put_resource(&make_resource("r1", "u1", ResourceKind::Note))
            .unwrap();
        db.put_resource(&make_resource("r2", "u1", ResourceKind::Pyq))
            .unwrap();
        db.put_resource(&make_resource("r3", "u2", ResourceKind::Note))
            .unwrap();

        assert_eq!(db.get_resources_by_owner("u1", None).unwrap().len(), 2);
        assert_eq!(
            db.get_resources_by_owner("u1", Some(ResourceKind::Note))
                .unwrap()
                .len(),
            1
        );

        db.delete_resource("r1").unwrap();
        assert_eq!(db.get_resources_by_owner("u1", None).unwrap().len(), 1);
    }

    #[test]
    fn transition_applies_only_on_expected_status() {
        let (db, _temp) = setup_db();
        db.put_resource(&make_resource("r1", "u1", ResourceKind::Note))
            .unwrap();

        let outcome = db
            .transition_resource("r1", ModerationStatus::Pending, |r| {
                r.status = ModerationStatus::Approved;
                0
            })
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::Applied(_)));

        // Second transition finds the record already approved.
        let outcome = db
            .transition_resource("r1", ModerationStatus::Pending, |r| {
                r.status = ModerationStatus::Rejected;
                0
            })
            .unwrap();
        assert!(matches!(
            outcome,
            TransitionOutcome::WrongStatus(ModerationStatus::Approved)
        ));

        let outcome = db
            .transition_resource("missing", ModerationStatus::Pending, |_| 0)
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::NotFound));
    }

    #[test]
    fn transition_delta_lands_with_the_status_change() {
        let (db, _temp) = setup_db();
        db.put_user(&crate::testutil::make_user("u1", "alice@campus.edu"))
            .unwrap();
        db.put_resource(&make_resource("r1", "u1", ResourceKind::Note))
            .unwrap();

        db.transition_resource("r1", ModerationStatus::Pending, |r| {
            r.status = ModerationStatus::Approved;
            1
        })
        .unwrap();
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 1);
    }

    #[test]
    fn update_with_decides_delta_from_committed_status() {
        let (db, _temp) = setup_db();
        db.put_user(&crate::testutil::make_user("u1", "alice@campus.edu"))
            .unwrap();
        db.put_resource(&make_resource("r1", "u1", ResourceKind::Note))
            .unwrap();

        db.transition_resource("r1", ModerationStatus::Pending, |r| {
            r.status = ModerationStatus::Approved;
            1
        })
        .unwrap();

        // The closure reads the approved status inside the transaction
        // and hands back the matching decrement.
        let updated = db
            .update_resource_with("r1", |r| {
                let was_approved = r.status == ModerationStatus::Approved;
                r.status = ModerationStatus::Pending;
                if was_approved {
                    -1
                } else {
                    0
                }
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ModerationStatus::Pending);
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 0);

        assert!(db.update_resource_with("missing", |_| 0).unwrap().is_none());
    }

    #[test]
    fn status_listing_filters_by_kind() {
        let (db, _temp) = setup_db();
        db.put_resource(&make_resource("r1", "u1", ResourceKind::Note))
            .unwrap();
        db.put_resource(&make_resource("r2", "u1", ResourceKind::Pyq))
            .unwrap();

        let pending = db
            .get_resources_by_status(ResourceKind::Note, ModerationStatus::Pending)
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "r1");
        assert!(db
            .get_resources_by_status(ResourceKind::Note, ModerationStatus::Approved)
            .unwrap()
            .is_empty());
    }
}
