//! The resource moderation lifecycle.
//!
//! One state machine shared by notes, PYQs, and syllabi: resources are
//! created `pending`, a moderator moves them to `approved` or
//! `rejected`, and only approved resources are publicly visible.
//! Kind-specific behavior is limited to metadata validation (PYQs carry
//! an exam year), so the whole lifecycle is parameterized by
//! [`ResourceKind`] instead of being duplicated per collection.
//!
//! Policy notes:
//! - Any successful edit resets the resource to `pending` and clears
//!   both review field groups. Edited content is always re-reviewed,
//!   and a rejected resource is resubmitted by editing it.
//! - The owner's contribution counter tracks the number of their
//!   currently approved resources: +1 on approve, -1 whenever an
//!   approved resource is deleted or edited back to pending.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use thiserror::Error;

use crate::blobstore::{BlobStore, BlobStoreError};
use crate::notify::{dispatch, Notification, Notifier};
use crate::storage::models::{FileRef, ModerationStatus, Resource, ResourceKind};
use crate::storage::resources::TransitionOutcome;
use crate::storage::{Database, StorageError};

pub const TITLE_MIN: usize = 2;
pub const TITLE_MAX: usize = 100;
pub const PROGRAM_MIN: usize = 2;
pub const PROGRAM_MAX: usize = 100;
pub const COURSE_CODE_MIN: usize = 2;
pub const COURSE_CODE_MAX: usize = 20;
pub const COURSE_NAME_MIN: usize = 2;
pub const COURSE_NAME_MAX: usize = 100;
pub const SEMESTER_MIN: u8 = 1;
pub const SEMESTER_MAX: u8 = 12;
pub const REJECTION_REASON_MIN: usize = 10;

/// How many years back a PYQ exam year may reach.
const YEAR_WINDOW: i32 = 15;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Blob store failure: {0}")]
    Blob(#[from] BlobStoreError),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Resource not found")]
    NotFound,
    #[error("Database failure: {0}")]
    Storage(#[from] StorageError),
    #[error("Validation failed")]
    Validation(Vec<FieldIssue>),
}

/// Metadata supplied on create and edit.
#[derive(Debug, Clone)]
pub struct ResourceMetadata {
    pub course_code: String,
    pub course_name: String,
    pub program: String,
    pub semester: u8,
    pub title: String,
    /// Exam year; required for PYQs, ignored for other kinds.
    pub year: Option<String>,
}

/// Moderator decision on a pending resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// A pending resource joined with minimal owner identity for review context.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResource {
    pub owner_email: String,
    pub owner_name: String,
    #[serde(flatten)]
    pub resource: Resource,
}

/// Search parameters; all filters are ANDed with the text query.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub course_code: Option<String>,
    pub program: Option<String>,
    pub query: Option<String>,
    pub semester: Option<u8>,
    pub year: Option<String>,
}

// ============================================================================
// Validation
// ============================================================================

fn check_len(
    issues: &mut Vec<FieldIssue>,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len < min {
        issues.push(FieldIssue {
            field,
            message: format!("{field} must be at least {min} characters"),
        });
    } else if len > max {
        issues.push(FieldIssue {
            field,
            message: format!("{field} must be at most {max} characters"),
        });
    }
}

/// Exam years accepted for PYQ uploads: the current year and the
/// `YEAR_WINDOW` years before it.
pub fn allowed_years() -> Vec<String> {
    let current = Utc::now().year();
    ((current - YEAR_WINDOW)..=current)
        .rev()
        .map(|y| y.to_string())
        .collect()
}

/// Validate metadata for the given kind, returning all issues at once.
pub fn validate_metadata(
    kind: ResourceKind,
    metadata: &ResourceMetadata,
) -> Result<(), LifecycleError> {
    let mut issues = Vec::new();

    check_len(&mut issues, "title", &metadata.title, TITLE_MIN, TITLE_MAX);
    check_len(
        &mut issues,
        "program",
        &metadata.program,
        PROGRAM_MIN,
        PROGRAM_MAX,
    );
    check_len(
        &mut issues,
        "courseCode",
        &metadata.course_code,
        COURSE_CODE_MIN,
        COURSE_CODE_MAX,
    );
    check_len(
        &mut issues,
        "courseName",
        &metadata.course_name,
        COURSE_NAME_MIN,
        COURSE_NAME_MAX,
    );

    if !(SEMESTER_MIN..=SEMESTER_MAX).contains(&metadata.semester) {
        issues.push(FieldIssue {
            field: "semester",
            message: format!("semester must be between {SEMESTER_MIN} and {SEMESTER_MAX}"),
        });
    }

    if kind == ResourceKind::Pyq {
        match metadata.year.as_deref().map(str::trim) {
            Some(year) if allowed_years().iter().any(|y| y == year) => {}
            Some(year) => issues.push(FieldIssue {
                field: "year",
                message: format!("year '{year}' is not an accepted exam year"),
            }),
            None => issues.push(FieldIssue {
                field: "year",
                message: "year is required for PYQs".to_string(),
            }),
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(LifecycleError::Validation(issues))
    }
}

fn apply_metadata(resource: &mut Resource, metadata: &ResourceMetadata) {
    resource.title = metadata.title.trim().to_string();
    resource.program = metadata.program.trim().to_string();
    resource.course_code = metadata.course_code.trim().to_string();
    resource.course_name = metadata.course_name.trim().to_string();
    resource.semester = metadata.semester;
    if resource.kind == ResourceKind::Pyq {
        resource.year = metadata.year.as_deref().map(|y| y.trim().to_string());
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Create a resource: validate, store the blob, persist as pending.
pub async fn create(
    db: &Database,
    blobs: &dyn BlobStore,
    owner_id: &str,
    kind: ResourceKind,
    metadata: ResourceMetadata,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<Resource, LifecycleError> {
    validate_metadata(kind, &metadata)?;

    let file = blobs.store(filename, bytes).await?;
    let now = Utc::now();

    let mut resource = Resource {
        approved_at: None,
        approved_by: None,
        course_code: String::new(),
        course_name: String::new(),
        created_at: now,
        file,
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        owner_id: owner_id.to_string(),
        program: String::new(),
        rejected_at: None,
        rejected_by: None,
        rejection_reason: None,
        semester: metadata.semester,
        status: ModerationStatus::Pending,
        title: String::new(),
        updated_at: now,
        year: None,
    };
    apply_metadata(&mut resource, &metadata);

    db.put_resource(&resource)?;
    tracing::info!(resource_id = %resource.id, kind = %kind, owner = %owner_id, "Resource created");
    Ok(resource)
}

/// Edit a resource in place. Owner-only, regardless of role.
///
/// When a replacement file is supplied, the new blob is uploaded and
/// confirmed before the old one is released; a failed upload leaves the
/// resource pointing at its existing blob. Every successful edit resets
/// the resource to pending for re-review.
pub async fn edit(
    db: &Database,
    blobs: &dyn BlobStore,
    resource_id: &str,
    caller_id: &str,
    metadata: ResourceMetadata,
    new_file: Option<(String, Vec<u8>)>,
) -> Result<Resource, LifecycleError> {
    let existing = db.get_resource(resource_id)?.ok_or(LifecycleError::NotFound)?;

    if existing.owner_id != caller_id {
        return Err(LifecycleError::Forbidden(
            "You can only edit your own uploads".to_string(),
        ));
    }

    validate_metadata(existing.kind, &metadata)?;

    // Upload first. Only once the new blob is confirmed do we let go
    // of the old one.
    let mut new_ref: Option<FileRef> = match new_file {
        Some((filename, bytes)) => Some(blobs.store(&filename, bytes).await?),
        None => None,
    };

    // The status read, the record write, and the counter adjustment
    // share one write transaction; a review racing this edit lands
    // either entirely before it or entirely after it.
    let mut old_file: Option<FileRef> = None;
    let updated = db.update_resource_with(resource_id, |resource| {
        if let Some(stored) = new_ref.take() {
            old_file = Some(std::mem::replace(&mut resource.file, stored));
        }
        let was_approved = resource.status == ModerationStatus::Approved;
        apply_metadata(resource, &metadata);
        resource.status = ModerationStatus::Pending;
        resource.clear_review_fields();
        if was_approved {
            -1
        } else {
            0
        }
    })?;

    let resource = match updated {
        Some(resource) => resource,
        None => {
            // Deleted underneath us; release the freshly uploaded blob.
            if let Some(stored) = new_ref {
                if let Err(e) = blobs.delete(&stored.blob_id).await {
                    tracing::warn!(error = %e, blob_id = %stored.blob_id, "Failed to release orphaned blob");
                }
            }
            return Err(LifecycleError::NotFound);
        }
    };

    if let Some(old) = old_file {
        // The record already points at the new blob; an orphaned old
        // blob is recoverable, a dangling file reference is not.
        if let Err(e) = blobs.delete(&old.blob_id).await {
            tracing::warn!(error = %e, blob_id = %old.blob_id, "Failed to release replaced blob");
        }
    }

    tracing::info!(resource_id = %resource.id, "Resource edited, back to pending");
    Ok(resource)
}

/// Delete a resource. Owner-only, any moderation state.
pub async fn delete(
    db: &Database,
    blobs: &dyn BlobStore,
    resource_id: &str,
    caller_id: &str,
) -> Result<(), LifecycleError> {
    let resource = db.get_resource(resource_id)?.ok_or(LifecycleError::NotFound)?;

    if resource.owner_id != caller_id {
        return Err(LifecycleError::Forbidden(
            "You can only delete your own uploads".to_string(),
        ));
    }

    remove_with_blob(db, blobs, resource).await
}

/// Administrative purge: approved resources only, no ownership check.
pub async fn admin_delete(
    db: &Database,
    blobs: &dyn BlobStore,
    resource_id: &str,
) -> Result<(), LifecycleError> {
    let resource = db.get_resource(resource_id)?.ok_or(LifecycleError::NotFound)?;

    if resource.status != ModerationStatus::Approved {
        return Err(LifecycleError::Conflict(
            "Only approved resources can be removed through this path".to_string(),
        ));
    }

    remove_with_blob(db, blobs, resource).await
}

async fn remove_with_blob(
    db: &Database,
    blobs: &dyn BlobStore,
    resource: Resource,
) -> Result<(), LifecycleError> {
    if let Err(e) = blobs.delete(&resource.file.blob_id).await {
        tracing::warn!(error = %e, blob_id = %resource.file.blob_id, "Failed to release blob during delete");
    }

    let removed = db.delete_resource(&resource.id)?;

    if let Some(removed) = removed {
        if removed.status == ModerationStatus::Approved {
            db.adjust_contributions(&removed.owner_id, -1)?;
        }
    }

    tracing::info!(resource_id = %resource.id, "Resource deleted");
    Ok(())
}

/// Approve or reject a pending resource.
///
/// Only pending resources can transition; anything else is a conflict,
/// which is also how the loser of two concurrent reviews finds out.
/// The owner notification is dispatched fire-and-forget after commit.
pub fn transition(
    db: &Database,
    notifier: Arc<dyn Notifier>,
    resource_id: &str,
    moderator_id: &str,
    action: ReviewAction,
    reason: Option<String>,
) -> Result<Resource, LifecycleError> {
    let reason = match action {
        ReviewAction::Reject => {
            let reason = reason.unwrap_or_default();
            if reason.trim().chars().count() < REJECTION_REASON_MIN {
                return Err(LifecycleError::Validation(vec![FieldIssue {
                    field: "rejectionReason",
                    message: format!(
                        "rejection reason must be at least {REJECTION_REASON_MIN} characters"
                    ),
                }]));
            }
            Some(reason.trim().to_string())
        }
        ReviewAction::Approve => None,
    };

    let now = Utc::now();
    let moderator = moderator_id.to_string();
    let outcome = db.transition_resource(resource_id, ModerationStatus::Pending, |resource| {
        resource.clear_review_fields();
        match action {
            ReviewAction::Approve => {
                resource.status = ModerationStatus::Approved;
                resource.approved_by = Some(moderator);
                resource.approved_at = Some(now);
                // The increment commits with the approval itself.
                1
            }
            ReviewAction::Reject => {
                resource.status = ModerationStatus::Rejected;
                resource.rejected_by = Some(moderator);
                resource.rejected_at = Some(now);
                resource.rejection_reason = reason;
                0
            }
        }
    })?;

    let resource = match outcome {
        TransitionOutcome::Applied(resource) => resource,
        TransitionOutcome::NotFound => return Err(LifecycleError::NotFound),
        TransitionOutcome::WrongStatus(status) => {
            return Err(LifecycleError::Conflict(format!(
                "Resource is already {status:?}, only pending resources can be reviewed",
            )));
        }
    };

    // Best-effort owner notification; never blocks or fails the review.
    match db.get_user(&resource.owner_id)? {
        Some(owner) => {
            let notification = match action {
                ReviewAction::Approve => Notification::ResourceApproved {
                    kind: resource.kind,
                },
                ReviewAction::Reject => Notification::ResourceRejected {
                    kind: resource.kind,
                    reason: resource.rejection_reason.clone().unwrap_or_default(),
                },
            };
            dispatch(notifier, owner.email, owner.name, notification);
        }
        None => {
            tracing::warn!(owner_id = %resource.owner_id, "Resource owner missing, skipping notification");
        }
    }

    tracing::info!(resource_id = %resource.id, ?action, moderator = %moderator_id, "Resource reviewed");
    Ok(resource)
}

/// Publicly visible listing: approved only, newest first.
pub fn list_approved(
    db: &Database,
    kind: ResourceKind,
    limit: Option<usize>,
) -> Result<Vec<Resource>, LifecycleError> {
    let mut resources = db.get_resources_by_status(kind, ModerationStatus::Approved)?;
    if let Some(limit) = limit {
        resources.truncate(limit);
    }
    Ok(resources)
}

/// Owner-scoped listing: every state, newest first.
pub fn list_mine(
    db: &Database,
    owner_id: &str,
    kind: ResourceKind,
) -> Result<Vec<Resource>, LifecycleError> {
    Ok(db.get_resources_by_owner(owner_id, Some(kind))?)
}

/// Moderation queue: pending only, with owner identity for context.
pub fn list_pending(
    db: &Database,
    kind: ResourceKind,
) -> Result<Vec<PendingResource>, LifecycleError> {
    let resources = db.get_resources_by_status(kind, ModerationStatus::Pending)?;

    let mut pending = Vec::with_capacity(resources.len());
    for resource in resources {
        let (owner_name, owner_email) = match db.get_user(&resource.owner_id)? {
            Some(owner) => (owner.name, owner.email),
            None => ("<deleted user>".to_string(), String::new()),
        };
        pending.push(PendingResource {
            owner_email,
            owner_name,
            resource,
        });
    }
    Ok(pending)
}

/// Search approved resources of a kind.
///
/// The free-text query matches title/program/courseCode/courseName
/// case-insensitively, plus the semester when it parses as a number.
/// Explicit filters are ANDed with the text match.
pub fn search(
    db: &Database,
    kind: ResourceKind,
    filters: &SearchFilters,
) -> Result<Vec<Resource>, LifecycleError> {
    let approved = db.get_resources_by_status(kind, ModerationStatus::Approved)?;

    let query = filters.query.as_deref().map(str::to_lowercase);
    let query_semester: Option<u8> = query.as_deref().and_then(|q| q.trim().parse().ok());

    let matches = approved
        .into_iter()
        .filter(|r| match query.as_deref() {
            None => true,
            Some(q) => {
                r.title.to_lowercase().contains(q)
                    || r.program.to_lowercase().contains(q)
                    || r.course_code.to_lowercase().contains(q)
                    || r.course_name.to_lowercase().contains(q)
                    || query_semester == Some(r.semester)
            }
        })
        .filter(|r| match filters.program.as_deref() {
            None => true,
            Some(p) => r.program.to_lowercase().contains(&p.to_lowercase()),
        })
        .filter(|r| match filters.course_code.as_deref() {
            None => true,
            Some(c) => r.course_code.to_lowercase().contains(&c.to_lowercase()),
        })
        .filter(|r| match filters.semester {
            None => true,
            Some(s) => r.semester == s,
        })
        .filter(|r| match filters.year.as_deref() {
            None => true,
            Some(y) => r
                .year
                .as_deref()
                .is_some_and(|ry| ry.to_lowercase().contains(&y.to_lowercase())),
        })
        .collect();

    Ok(matches)
}

/// Search approved resources across every kind, newest first.
pub fn search_all(
    db: &Database,
    filters: &SearchFilters,
) -> Result<Vec<Resource>, LifecycleError> {
    let mut matches = Vec::new();
    for kind in [ResourceKind::Note, ResourceKind::Pyq, ResourceKind::Syllabus] {
        matches.extend(search(db, kind, filters)?);
    }
    matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::MemoryBlobStore;
    use crate::notify::RecordingNotifier;
    use crate::testutil::{make_metadata, make_user, setup_db};

    fn pyq_metadata() -> ResourceMetadata {
        ResourceMetadata {
            year: Some(Utc::now().year().to_string()),
            ..make_metadata("Algorithms Endsem")
        }
    }

    #[tokio::test]
    async fn create_always_starts_pending() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        db.put_user(&make_user("u1", "alice@campus.edu")).unwrap();

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "ds3.pdf",
            vec![1, 2, 3],
        )
        .await
        .unwrap();

        assert_eq!(resource.status, ModerationStatus::Pending);
        assert!(blobs.contains(&resource.file.blob_id));
    }

    #[tokio::test]
    async fn create_rejects_bad_metadata() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();

        let mut metadata = make_metadata("x"); // title too short
        metadata.semester = 13;

        let err = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            metadata,
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap_err();

        match err {
            LifecycleError::Validation(issues) => {
                let fields: Vec<_> = issues.iter().map(|i| i.field).collect();
                assert!(fields.contains(&"title"));
                assert!(fields.contains(&"semester"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        // Nothing was uploaded for an invalid request.
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn pyq_requires_enumerated_year() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();

        let mut metadata = make_metadata("OS Midsem");
        metadata.year = Some("1890".to_string());
        let err = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Pyq,
            metadata,
            "os.pdf",
            vec![0],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Pyq,
            pyq_metadata(),
            "os.pdf",
            vec![0],
        )
        .await
        .unwrap();
        assert!(resource.year.is_some());
    }

    #[tokio::test]
    async fn edit_by_non_owner_is_forbidden() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        let err = edit(
            &db,
            &blobs,
            &resource.id,
            "u2",
            make_metadata("Stolen"),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));
    }

    #[tokio::test]
    async fn edit_replaces_file_upload_first() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "v1.pdf",
            vec![1],
        )
        .await
        .unwrap();
        let old_blob = resource.file.blob_id.clone();

        let updated = edit(
            &db,
            &blobs,
            &resource.id,
            "u1",
            make_metadata("DS Unit 3 v2"),
            Some(("v2.pdf".to_string(), vec![2])),
        )
        .await
        .unwrap();

        assert_ne!(updated.file.blob_id, old_blob);
        assert!(blobs.contains(&updated.file.blob_id));
        assert!(!blobs.contains(&old_blob));
    }

    #[tokio::test]
    async fn edit_resets_approved_resource_to_pending() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        let notifier = Arc::new(RecordingNotifier::new());
        db.put_user(&make_user("u1", "alice@campus.edu")).unwrap();

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        transition(
            &db,
            notifier,
            &resource.id,
            "mod1",
            ReviewAction::Approve,
            None,
        )
        .unwrap();
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 1);

        let updated = edit(
            &db,
            &blobs,
            &resource.id,
            "u1",
            make_metadata("DS Unit 3 fixed"),
            None,
        )
        .await
        .unwrap();

        assert_eq!(updated.status, ModerationStatus::Pending);
        assert!(updated.approved_by.is_none());
        assert!(updated.approved_at.is_none());
        // Counter tracks currently approved resources.
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 0);
    }

    #[tokio::test]
    async fn reject_requires_minimum_reason() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        let err = transition(
            &db,
            Arc::clone(&notifier),
            &resource.id,
            "mod1",
            ReviewAction::Reject,
            Some("too short".to_string()), // 9 chars
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));

        let rejected = transition(
            &db,
            notifier,
            &resource.id,
            "mod1",
            ReviewAction::Reject,
            Some("blurry scan".to_string()), // 11 chars
        )
        .unwrap();
        assert_eq!(rejected.status, ModerationStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("blurry scan"));
        assert!(rejected.approved_by.is_none());
    }

    #[tokio::test]
    async fn transition_on_non_pending_conflicts() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Syllabus,
            make_metadata("CSE Sem 3 Syllabus"),
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        transition(
            &db,
            Arc::clone(&notifier),
            &resource.id,
            "mod1",
            ReviewAction::Approve,
            None,
        )
        .unwrap();

        let err = transition(
            &db,
            notifier,
            &resource.id,
            "mod2",
            ReviewAction::Reject,
            Some("duplicate upload".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Conflict(_)));
    }

    #[tokio::test]
    async fn concurrent_transitions_one_wins() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        let db_a = db.clone();
        let db_b = db.clone();
        let n_a = Arc::clone(&notifier);
        let n_b = Arc::clone(&notifier);
        let id_a = resource.id.clone();
        let id_b = resource.id.clone();

        let a = tokio::task::spawn_blocking(move || {
            transition(&db_a, n_a, &id_a, "mod1", ReviewAction::Approve, None)
        });
        let b = tokio::task::spawn_blocking(move || {
            transition(
                &db_b,
                n_b,
                &id_b,
                "mod2",
                ReviewAction::Reject,
                Some("duplicate upload".to_string()),
            )
        });

        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
        let successes = [ra.is_ok(), rb.is_ok()].iter().filter(|&&ok| ok).count();
        assert_eq!(successes, 1, "exactly one concurrent review must win");

        let loser = if ra.is_err() { ra } else { rb };
        assert!(matches!(loser.unwrap_err(), LifecycleError::Conflict(_)));
    }

    /// An edit and an approval land in either order; whichever
    /// serialization wins, the counter must equal the number of
    /// currently approved resources.
    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_edit_and_approval_keep_counter_consistent() {
        let (db, _temp) = setup_db();
        let blobs = Arc::new(MemoryBlobStore::new());
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
        db.put_user(&make_user("u1", "alice@campus.edu")).unwrap();

        let resource = create(
            &db,
            blobs.as_ref(),
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        let db_a = db.clone();
        let n_a = Arc::clone(&notifier);
        let id_a = resource.id.clone();
        let review = tokio::task::spawn_blocking(move || {
            transition(&db_a, n_a, &id_a, "mod1", ReviewAction::Approve, None)
        });

        let db_b = db.clone();
        let blobs_b = Arc::clone(&blobs);
        let id_b = resource.id.clone();
        let edit_task = tokio::spawn(async move {
            edit(
                &db_b,
                blobs_b.as_ref(),
                &id_b,
                "u1",
                make_metadata("DS Unit 3 fixed"),
                None,
            )
            .await
        });

        // Edit always succeeds; the review succeeds in either order
        // because an edited resource is pending again.
        review.await.unwrap().unwrap();
        edit_task.await.unwrap().unwrap();

        let final_state = db.get_resource(&resource.id).unwrap().unwrap();
        let contributions = db.get_user("u1").unwrap().unwrap().contributions;
        let expected = if final_state.status == ModerationStatus::Approved {
            1
        } else {
            0
        };
        assert_eq!(contributions, expected);
    }

    #[tokio::test]
    async fn search_is_restricted_to_approved() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());

        let mut metadata = make_metadata("DS Unit 3");
        metadata.program = "Computer Science".to_string();
        metadata.course_code = "CSE201".to_string();
        metadata.semester = 3;

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            metadata,
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        let filters = SearchFilters {
            query: Some("DS".to_string()),
            ..Default::default()
        };
        assert!(search(&db, ResourceKind::Note, &filters).unwrap().is_empty());

        transition(
            &db,
            notifier,
            &resource.id,
            "mod1",
            ReviewAction::Approve,
            None,
        )
        .unwrap();

        let hits = search(&db, ResourceKind::Note, &filters).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, resource.id);

        // Numeric query matches the semester field.
        let numeric = SearchFilters {
            query: Some("3".to_string()),
            ..Default::default()
        };
        assert_eq!(search(&db, ResourceKind::Note, &numeric).unwrap().len(), 1);

        // ANDed filter that doesn't match excludes the hit.
        let filtered = SearchFilters {
            query: Some("DS".to_string()),
            program: Some("Mechanical".to_string()),
            ..Default::default()
        };
        assert!(search(&db, ResourceKind::Note, &filtered)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn global_search_spans_kinds() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());

        let note = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("Algorithms Notes"),
            "a.pdf",
            vec![0],
        )
        .await
        .unwrap();
        let pyq = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Pyq,
            pyq_metadata(),
            "b.pdf",
            vec![0],
        )
        .await
        .unwrap();

        for id in [&note.id, &pyq.id] {
            transition(
                &db,
                Arc::clone(&notifier),
                id,
                "mod1",
                ReviewAction::Approve,
                None,
            )
            .unwrap();
        }

        let filters = SearchFilters {
            query: Some("algorithms".to_string()),
            ..Default::default()
        };
        // Per-kind search sees one hit each; the global search sees both.
        assert_eq!(search(&db, ResourceKind::Note, &filters).unwrap().len(), 1);
        let hits = search_all(&db, &filters).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn admin_delete_only_removes_approved() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());

        let resource = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        // Pending: admin purge refuses.
        let err = admin_delete(&db, &blobs, &resource.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Conflict(_)));

        transition(
            &db,
            notifier,
            &resource.id,
            "mod1",
            ReviewAction::Approve,
            None,
        )
        .unwrap();
        admin_delete(&db, &blobs, &resource.id).await.unwrap();
        assert!(db.get_resource(&resource.id).unwrap().is_none());
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn delete_decrements_contributions_for_approved_only() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
        db.put_user(&make_user("u1", "alice@campus.edu")).unwrap();

        let pending = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("Pending one"),
            "a.pdf",
            vec![0],
        )
        .await
        .unwrap();
        let approved = create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("Approved one"),
            "b.pdf",
            vec![0],
        )
        .await
        .unwrap();

        transition(
            &db,
            notifier,
            &approved.id,
            "mod1",
            ReviewAction::Approve,
            None,
        )
        .unwrap();
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 1);

        delete(&db, &blobs, &pending.id, "u1").await.unwrap();
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 1);

        delete(&db, &blobs, &approved.id, "u1").await.unwrap();
        assert_eq!(db.get_user("u1").unwrap().unwrap().contributions, 0);
    }

    #[tokio::test]
    async fn pending_queue_carries_owner_identity() {
        let (db, _temp) = setup_db();
        let blobs = MemoryBlobStore::new();
        db.put_user(&make_user("u1", "alice@campus.edu")).unwrap();

        create(
            &db,
            &blobs,
            "u1",
            ResourceKind::Note,
            make_metadata("DS Unit 3"),
            "f.pdf",
            vec![0],
        )
        .await
        .unwrap();

        let pending = list_pending(&db, ResourceKind::Note).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].owner_email, "alice@campus.edu");
    }
}
