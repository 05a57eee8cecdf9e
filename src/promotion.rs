//! Moderator promotion workflow.
//!
//! Regular users apply to become moderators with a motivation
//! statement. Admins review applications; approval changes the user's
//! role immediately, though a live session only picks the new role up
//! at its next token refresh. A rejected applicant may apply again.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::notify::{dispatch, Notification, Notifier};
use crate::storage::models::{ModRequestStatus, Role, User};
use crate::storage::{Database, StorageError};

pub const MOTIVATION_MIN: usize = 50;

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("{0}")]
    Conflict(String),
    #[error("User not found")]
    NotFound,
    #[error("Database failure: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Validation(String),
}

/// Admin decision on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Approve,
    Reject,
}

/// A pending application with the fields an admin reviews.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModRequest {
    pub contributions: i64,
    pub email: String,
    pub motivation: String,
    pub name: String,
    pub requested_at: Option<chrono::DateTime<Utc>>,
    pub user_id: String,
}

impl ModRequest {
    fn from_user(user: &User) -> Self {
        Self {
            contributions: user.contributions,
            email: user.email.clone(),
            motivation: user.mod_motivation.clone().unwrap_or_default(),
            name: user.name.clone(),
            requested_at: user.mod_request_at,
            user_id: user.id.clone(),
        }
    }
}

/// Submit (or resubmit, after rejection) a moderator application.
pub fn submit(
    db: &Database,
    user_id: &str,
    motivation: &str,
    contact_no: Option<String>,
) -> Result<(), PromotionError> {
    let motivation = motivation.trim();
    if motivation.chars().count() < MOTIVATION_MIN {
        return Err(PromotionError::Validation(format!(
            "Motivation must be at least {MOTIVATION_MIN} characters"
        )));
    }

    let mut user = db.get_user(user_id)?.ok_or(PromotionError::NotFound)?;

    if user.role.can_moderate() {
        return Err(PromotionError::Conflict(
            "You are already a moderator".to_string(),
        ));
    }
    if user.mod_request == Some(ModRequestStatus::Pending) {
        return Err(PromotionError::Conflict(
            "You already have a pending moderator request".to_string(),
        ));
    }

    user.mod_request = Some(ModRequestStatus::Pending);
    user.mod_motivation = Some(motivation.to_string());
    user.mod_request_at = Some(Utc::now());
    if contact_no.is_some() {
        user.contact_no = contact_no;
    }
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    tracing::info!(user_id = %user_id, "Moderator request submitted");
    Ok(())
}

/// All pending applications, newest first.
pub fn list_requests(db: &Database) -> Result<Vec<ModRequest>, PromotionError> {
    let mut requests: Vec<ModRequest> = db
        .get_all_users()?
        .iter()
        .filter(|u| u.mod_request == Some(ModRequestStatus::Pending))
        .map(ModRequest::from_user)
        .collect();
    requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
    Ok(requests)
}

/// Approve or reject a pending application. The applicant is notified
/// fire-and-forget.
pub fn review(
    db: &Database,
    notifier: Arc<dyn Notifier>,
    user_id: &str,
    decision: RequestDecision,
) -> Result<User, PromotionError> {
    let mut user = db.get_user(user_id)?.ok_or(PromotionError::NotFound)?;

    if user.mod_request != Some(ModRequestStatus::Pending) {
        return Err(PromotionError::Conflict(
            "User has no pending moderator request".to_string(),
        ));
    }

    match decision {
        RequestDecision::Approve => {
            user.role = Role::Mod;
            user.mod_request = Some(ModRequestStatus::Approved);
        }
        RequestDecision::Reject => {
            user.mod_request = Some(ModRequestStatus::Rejected);
        }
    }
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    let notification = match decision {
        RequestDecision::Approve => Notification::ModRequestApproved,
        RequestDecision::Reject => Notification::ModRequestRejected,
    };
    dispatch(notifier, user.email.clone(), user.name.clone(), notification);

    tracing::info!(user_id = %user_id, ?decision, "Moderator request reviewed");
    Ok(user)
}

/// Demote a moderator back to a regular user. Admin accounts cannot be
/// demoted through this path.
pub fn remove_mod_role(db: &Database, user_id: &str) -> Result<User, PromotionError> {
    let mut user = db.get_user(user_id)?.ok_or(PromotionError::NotFound)?;

    if user.role != Role::Mod {
        return Err(PromotionError::Conflict(
            "User is not a moderator".to_string(),
        ));
    }

    user.role = Role::User;
    // Leave the request history at Approved; a demoted moderator may
    // apply again, which overwrites it.
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    tracing::info!(user_id = %user_id, "Moderator role removed");
    Ok(user)
}

/// All current moderators (role == mod; admins are not listed).
pub fn list_mods(db: &Database) -> Result<Vec<User>, PromotionError> {
    Ok(db
        .get_all_users()?
        .into_iter()
        .filter(|u| u.role == Role::Mod)
        .collect())
}
