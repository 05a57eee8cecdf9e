//! Admin-only endpoints: user management, moderator management, and
//! removal of approved resources.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::resources::{ensure_kind, parse_kind};
use super::UserView;
use crate::accounts::{self, UserFilter};
use crate::api::middleware::{Admin, Json};
use crate::api::response::{ApiError, Envelope};
use crate::promotion::{self, RequestDecision};
use crate::{lifecycle, AppState};

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub filter: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UserListParams>,
    _admin: Admin,
) -> Result<Envelope, ApiError> {
    let filter = match params.filter.as_deref() {
        Some("active") => UserFilter::Active,
        Some("inactive") => UserFilter::Inactive,
        Some(other) => {
            return Err(ApiError::validation(format!(
                "Unknown filter '{other}', expected 'active' or 'inactive'"
            )));
        }
        None => UserFilter::All,
    };

    let users: Vec<UserView> = accounts::list_users(&state.db, filter)?
        .iter()
        .map(UserView::from)
        .collect();
    Ok(Envelope::ok("Fetched users").with("users", users))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    _admin: Admin,
) -> Result<Envelope, ApiError> {
    let user = accounts::set_active(&state.db, &user_id, false)?;
    Ok(Envelope::ok("Account deactivated").with("user", UserView::from(&user)))
}

pub async fn activate_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    _admin: Admin,
) -> Result<Envelope, ApiError> {
    let user = accounts::set_active(&state.db, &user_id, true)?;
    Ok(Envelope::ok("Account activated").with("user", UserView::from(&user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    _admin: Admin,
) -> Result<Envelope, ApiError> {
    accounts::delete_account(&state.db, state.blobs.as_ref(), &user_id).await?;
    Ok(Envelope::ok("Account deleted"))
}

pub async fn list_mod_requests(
    State(state): State<AppState>,
    _admin: Admin,
) -> Result<Envelope, ApiError> {
    let requests = promotion::list_requests(&state.db)?;
    Ok(Envelope::ok("Fetched moderator requests").with("requests", requests))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub action: String,
}

pub async fn review_mod_request(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    _admin: Admin,
    Json(body): Json<ReviewBody>,
) -> Result<Envelope, ApiError> {
    let decision = match body.action.as_str() {
        "approve" => RequestDecision::Approve,
        "reject" => RequestDecision::Reject,
        other => {
            return Err(ApiError::validation(format!(
                "Unknown action '{other}', expected 'approve' or 'reject'"
            )));
        }
    };

    let user = promotion::review(
        &state.db,
        Arc::clone(&state.notifier),
        &user_id,
        decision,
    )?;
    Ok(Envelope::ok("Moderator request reviewed").with("user", UserView::from(&user)))
}

pub async fn list_mods(
    State(state): State<AppState>,
    _admin: Admin,
) -> Result<Envelope, ApiError> {
    let mods: Vec<UserView> = promotion::list_mods(&state.db)?
        .iter()
        .map(UserView::from)
        .collect();
    Ok(Envelope::ok("Fetched moderators").with("mods", mods))
}

pub async fn remove_mod(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    _admin: Admin,
) -> Result<Envelope, ApiError> {
    let user = promotion::remove_mod_role(&state.db, &user_id)?;
    Ok(Envelope::ok("Moderator role removed").with("user", UserView::from(&user)))
}

/// Take down an approved resource.
pub async fn delete_resource(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    _admin: Admin,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    ensure_kind(&state, &id, kind)?;

    lifecycle::admin_delete(&state.db, state.blobs.as_ref(), &id).await?;
    Ok(Envelope::ok("Resource removed"))
}
