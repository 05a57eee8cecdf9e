//! Moderation queue endpoints. All of these require the mod or admin
//! role; the review itself is a conditional transition, so two
//! moderators racing on the same resource cannot both win.

use std::sync::Arc;

use axum::extract::{Path, State};
use serde::Deserialize;

use super::resources::{ensure_kind, parse_kind};
use crate::api::middleware::{Json, Moderator};
use crate::api::response::{ApiError, Envelope};
use crate::lifecycle::{self, ReviewAction};
use crate::AppState;

pub async fn pending(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    _mod: Moderator,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    let pending = lifecycle::list_pending(&state.db, kind)?;
    Ok(Envelope::ok("Fetched pending resources").with("resources", pending))
}

pub async fn approve(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Moderator(user): Moderator,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    ensure_kind(&state, &id, kind)?;

    let resource = lifecycle::transition(
        &state.db,
        Arc::clone(&state.notifier),
        &id,
        &user.id,
        ReviewAction::Approve,
        None,
    )?;
    Ok(Envelope::ok("Approved").with("resource", resource))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBody {
    pub rejection_reason: Option<String>,
}

pub async fn reject(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Moderator(user): Moderator,
    Json(body): Json<RejectBody>,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    ensure_kind(&state, &id, kind)?;

    let resource = lifecycle::transition(
        &state.db,
        Arc::clone(&state.notifier),
        &id,
        &user.id,
        ReviewAction::Reject,
        body.rejection_reason,
    )?;
    Ok(Envelope::ok("Rejected").with("resource", resource))
}
