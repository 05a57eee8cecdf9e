use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers::{admin, auth, moderation, resources};
use super::response::Envelope;
use crate::AppState;

async fn healthz() -> Envelope {
    Envelope::ok("ok")
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/contributors", get(auth::contributors))
        .route("/search", get(resources::search_all))
        // Accounts and sessions
        .route("/auth/register", post(auth::register))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/me", get(auth::me))
        .route("/auth/request-mod", post(auth::request_mod))
        // Moderation queue
        .route("/mod/:kind/pending", get(moderation::pending))
        .route("/mod/:kind/:id/approve", patch(moderation::approve))
        .route("/mod/:kind/:id/reject", patch(moderation::reject))
        // Admin
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id/deactivate", patch(admin::deactivate_user))
        .route("/admin/users/:id/activate", patch(admin::activate_user))
        .route("/admin/users/:id", delete(admin::delete_user))
        .route("/admin/mods", get(admin::list_mods))
        .route("/admin/mods/requests", get(admin::list_mod_requests))
        .route("/admin/mods/review/:id", patch(admin::review_mod_request))
        .route("/admin/mods/:id", delete(admin::remove_mod))
        .route("/admin/resources/:kind/:id", delete(admin::delete_resource))
        // Per-kind resources; `:kind` is notes, pyqs, or syllabus.
        // Static segments above always win over the capture.
        .route("/:kind/upload", post(resources::upload))
        .route("/:kind/edit/:id", put(resources::edit))
        .route("/:kind/delete/:id", delete(resources::delete))
        .route("/:kind/all", get(resources::all))
        .route("/:kind/my", get(resources::mine))
        .route("/:kind/search", get(resources::search))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
