pub mod admin;
pub mod auth;
pub mod moderation;
pub mod resources;

use serde::Serialize;

use crate::storage::models::{ModRequestStatus, Role, User};

/// A user record as exposed over the API. Credential material
/// (password hash, OTP hash, refresh token) never leaves the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub contact_no: Option<String>,
    pub contributions: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub email: String,
    pub id: String,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub mod_request: Option<ModRequestStatus>,
    pub name: String,
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            contact_no: user.contact_no.clone(),
            contributions: user.contributions,
            created_at: user.created_at,
            email: user.email.clone(),
            id: user.id.clone(),
            is_active: user.is_active,
            is_email_verified: user.is_email_verified,
            mod_request: user.mod_request,
            name: user.name.clone(),
            role: user.role,
        }
    }
}
