//! Account registration, email verification, sessions, and the admin
//! user-management surface.
//!
//! Sessions are a pair of bearer credentials: a short-lived access
//! token carrying the user's id and role, and a long-lived refresh
//! token persisted on the user record so it can be revoked. Refresh
//! rotates the access token only; the refresh token stays valid until
//! logout, deactivation, or expiry.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::blobstore::BlobStore;
use crate::config::AuthConfig;
use crate::notify::{dispatch, Notification, Notifier};
use crate::storage::models::{Role, User};
use crate::storage::{Database, StorageError};
use crate::tokens::jwt::{self, TokenError};
use crate::tokens::otp;
use crate::tokens::password::{self, PasswordError};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const CONTRIBUTORS_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account is deactivated")]
    AccountDeactivated,
    #[error("{0}")]
    Conflict(String),
    #[error("Email is not verified")]
    EmailNotVerified,
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid or expired verification code")]
    InvalidOtp,
    #[error("Invalid session")]
    InvalidSession,
    #[error("User not found")]
    NotFound,
    #[error("Password hashing failed: {0}")]
    Password(#[from] PasswordError),
    #[error("Database failure: {0}")]
    Storage(#[from] StorageError),
    #[error("Token failure: {0}")]
    Token(#[from] TokenError),
    #[error("{0}")]
    Validation(String),
}

/// The credential pair issued at login.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

fn validate_registration(
    auth: &AuthConfig,
    name: &str,
    email: &str,
    pw: &str,
) -> Result<(), AccountError> {
    let name_len = name.trim().chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&name_len) {
        return Err(AccountError::Validation(format!(
            "Name must be between {NAME_MIN} and {NAME_MAX} characters"
        )));
    }
    let suffix = format!("@{}", auth.email_domain);
    if !email.contains('@') || !email.to_lowercase().ends_with(&suffix) {
        return Err(AccountError::Validation(format!(
            "Registration is restricted to {} email addresses",
            auth.email_domain
        )));
    }
    validate_password(pw)
}

fn validate_password(pw: &str) -> Result<(), AccountError> {
    if pw.chars().count() < PASSWORD_MIN {
        return Err(AccountError::Validation(format!(
            "Password must be at least {PASSWORD_MIN} characters"
        )));
    }
    let has_lower = pw.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = pw.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = pw.chars().any(|c| c.is_ascii_digit());
    let has_special = pw.chars().any(|c| !c.is_ascii_alphanumeric());
    if !(has_lower && has_upper && has_digit && has_special) {
        return Err(AccountError::Validation(
            "Password must contain a lowercase letter, an uppercase letter, \
             a digit, and a special character"
                .to_string(),
        ));
    }
    Ok(())
}

/// Register a new account and send the verification code.
///
/// Re-registering an unverified address replaces the stale account and
/// reissues the code; a verified address is a conflict.
pub fn register(
    db: &Database,
    notifier: Arc<dyn Notifier>,
    auth: &AuthConfig,
    name: &str,
    email: &str,
    pw: &str,
    contact_no: Option<String>,
) -> Result<User, AccountError> {
    validate_registration(auth, name, email, pw)?;
    let email = email.trim().to_lowercase();
    let name = name.trim().to_string();

    let mut user = match db.get_user_by_email(&email)? {
        Some(existing) if existing.is_email_verified => {
            return Err(AccountError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        Some(existing) => {
            // Unverified leftover from an abandoned signup.
            let mut user = existing;
            user.name = name;
            user.password_hash = password::hash_password(pw)?;
            user.contact_no = contact_no;
            user
        }
        None => {
            let mut user = User::new(
                uuid::Uuid::new_v4().to_string(),
                name,
                email.clone(),
                password::hash_password(pw)?,
            );
            user.contact_no = contact_no;
            user
        }
    };

    let code = otp::generate_otp();
    user.email_otp_hash = Some(otp::hash_otp(&code));
    user.email_otp_expiry = Some(otp::otp_expiry(auth.otp_ttl_minutes));
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    dispatch(
        notifier,
        user.email.clone(),
        user.name.clone(),
        Notification::EmailOtp { otp: code },
    );

    tracing::info!(user_id = %user.id, "Account registered, verification code sent");
    Ok(user)
}

/// Issue a credential pair and persist the refresh token on the user
/// record. Shared by login and successful email verification (which
/// logs the fresh account in directly).
fn issue_session(
    db: &Database,
    auth: &AuthConfig,
    mut user: User,
) -> Result<(User, SessionTokens), AccountError> {
    let access = jwt::issue_access_token(
        &auth.access_secret,
        &user.id,
        user.role,
        auth.access_ttl_seconds,
    )?;
    let refresh =
        jwt::issue_refresh_token(&auth.refresh_secret, &user.id, auth.refresh_ttl_seconds)?;

    user.refresh_token = Some(refresh.clone());
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    Ok((user, SessionTokens { access, refresh }))
}

/// Confirm ownership of the registered email address and open the
/// account's first session.
pub fn verify_email(
    db: &Database,
    auth: &AuthConfig,
    email: &str,
    code: &str,
) -> Result<(User, SessionTokens), AccountError> {
    let email = email.trim().to_lowercase();
    let mut user = db
        .get_user_by_email(&email)?
        .ok_or(AccountError::NotFound)?;

    if user.is_email_verified {
        return Err(AccountError::Conflict(
            "Email is already verified".to_string(),
        ));
    }

    let hash = user.email_otp_hash.as_deref().unwrap_or_default();
    if !otp::verify_otp(code, hash, user.email_otp_expiry) {
        return Err(AccountError::InvalidOtp);
    }

    user.is_email_verified = true;
    user.email_otp_hash = None;
    user.email_otp_expiry = None;

    tracing::info!(user_id = %user.id, "Email verified");
    issue_session(db, auth, user)
}

/// Authenticate and open a session.
///
/// Credential failures are deliberately indistinguishable; verification
/// and deactivation states are only reported once the password checks
/// out.
pub fn login(
    db: &Database,
    auth: &AuthConfig,
    email: &str,
    pw: &str,
) -> Result<(User, SessionTokens), AccountError> {
    let email = email.trim().to_lowercase();
    let user = db
        .get_user_by_email(&email)?
        .ok_or(AccountError::InvalidCredentials)?;

    if !password::verify_password(pw, &user.password_hash)? {
        return Err(AccountError::InvalidCredentials);
    }
    if !user.is_email_verified {
        return Err(AccountError::EmailNotVerified);
    }
    if !user.is_active {
        return Err(AccountError::AccountDeactivated);
    }

    tracing::info!(user_id = %user.id, "Login");
    issue_session(db, auth, user)
}

/// Exchange a refresh token for a fresh access token.
///
/// The presented token must match the one stored on the user record,
/// which is how logout and deactivation revoke live sessions. The new
/// access token embeds the user's current role, so promotions and
/// demotions take effect here. An expired, forged, or revoked token all
/// mean the same thing to the caller: this session is dead and only a
/// new login revives it.
pub fn refresh_session(
    db: &Database,
    auth: &AuthConfig,
    refresh_token: &str,
) -> Result<(User, String), AccountError> {
    let user_id = jwt::verify_refresh_token(&auth.refresh_secret, refresh_token)
        .map_err(|_| AccountError::InvalidSession)?;

    let user = db.get_user(&user_id)?.ok_or(AccountError::InvalidSession)?;
    if user.refresh_token.as_deref() != Some(refresh_token) {
        return Err(AccountError::InvalidSession);
    }
    if !user.is_active {
        return Err(AccountError::AccountDeactivated);
    }

    let access = jwt::issue_access_token(
        &auth.access_secret,
        &user.id,
        user.role,
        auth.access_ttl_seconds,
    )?;
    Ok((user, access))
}

/// Close a session. Best-effort: always succeeds so a client can clear
/// local state even when its credentials are already gone.
pub fn logout(db: &Database, auth: &AuthConfig, refresh_token: Option<&str>) {
    let Some(token) = refresh_token else { return };
    let Ok(user_id) = jwt::verify_refresh_token(&auth.refresh_secret, token) else {
        return;
    };

    let result = db.get_user(&user_id).map(|user| {
        if let Some(mut user) = user {
            if user.refresh_token.as_deref() == Some(token) {
                user.refresh_token = None;
                user.updated_at = Utc::now();
                return db.put_user(&user);
            }
        }
        Ok(())
    });

    match result {
        Ok(Ok(())) => tracing::debug!(user_id = %user_id, "Logout"),
        Ok(Err(e)) | Err(e) => tracing::warn!(error = %e, "Logout cleanup failed"),
    }
}

/// Start a password reset: store a fresh code on the account and mail
/// it out. The code shares the OTP fields with email verification.
pub fn forgot_password(
    db: &Database,
    notifier: Arc<dyn Notifier>,
    auth: &AuthConfig,
    email: &str,
) -> Result<(), AccountError> {
    let email = email.trim().to_lowercase();
    let mut user = db.get_user_by_email(&email)?.ok_or(AccountError::NotFound)?;

    let code = otp::generate_otp();
    user.email_otp_hash = Some(otp::hash_otp(&code));
    user.email_otp_expiry = Some(otp::otp_expiry(auth.otp_ttl_minutes));
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    dispatch(
        notifier,
        user.email.clone(),
        user.name.clone(),
        Notification::PasswordResetOtp { otp: code },
    );

    tracing::info!(user_id = %user.id, "Password reset code sent");
    Ok(())
}

/// Complete a password reset with the emailed code.
///
/// The stored refresh token is cleared, so every session opened under
/// the old password dies here.
pub fn reset_password(
    db: &Database,
    email: &str,
    code: &str,
    new_password: &str,
) -> Result<(), AccountError> {
    validate_password(new_password)?;
    let email = email.trim().to_lowercase();
    let mut user = db.get_user_by_email(&email)?.ok_or(AccountError::NotFound)?;

    let hash = user.email_otp_hash.as_deref().unwrap_or_default();
    if !otp::verify_otp(code, hash, user.email_otp_expiry) {
        return Err(AccountError::InvalidOtp);
    }

    user.password_hash = password::hash_password(new_password)?;
    user.email_otp_hash = None;
    user.email_otp_expiry = None;
    user.refresh_token = None;
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(())
}

/// Change the password of a logged-in account. The current session
/// stays open.
pub fn change_password(
    db: &Database,
    user_id: &str,
    current_password: &str,
    new_password: &str,
) -> Result<(), AccountError> {
    let mut user = db.get_user(user_id)?.ok_or(AccountError::NotFound)?;

    if !password::verify_password(current_password, &user.password_hash)? {
        return Err(AccountError::InvalidCredentials);
    }
    validate_password(new_password)?;

    user.password_hash = password::hash_password(new_password)?;
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    tracing::info!(user_id = %user_id, "Password changed");
    Ok(())
}

/// The current user's own record.
pub fn me(db: &Database, user_id: &str) -> Result<User, AccountError> {
    db.get_user(user_id)?.ok_or(AccountError::NotFound)
}

/// A contributor leaderboard entry.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub contributions: i64,
    pub name: String,
}

/// Users with at least one approved resource, most contributions
/// first, capped at the leaderboard size.
pub fn contributors(db: &Database) -> Result<Vec<Contributor>, AccountError> {
    let mut users: Vec<Contributor> = db
        .get_all_users()?
        .into_iter()
        .filter(|u| u.contributions > 0)
        .map(|u| Contributor {
            contributions: u.contributions,
            name: u.name,
        })
        .collect();
    users.sort_by(|a, b| b.contributions.cmp(&a.contributions));
    users.truncate(CONTRIBUTORS_LIMIT);
    Ok(users)
}

// ============================================================================
// Admin user management
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    Active,
    All,
    Inactive,
}

/// List users for the admin dashboard.
pub fn list_users(db: &Database, filter: UserFilter) -> Result<Vec<User>, AccountError> {
    Ok(db
        .get_all_users()?
        .into_iter()
        .filter(|u| match filter {
            UserFilter::Active => u.is_active,
            UserFilter::All => true,
            UserFilter::Inactive => !u.is_active,
        })
        .collect())
}

/// Deactivate or reactivate an account. Deactivation also revokes the
/// live session. Admin accounts cannot be deactivated.
pub fn set_active(db: &Database, user_id: &str, active: bool) -> Result<User, AccountError> {
    let mut user = db.get_user(user_id)?.ok_or(AccountError::NotFound)?;

    if user.role == Role::Admin && !active {
        return Err(AccountError::Forbidden(
            "Admin accounts cannot be deactivated".to_string(),
        ));
    }
    if user.is_active == active {
        return Err(AccountError::Conflict(format!(
            "Account is already {}",
            if active { "active" } else { "inactive" }
        )));
    }

    user.is_active = active;
    if !active {
        user.refresh_token = None;
    }
    user.updated_at = Utc::now();
    db.put_user(&user)?;

    tracing::info!(user_id = %user_id, active, "Account state changed");
    Ok(user)
}

/// Permanently delete an account, its resources, and their blobs.
pub async fn delete_account(
    db: &Database,
    blobs: &dyn BlobStore,
    user_id: &str,
) -> Result<(), AccountError> {
    let user = db.get_user(user_id)?.ok_or(AccountError::NotFound)?;
    if user.role == Role::Admin {
        return Err(AccountError::Forbidden(
            "Admin accounts cannot be deleted".to_string(),
        ));
    }

    let resources = db.get_resources_by_owner(user_id, None)?;
    for resource in resources {
        if let Err(e) = blobs.delete(&resource.file.blob_id).await {
            tracing::warn!(error = %e, blob_id = %resource.file.blob_id, "Failed to release blob during account delete");
        }
        db.delete_resource(&resource.id)?;
    }

    db.delete_user(user_id)?;
    tracing::info!(user_id = %user_id, "Account deleted");
    Ok(())
}
