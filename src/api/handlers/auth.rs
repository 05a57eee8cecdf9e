//! Account and session endpoints.
//!
//! Both session credentials travel as cookies: `accessToken` scoped to
//! the whole API with the access TTL, `refreshToken` scoped to `/auth`
//! with the refresh TTL. Both are httpOnly and cross-site capable;
//! the Secure attribute follows configuration so local HTTP
//! development keeps working.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use super::UserView;
use crate::api::middleware::{AuthUser, Json, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::api::response::{ApiError, Envelope};
use crate::{accounts, promotion, AppState};

fn session_cookie(
    state: &AppState,
    name: &'static str,
    value: String,
    path: &'static str,
    max_age_seconds: u64,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path)
        .max_age(Duration::seconds(max_age_seconds as i64))
        .http_only(true)
        .secure(state.config.auth.secure_cookies)
        .same_site(SameSite::None)
        .build()
}

fn removal_cookie(name: &'static str, path: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path(path)
        .max_age(Duration::ZERO)
        .http_only(true)
        .build()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub contact_no: Option<String>,
    pub email: String,
    pub name: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Envelope), ApiError> {
    let user = accounts::register(
        &state.db,
        Arc::clone(&state.notifier),
        &state.config.auth,
        &req.name,
        &req.email,
        &req.password,
        req.contact_no,
    )?;

    Ok((
        StatusCode::CREATED,
        Envelope::ok("Registered. Check your email for the verification code")
            .with("user", UserView::from(&user)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
}

/// Successful verification logs the fresh account straight in.
pub async fn verify_email(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<(CookieJar, Envelope), ApiError> {
    let (user, tokens) =
        accounts::verify_email(&state.db, &state.config.auth, &req.email, &req.otp)?;

    let jar = jar
        .add(session_cookie(
            &state,
            ACCESS_COOKIE,
            tokens.access,
            "/",
            state.config.auth.access_ttl_seconds,
        ))
        .add(session_cookie(
            &state,
            REFRESH_COOKIE,
            tokens.refresh,
            "/auth",
            state.config.auth.refresh_ttl_seconds,
        ));

    Ok((
        jar,
        Envelope::ok("Email verified").with("user", UserView::from(&user)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Envelope), ApiError> {
    let (user, tokens) = accounts::login(&state.db, &state.config.auth, &req.email, &req.password)?;

    let jar = jar
        .add(session_cookie(
            &state,
            ACCESS_COOKIE,
            tokens.access,
            "/",
            state.config.auth.access_ttl_seconds,
        ))
        .add(session_cookie(
            &state,
            REFRESH_COOKIE,
            tokens.refresh,
            "/auth",
            state.config.auth.refresh_ttl_seconds,
        ));

    Ok((
        jar,
        Envelope::ok("Logged in").with("user", UserView::from(&user)),
    ))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Envelope), ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::Auth("No refresh token".to_string()))?;

    let (user, access) = accounts::refresh_session(&state.db, &state.config.auth, &token)?;

    let jar = jar.add(session_cookie(
        &state,
        ACCESS_COOKIE,
        access,
        "/",
        state.config.auth.access_ttl_seconds,
    ));

    Ok((
        jar,
        Envelope::ok("Token refreshed").with("user", UserView::from(&user)),
    ))
}

/// Always succeeds, so a client can clear its local state even with
/// dead or missing credentials.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Envelope) {
    let refresh = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    accounts::logout(&state.db, &state.config.auth, refresh.as_deref());

    let jar = jar
        .add(removal_cookie(ACCESS_COOKIE, "/"))
        .add(removal_cookie(REFRESH_COOKIE, "/auth"));

    (jar, Envelope::ok("Logged out"))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Envelope, ApiError> {
    accounts::forgot_password(
        &state.db,
        Arc::clone(&state.notifier),
        &state.config.auth,
        &req.email,
    )?;
    Ok(Envelope::ok("Check your email for the reset code"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
    pub otp: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Envelope, ApiError> {
    accounts::reset_password(&state.db, &req.email, &req.otp, &req.new_password)?;
    Ok(Envelope::ok("Password reset, log in with your new password"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Envelope, ApiError> {
    accounts::change_password(&state.db, &user.id, &req.current_password, &req.new_password)?;
    Ok(Envelope::ok("Password changed"))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Envelope, ApiError> {
    let user = accounts::me(&state.db, &user.id)?;
    Ok(Envelope::ok("Fetched profile").with("user", UserView::from(&user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModRequestBody {
    pub contact_no: Option<String>,
    pub motivation: String,
}

pub async fn request_mod(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ModRequestBody>,
) -> Result<Envelope, ApiError> {
    promotion::submit(&state.db, &user.id, &req.motivation, req.contact_no)?;
    Ok(Envelope::ok("Moderator request submitted"))
}

pub async fn contributors(State(state): State<AppState>) -> Result<Envelope, ApiError> {
    let contributors = accounts::contributors(&state.db)?;
    Ok(Envelope::ok("Fetched contributors").with("contributors", contributors))
}
