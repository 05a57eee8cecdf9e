//! Request extractors.
//!
//! `AuthUser` reads and verifies the access cookie; `Moderator` and
//! `Admin` layer a role check on top. Role checks run after
//! authentication, so an authenticated user with an insufficient role
//! gets 403 rather than 401. `Json` wraps axum's body extractor so
//! malformed bodies surface through the response envelope.

use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use serde::de::DeserializeOwned;

use super::response::ApiError;
use crate::storage::models::Role;
use crate::tokens::jwt::{self, TokenError};
use crate::AppState;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// `axum::Json` with rejections converted to the error envelope.
///
/// A missing or malformed body otherwise short-circuits the handler
/// with axum's plain-text rejection instead of `{ success, message }`.
#[derive(Debug)]
pub struct Json<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

/// The authenticated caller, as asserted by the access cookie.
///
/// Role and id come from the token, not the database: an access token
/// is trusted for its short lifetime and role changes land at the next
/// refresh.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ApiError::Auth("Not logged in".to_string()))?;

        let (id, role) = jwt::verify_access_token(&state.config.auth.access_secret, &token)
            .map_err(|e| match e {
                TokenError::Expired => ApiError::Auth("Session expired".to_string()),
                _ => ApiError::Auth("Invalid session".to_string()),
            })?;

        Ok(AuthUser { id, role })
    }
}

/// An authenticated caller with moderation rights (mod or admin).
#[derive(Debug, Clone)]
pub struct Moderator(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for Moderator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.can_moderate() {
            return Err(ApiError::Forbidden(
                "Moderator access required".to_string(),
            ));
        }
        Ok(Moderator(user))
    }
}

/// An authenticated admin.
#[derive(Debug, Clone)]
pub struct Admin(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(Admin(user))
    }
}
