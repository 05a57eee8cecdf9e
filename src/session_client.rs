//! Cookie-based API client with transparent session refresh.
//!
//! When a request comes back 401, the client refreshes the access
//! credential and retries the original request once. Concurrent
//! requests that fail together share a single refresh: the refresh
//! path is serialized behind a mutex, and a generation counter lets
//! late arrivals detect that a refresh already happened while they
//! were waiting, so they skip their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server rejected the request: {0}")]
    Rejected(StatusCode),
    #[error("Session expired and could not be refreshed")]
    SessionExpired,
}

pub struct SessionClient {
    base_url: String,
    client: reqwest::Client,
    /// Bumped after every successful refresh.
    generation: AtomicU64,
    refresh_gate: Mutex<()>,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
            generation: AtomicU64::new(0),
            refresh_gate: Mutex::new(()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SessionError::Rejected(response.status()));
        }
        Ok(())
    }

    /// Best-effort; local cookie state is cleared by the server's
    /// removal cookies regardless of the outcome.
    pub async fn logout(&self) {
        if let Err(e) = self.client.post(self.url("/auth/logout")).send().await {
            tracing::debug!(error = %e, "Logout request failed");
        }
    }

    /// Send a request, refreshing the session and retrying once on 401.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, SessionError> {
        let observed = self.generation.load(Ordering::Acquire);

        let response = self.send(method.clone(), path, body.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        self.refresh(observed).await?;

        let response = self.send(method, path, body.as_ref()).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SessionError::SessionExpired);
        }
        Ok(response)
    }

    pub async fn get(&self, path: &str) -> Result<Response, SessionError> {
        self.request(Method::GET, path, None).await
    }

    /// Refresh the access credential, unless another caller already did
    /// so after `observed` was read.
    async fn refresh(&self, observed: u64) -> Result<(), SessionError> {
        let _guard = self.refresh_gate.lock().await;

        if self.generation.load(Ordering::Acquire) > observed {
            // A refresh landed while we were queued; reuse it.
            return Ok(());
        }

        let response = self
            .client
            .post(self.url("/auth/refresh-token"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SessionError::SessionExpired);
        }

        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("Session refreshed");
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, SessionError> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}
