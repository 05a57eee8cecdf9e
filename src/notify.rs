//! Outbound notification dispatch.
//!
//! Every moderation transition notifies the affected user by email.
//! Dispatch is fire-and-forget relative to the triggering operation:
//! the operation returns before (or without waiting for) delivery, and
//! delivery failures are logged but never propagated. Moderation
//! throughput is deliberately decoupled from mail-server latency.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::storage::models::ResourceKind;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Mail relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mail relay rejected the message: {0}")]
    Rejected(String),
}

/// The messages the platform sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum Notification {
    EmailOtp { otp: String },
    ModRequestApproved,
    ModRequestRejected,
    PasswordResetOtp { otp: String },
    ResourceApproved { kind: ResourceKind },
    ResourceRejected { kind: ResourceKind, reason: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        notification: Notification,
    ) -> Result<(), NotifyError>;
}

/// Spawn delivery in the background and swallow failures.
///
/// This is the only way moderation code sends mail; awaiting the
/// notifier directly from a state transition would couple the
/// transition to mail-server availability.
pub fn dispatch(notifier: Arc<dyn Notifier>, to_email: String, to_name: String, n: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&to_email, &to_name, n).await {
            tracing::warn!(error = %e, to = %to_email, "Notification delivery failed");
        }
    });
}

// ============================================================================
// HTTP mail relay
// ============================================================================

#[derive(Serialize)]
struct MailPayload<'a> {
    to_email: &'a str,
    to_name: &'a str,
    #[serde(flatten)]
    notification: &'a Notification,
}

pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, relay_url })
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        notification: Notification,
    ) -> Result<(), NotifyError> {
        let payload = MailPayload {
            to_email,
            to_name,
            notification: &notification,
        };
        let response = self
            .client
            .post(&self.relay_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().to_string()));
        }

        tracing::debug!(to = %to_email, "Notification sent");
        Ok(())
    }
}

// ============================================================================
// Recording notifier (tests)
// ============================================================================

/// Captures outbound messages instead of delivering them.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All (recipient email, notification) pairs sent so far.
    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        to_email: &str,
        _to_name: &str,
        notification: Notification,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), notification));
        Ok(())
    }
}
