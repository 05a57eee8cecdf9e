use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three kinds of shareable study material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Note,
    Pyq,
    Syllabus,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Note => "note",
            ResourceKind::Pyq => "pyq",
            ResourceKind::Syllabus => "syllabus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "notes" | "note" => Some(ResourceKind::Note),
            "pyqs" | "pyq" => Some(ResourceKind::Pyq),
            "syllabus" | "syllabi" => Some(ResourceKind::Syllabus),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Reference to a stored blob: the public URL plus the opaque
/// identifier the blob store needs for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub blob_id: String,
    pub url: String,
}

/// An uploaded study-material record. One shape for all three kinds;
/// `year` is populated only for PYQs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub course_code: String,
    pub course_name: String,
    pub created_at: DateTime<Utc>,
    pub file: FileRef,
    pub id: String,
    pub kind: ResourceKind,
    pub owner_id: String,
    pub program: String,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub semester: u8,
    pub status: ModerationStatus,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub year: Option<String>,
}

impl Resource {
    /// Clear both review field groups (used when a resource re-enters
    /// the pending state after an edit).
    pub fn clear_review_fields(&mut self) {
        self.approved_by = None;
        self.approved_at = None;
        self.rejected_by = None;
        self.rejected_at = None;
        self.rejection_reason = None;
    }
}

/// Account roles. Admin covers all moderator actions; moderators
/// cannot perform admin-only user management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Mod,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Mod => "mod",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "mod" => Some(Role::Mod),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// True if this role is allowed to moderate content.
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Mod | Role::Admin)
    }
}

/// State of a user's request to become a moderator. Absent until the
/// user submits one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// An account holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub contact_no: Option<String>,
    pub contributions: i64,
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub email_otp_expiry: Option<DateTime<Utc>>,
    pub email_otp_hash: Option<String>,
    pub id: String,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub mod_motivation: Option<String>,
    pub mod_request: Option<ModRequestStatus>,
    pub mod_request_at: Option<DateTime<Utc>>,
    pub name: String,
    /// bcrypt hash; never serialized into API responses.
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub role: Role,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            contact_no: None,
            contributions: 0,
            created_at: now,
            email,
            email_otp_expiry: None,
            email_otp_hash: None,
            id,
            is_active: true,
            is_email_verified: false,
            mod_motivation: None,
            mod_request: None,
            mod_request_at: None,
            name,
            password_hash,
            refresh_token: None,
            role: Role::User,
            updated_at: now,
        }
    }
}
