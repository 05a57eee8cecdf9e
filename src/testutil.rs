//! Shared test helpers.

use tempfile::TempDir;

use crate::config::AuthConfig;
use crate::lifecycle::ResourceMetadata;
use crate::storage::models::User;
use crate::storage::Database;

/// Open a fresh database in a temp dir. Keep the `TempDir` alive for
/// the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp = TempDir::new().expect("create temp dir");
    let db = Database::open(temp.path()).expect("open database");
    (db, temp)
}

/// A verified, active user with a throwaway password hash.
pub fn make_user(id: &str, email: &str) -> User {
    let mut user = User::new(
        id.to_string(),
        format!("User {id}"),
        email.to_string(),
        "$2b$04$test.hash.placeholder".to_string(),
    );
    user.is_email_verified = true;
    user
}

/// Valid metadata for a note-shaped resource.
pub fn make_metadata(title: &str) -> ResourceMetadata {
    ResourceMetadata {
        course_code: "CSE101".to_string(),
        course_name: "Data Structures".to_string(),
        program: "B.Tech CSE".to_string(),
        semester: 3,
        title: title.to_string(),
        year: None,
    }
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        access_secret: "test-access-secret".to_string(),
        refresh_secret: "test-refresh-secret".to_string(),
        secure_cookies: false,
        ..AuthConfig::default()
    }
}
