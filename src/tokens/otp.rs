//! One-time passwords for email verification.
//!
//! Only the sha256 hash of the code is stored; the plaintext goes out
//! through the notifier and is compared by hash on verification.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a 6-digit numeric code.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

/// Hash a code for storage.
pub fn hash_otp(otp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(otp.as_bytes());
    hex::encode(hasher.finalize())
}

/// Expiry timestamp for a freshly issued code.
pub fn otp_expiry(minutes: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(minutes)
}

/// Check a submitted code against the stored hash and expiry.
pub fn verify_otp(otp: &str, stored_hash: &str, expiry: Option<DateTime<Utc>>) -> bool {
    let unexpired = match expiry {
        Some(expiry) => Utc::now() <= expiry,
        None => false,
    };
    unexpired && hash_otp(otp) == stored_hash
}
