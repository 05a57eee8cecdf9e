//! Password hashing (bcrypt).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Check a plaintext password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    Ok(bcrypt::verify(password, hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("Secr3t!pw").unwrap();
        assert!(verify_password("Secr3t!pw", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let h1 = hash_password("Secr3t!pw").unwrap();
        let h2 = hash_password("Secr3t!pw").unwrap();
        assert_ne!(h1, h2);
    }
}
