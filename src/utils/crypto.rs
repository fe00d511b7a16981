//! Password hashing.
//!
//! bcrypt embeds a random salt and the cost in every hash, so equal passwords
//! produce different hashes and `verify_password` needs nothing but the hash.

/// Work factor used when `BCRYPT_COST` is not set.
pub const DEFAULT_HASH_COST: u32 = 10;

pub fn hash_password(plain: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, cost)
}

pub fn verify_password(plain: &str, hashed: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(plain, hashed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_and_verifiable() {
        let first = hash_password("secret1", 4).unwrap();
        let second = hash_password("secret1", 4).unwrap();

        assert_ne!(first, "secret1");
        assert_ne!(first, second);
        assert!(verify_password("secret1", &first).unwrap());
        assert!(verify_password("secret1", &second).unwrap());
        assert!(!verify_password("secret2", &first).unwrap());
    }

    #[test]
    fn default_cost_is_recorded_in_hash() {
        let hashed = hash_password("secret1", DEFAULT_HASH_COST).unwrap();
        assert!(hashed.starts_with("$2b$10$"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("secret1", "not-a-hash").is_err());
    }
}
