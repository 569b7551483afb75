use argon2::Argon2;
use crate::error::AppError;
use rand::Rng;

/// Random per-account salt
pub fn generate_salt() -> [u8; 32] {
    rand::thread_rng().gen()
}

/// Argon2id digest of the password under `salt`
pub fn hash_password(password: &str, salt: &[u8]) -> Result<[u8; 32], AppError> {
    let argon2 = Argon2::default();
    let mut hash = [0u8; 32];

    argon2
        .hash_password_into(password.as_bytes(), salt, &mut hash)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(hash)
}

/// Compares against a stored digest. Stored values of the wrong length never match.
pub fn verify_password(password: &str, stored_hash: &[u8], salt: &[u8]) -> Result<bool, AppError> {
    let computed_hash = hash_password(password, salt)?;
    Ok(computed_hash.as_slice() == stored_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify() {
        let password = "correct horse battery";
        let salt = generate_salt();

        let hash = hash_password(password, &salt).unwrap();
        assert!(verify_password(password, &hash, &salt).unwrap());
        assert!(!verify_password("wrong_password", &hash, &salt).unwrap());
    }

    #[test]
    fn test_salt_changes_digest() {
        let a = hash_password("same password", &generate_salt()).unwrap();
        let b = hash_password("same password", &generate_salt()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_truncated_hash_never_matches() {
        let salt = generate_salt();
        let hash = hash_password("secret pass", &salt).unwrap();
        assert!(!verify_password("secret pass", &hash[..16], &salt).unwrap());
    }
}
