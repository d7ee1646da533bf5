use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};

/// Hash a staff PIN or device API key for storage. Provisioning lives
/// outside this service, so only tests write hashes.
#[cfg(test)]
pub fn hash_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};

    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2.hash_password(secret.as_bytes(), &salt)?.to_string())
}

pub fn verify_secret(secret: &str, hashed: &str) -> Result<(), argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed = PasswordHash::new(hashed)?;

    argon2.verify_password(secret.as_bytes(), &parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_original_secret() {
        let hashed = hash_secret("4711").unwrap();
        assert!(verify_secret("4711", &hashed).is_ok());
        assert!(verify_secret("4712", &hashed).is_err());
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_panic() {
        assert!(verify_secret("4711", "not-a-phc-string").is_err());
    }
}
