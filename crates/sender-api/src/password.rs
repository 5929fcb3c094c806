use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Stand-in digest checked when a login names no account.
static DUMMY_DIGEST: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-account").ok());

/// Hash a password with Argon2id and a fresh random salt. Returns a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored PHC string. A malformed digest is a mismatch.
pub fn verify_password(password: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Like `verify_password`, but a missing digest still costs one Argon2
/// verification so unknown accounts answer as slowly as wrong passwords.
pub fn verify_password_or_dummy(password: &str, digest: Option<&str>) -> bool {
    match digest {
        Some(digest) => verify_password(password, digest),
        None => {
            if let Some(dummy) = DUMMY_DIGEST.as_deref() {
                let _ = verify_password(password, dummy);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let digest = hash_password("pw123456").unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(verify_password("pw123456", &digest));
        assert!(!verify_password("pw1234567", &digest));
    }

    #[test]
    fn salts_differ_per_call() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn malformed_digest_fails_closed() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", "$argon2id$v=19$m=19456,t=2,p=1$garbage"));
    }

    #[test]
    fn missing_digest_never_verifies() {
        assert!(DUMMY_DIGEST.is_some());
        assert!(!verify_password_or_dummy("no-such-account", None));
        assert!(!verify_password_or_dummy("pw123456", None));

        let digest = hash_password("pw123456").unwrap();
        assert!(verify_password_or_dummy("pw123456", Some(&digest)));
    }
}
