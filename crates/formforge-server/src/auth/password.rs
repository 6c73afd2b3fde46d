use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use formforge_core::ct_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::{Display, Formatter};

type HmacSha256 = Hmac<Sha256>;

const DIGEST_SCHEME: &str = "pbkdf2-sha256";
const DERIVED_KEY_LEN: usize = 32;

#[derive(Debug)]
pub struct PasswordError(pub String);

impl Display for PasswordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for PasswordError {}

/// PBKDF2-HMAC-SHA256, single 32-byte output block.
fn derive_key(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<[u8; DERIVED_KEY_LEN], PasswordError> {
    let mut mac =
        HmacSha256::new_from_slice(password).map_err(|e| PasswordError(e.to_string()))?;
    mac.update(salt);
    mac.update(&1_u32.to_be_bytes());
    let mut round: [u8; DERIVED_KEY_LEN] = mac.finalize().into_bytes().into();
    let mut block = round;
    for _ in 1..iterations {
        let mut mac =
            HmacSha256::new_from_slice(password).map_err(|e| PasswordError(e.to_string()))?;
        mac.update(&round);
        round = mac.finalize().into_bytes().into();
        for (acc, next) in block.iter_mut().zip(round.iter()) {
            *acc ^= next;
        }
    }
    Ok(block)
}

/// Encodes password, salt, and iteration count into a self-describing digest:
/// `pbkdf2-sha256$<iterations>$<salt_b64>$<key_b64>`.
pub fn hash_password(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<String, PasswordError> {
    let iterations = iterations.max(1);
    let key = derive_key(password.as_bytes(), salt, iterations)?;
    Ok(format!(
        "{DIGEST_SCHEME}${iterations}${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(key)
    ))
}

#[must_use]
pub fn verify_password(password: &str, digest: &str) -> bool {
    let mut parts = digest.split('$');
    let (Some(scheme), Some(raw_iterations), Some(raw_salt), Some(raw_key), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != DIGEST_SCHEME {
        return false;
    }
    let Ok(iterations) = raw_iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        URL_SAFE_NO_PAD.decode(raw_salt),
        URL_SAFE_NO_PAD.decode(raw_key),
    ) else {
        return false;
    };
    match derive_key(password.as_bytes(), &salt, iterations.max(1)) {
        Ok(key) => ct_eq(&key, &expected),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_round_trips() {
        let digest = hash_password("hunter2", b"salt-bytes", 1000).expect("hash");
        assert!(digest.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("hunter2", &digest));
        assert!(!verify_password("hunter3", &digest));
    }

    #[test]
    fn same_password_different_salt_differs() {
        let a = hash_password("hunter2", b"salt-a", 1000).expect("hash");
        let b = hash_password("hunter2", b"salt-b", 1000).expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_digests_never_verify() {
        assert!(!verify_password("x", "not-a-digest"));
        assert!(!verify_password("x", "pbkdf2-sha256$abc$AA$AA"));
        assert!(!verify_password("x", "pbkdf2-sha256$10$!!$AA"));
    }
}
