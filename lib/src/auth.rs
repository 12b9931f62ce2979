//! Challenge-response proof for the hello/identify handshake.
//!
//! The proof is `base64(sha256(base64(sha256(secret + salt)) + challenge))`. Both
//! sides compute it from the shared secret; only the result crosses the wire.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

/// Challenge and salt issued by the server in its hello.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("server hello carries no authentication challenge")]
    MissingChallenge,
}

/// Shared secret, wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

fn sha256_base64(first: &str, second: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    STANDARD.encode(hasher.finalize())
}

pub fn compute_auth_response(secret: &str, challenge: &str, salt: &str) -> String {
    let base = Zeroizing::new(sha256_base64(secret, salt));
    sha256_base64(&base, challenge)
}

/// Builds the identify proof for `secret` against the server's challenge.
///
/// # Errors
///
/// Returns [`AuthError::MissingChallenge`] when the hello carried no challenge.
pub fn respond(secret: &Secret, challenge: Option<&AuthChallenge>) -> Result<String, AuthError> {
    let challenge = challenge.ok_or(AuthError::MissingChallenge)?;
    Ok(compute_auth_response(
        secret.expose(),
        &challenge.challenge,
        &challenge.salt,
    ))
}

/// Checks a client proof in constant time.
pub fn verify(secret: &Secret, challenge: &AuthChallenge, proof: &str) -> bool {
    let expected = compute_auth_response(secret.expose(), &challenge.challenge, &challenge.salt);
    constant_time_eq(expected.as_bytes(), proof.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::{AuthChallenge, AuthError, Secret, compute_auth_response, respond, verify};

    #[test]
    fn matches_short_golden_vector() {
        assert_eq!(
            compute_auth_response("pw", "C", "S"),
            "VWC60yMM5XWsmGiCZZnUciqVhEzf7nvaE8mOkpgD2KQ="
        );
    }

    #[test]
    fn matches_published_example() {
        let proof = compute_auth_response(
            "supersecretpassword",
            "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=",
            "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=",
        );
        assert_eq!(proof, "1Ct943GAT+6YQUUX47Ia/ncufilbe6+oD6lY+5kaCu4=");
    }

    #[test]
    fn respond_requires_challenge() {
        let secret = Secret::new("pw");
        assert_eq!(respond(&secret, None), Err(AuthError::MissingChallenge));
    }

    #[test]
    fn verify_accepts_only_matching_proof() {
        let secret = Secret::new("pw");
        let challenge = AuthChallenge {
            challenge: "C".into(),
            salt: "S".into(),
        };
        let proof = respond(&secret, Some(&challenge)).expect("challenge present");
        assert!(verify(&secret, &challenge, &proof));
        assert!(!verify(&Secret::new("other"), &challenge, &proof));
        assert!(!verify(&secret, &challenge, ""));
    }

    #[test]
    fn secret_debug_is_redacted() {
        assert_eq!(format!("{:?}", Secret::new("hunter2")), "Secret(***)");
    }
}
