//! Authorization state carried between `authorize` and `callback`.
//!
//! The state lives in the browser as the `auth-flow` cookie, sealed as a codec token
//! under a key derived from the signing secret so it can never pass as a session.

use super::IssuerError;
use crate::token;
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const FLOW_COOKIE_NAME: &str = "auth-flow";
pub const FLOW_TTL_SECONDS: i64 = 10 * 60;
/// Bound on a return path as serialized into the flow state, so a sealed flow always
/// stays under the codec's payload limit.
pub const MAX_RETURN_TO_LEN: usize = 1024;

const FLOW_KEY_LABEL: &[u8] = b"edgeward auth-flow v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowState {
    pub state: String,
    pub nonce: String,
    /// PKCE code verifier.
    pub verifier: String,
    pub return_to: String,
    pub exp: i64,
}

impl FlowState {
    #[must_use]
    pub fn new(return_to: String, now: i64) -> Self {
        Self {
            state: random_token(32),
            nonce: random_token(32),
            verifier: random_token(64),
            return_to,
            exp: now.saturating_add(FLOW_TTL_SECONDS),
        }
    }

    /// S256 code challenge: `base64url(sha256(verifier))`.
    #[must_use]
    pub fn code_challenge(&self) -> String {
        Base64UrlUnpadded::encode_string(&Sha256::digest(self.verifier.as_bytes()))
    }

    /// # Errors
    /// Returns an error if the state cannot be serialized.
    pub fn seal(&self, secret: &[u8]) -> Result<String, IssuerError> {
        Ok(token::encode(self, &flow_key(secret)?)?)
    }

    /// # Errors
    /// [`IssuerError::InvalidState`] if the cookie was not sealed with `secret` or has
    /// expired.
    pub fn open(sealed: &str, secret: &[u8], now: i64) -> Result<Self, IssuerError> {
        token::verify_as(sealed, &flow_key(secret)?, now)
            .map_err(|_| IssuerError::InvalidState("invalid or expired authorization state"))
    }
}

fn flow_key(secret: &[u8]) -> Result<Vec<u8>, IssuerError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| token::Error::Key)?;
    mac.update(FLOW_KEY_LABEL);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Length of `path` as a JSON string body; control characters are rejected earlier,
/// so only `"` gains an escape.
fn serialized_len(path: &str) -> usize {
    path.len() + path.matches('"').count()
}

/// Sanitise a post-login return path, falling back to `fallback`.
///
/// Only same-origin absolute paths are kept; the fragment is dropped.
#[must_use]
pub fn validate_return_to(candidate: Option<&str>, fallback: &str) -> String {
    let Some(raw) = candidate else {
        return fallback.to_string();
    };
    let path = raw.split('#').next().unwrap_or_default();

    let acceptable = path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains("://")
        && !path.contains('\\')
        && serialized_len(path) <= MAX_RETURN_TO_LEN
        && !path.chars().any(char::is_control);

    if acceptable {
        path.to_string()
    } else {
        fallback.to_string()
    }
}
