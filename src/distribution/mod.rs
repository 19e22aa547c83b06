//! Getting the signing secret to the edge.
//!
//! Two strategies, which must leave the verifier with the same bytes the issuer
//! signs with:
//!
//! - [`inline`]: substitute the secret into the edge configuration artifact at build
//!   time.
//! - [`kv`]: write the secret to a key/value store the edge reads per request.

pub mod inline;
pub mod kv;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("placeholder {placeholder} must occur exactly once in the template, found {found}")]
    Placeholder {
        placeholder: &'static str,
        found: usize,
    },
    #[error("secret content collides with placeholder {0}")]
    Collision(&'static str),
    #[error("distributed secret does not match the signing secret")]
    Mismatch,
    #[error("invalid key/value key: {0:?}")]
    InvalidKey(String),
    #[error("key/value store returned {status} for {key}")]
    Store { key: String, status: u16 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
