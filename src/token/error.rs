use thiserror::Error;

/// Failures while minting a token. Verification failures are
/// [`edge_verifier::TokenError`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid signing key")]
    Key,
}
