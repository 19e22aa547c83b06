use core::fmt;

/// Reasons a request is not admitted at the edge.
///
/// The host never branches on the variant: all of them produce the same redirect.
/// They exist so tests (and a future UX) can tell the cases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Cookie absent or empty.
    NoCredential,
    /// Wrong segment count, undecodable base64 or unparsable claims.
    MalformedToken,
    /// Recomputed HMAC does not match the signature segment.
    SignatureInvalid,
    /// `now < nbf`.
    NotYetValid,
    /// `now > exp`.
    Expired,
    /// The secret could not be loaded; treated exactly like a bad signature.
    SecretUnavailable,
}

impl TokenError {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoCredential => "no credential",
            Self::MalformedToken => "malformed token",
            Self::SignatureInvalid => "signature invalid",
            Self::NotYetValid => "token not yet valid",
            Self::Expired => "token expired",
            Self::SecretUnavailable => "secret unavailable",
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::error::Error for TokenError {}
