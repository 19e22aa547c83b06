//! Build-time substitution of the secret into the edge configuration artifact.

use super::DistributionError;
use std::{fmt::Write, ops::Range};

pub const SECRET_PLACEHOLDER: &str = "__placeholder-for-jwt-secret__";
pub const PREFIX_PLACEHOLDER: &str = "__placeholder-for-auth-route-prefix__";
pub const COOKIE_PLACEHOLDER: &str = "__placeholder-for-cookie-name__";

/// Template shipped with the binary; `edge render --template` overrides it.
pub const DEFAULT_TEMPLATE: &str = include_str!("edge_config.rs.in");

const PLACEHOLDERS: [&str; 3] = [SECRET_PLACEHOLDER, PREFIX_PLACEHOLDER, COOKIE_PLACEHOLDER];

/// A rendered artifact and where the secret literal sits in it.
#[derive(Debug, Clone)]
pub struct EdgeArtifact {
    text: String,
    secret_span: Range<usize>,
}

impl EdgeArtifact {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }

    /// Decode the byte-string escapes written in place of the secret placeholder.
    ///
    /// # Errors
    /// [`DistributionError::Mismatch`] if the span is not a run of `\xNN` escapes.
    pub fn embedded_secret(&self) -> Result<Vec<u8>, DistributionError> {
        let literal = self
            .text
            .get(self.secret_span.clone())
            .ok_or(DistributionError::Mismatch)?;
        let mut chunks = literal.split("\\x");
        if chunks.next() != Some("") {
            return Err(DistributionError::Mismatch);
        }
        let mut digits = String::with_capacity(literal.len() / 2);
        for chunk in chunks {
            if chunk.len() != 2 {
                return Err(DistributionError::Mismatch);
            }
            digits.push_str(chunk);
        }
        hex::decode(digits).map_err(|_| DistributionError::Mismatch)
    }

    /// Require the embedded secret to equal `secret` byte for byte.
    ///
    /// # Errors
    /// [`DistributionError::Mismatch`] otherwise.
    pub fn verify_secret(&self, secret: &[u8]) -> Result<(), DistributionError> {
        if edge_verifier::constant_time_eq(&self.embedded_secret()?, secret) {
            Ok(())
        } else {
            Err(DistributionError::Mismatch)
        }
    }
}

fn escape_bytes(secret: &[u8]) -> String {
    let encoded = hex::encode(secret);
    let mut out = String::with_capacity(encoded.len() * 2);
    for pair in encoded.as_bytes().chunks(2) {
        out.push_str("\\x");
        for &digit in pair {
            out.push(char::from(digit));
        }
    }
    out
}

fn escape_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let _ = write!(out, "{}", c.escape_default());
    }
    out
}

/// Substitute the secret, route prefix and cookie name into `template`.
///
/// Every placeholder must occur exactly once. Substitution is a single pass over the
/// template, so substituted values are never scanned again.
///
/// # Errors
/// - [`DistributionError::Placeholder`] for a missing or repeated placeholder
/// - [`DistributionError::Collision`] if the secret bytes contain a placeholder
pub fn render(
    template: &str,
    secret: &[u8],
    auth_route_prefix: &str,
    cookie_name: &str,
) -> Result<EdgeArtifact, DistributionError> {
    let mut positions = Vec::with_capacity(PLACEHOLDERS.len());
    for placeholder in PLACEHOLDERS {
        let found: Vec<usize> = template.match_indices(placeholder).map(|(at, _)| at).collect();
        if found.len() != 1 {
            return Err(DistributionError::Placeholder {
                placeholder,
                found: found.len(),
            });
        }
        if secret
            .windows(placeholder.len())
            .any(|window| window == placeholder.as_bytes())
        {
            return Err(DistributionError::Collision(placeholder));
        }
        positions.push((found[0], placeholder));
    }
    positions.sort_unstable();

    let mut text = String::with_capacity(template.len() + secret.len() * 4);
    let mut secret_span = 0..0;
    let mut cursor = 0;
    for (at, placeholder) in positions {
        text.push_str(&template[cursor..at]);
        let start = text.len();
        match placeholder {
            SECRET_PLACEHOLDER => {
                text.push_str(&escape_bytes(secret));
                secret_span = start..text.len();
            }
            PREFIX_PLACEHOLDER => text.push_str(&escape_str(auth_route_prefix)),
            _ => text.push_str(&escape_str(cookie_name)),
        }
        cursor = at + placeholder.len();
    }
    text.push_str(&template[cursor..]);

    Ok(EdgeArtifact { text, secret_span })
}
