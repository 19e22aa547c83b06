//! Reference codec for the compact session token.
//!
//! `base64url(header) "." base64url(payload) "." base64url(HMAC-SHA256)`, header fixed
//! to `{"alg":"HS256","typ":"JWT"}`. The edge verifier implements the same checks in
//! the same order without allocation; `tests/lowering_equivalence.rs` holds the two to
//! identical outcomes.

mod error;

pub use self::error::Error;
pub use edge_verifier::TokenError;

use base64ct::{Base64UrlUnpadded, Encoding};
use edge_verifier::{constant_time_eq, MAX_PAYLOAD_LEN};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub alg: String,
    pub typ: String,
}

impl Header {
    #[must_use]
    pub fn hs256() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::hs256()
    }
}

/// Session claims. Times are epoch seconds; `None` means no constraint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl Claims {
    #[must_use]
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            iat: None,
            exp: None,
            nbf: None,
        }
    }

    /// `iat = now`, `exp = now + ttl_seconds`.
    #[must_use]
    pub fn issued(mut self, now: i64, ttl_seconds: i64) -> Self {
        self.iat = Some(now);
        self.exp = Some(now.saturating_add(ttl_seconds));
        self
    }

    #[must_use]
    pub fn not_before(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }
}

#[derive(Deserialize)]
struct TimeBounds {
    exp: Option<i64>,
    nbf: Option<i64>,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn mac(signing_input: &str, secret: &[u8]) -> Result<String, Error> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    Ok(Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes()))
}

/// Map the standard alphabet onto the URL-safe one and drop up to two `=`.
fn normalize(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    for _ in 0..2 {
        if out.ends_with('=') {
            out.pop();
        }
    }
    out
}

/// Decode base64url, also accepting the standard alphabet and padding.
///
/// # Errors
/// Returns an error for invalid characters, length or non-canonical trailing bits.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, base64ct::Error> {
    Base64UrlUnpadded::decode_vec(&normalize(input))
}

/// Compute the signature segment for `header` and `payload`.
///
/// # Errors
/// Returns an error if either value cannot be serialized.
pub fn sign<H: Serialize, P: Serialize>(
    header: &H,
    payload: &P,
    secret: &[u8],
) -> Result<String, Error> {
    let signing_input = format!("{}.{}", b64e_json(header)?, b64e_json(payload)?);
    mac(&signing_input, secret)
}

/// Create a complete HS256 token for `payload`.
///
/// # Errors
/// Returns an error if the payload cannot be serialized.
pub fn encode<P: Serialize>(payload: &P, secret: &[u8]) -> Result<String, Error> {
    let signing_input = format!("{}.{}", b64e_json(&Header::hs256())?, b64e_json(payload)?);
    let signature = mac(&signing_input, secret)?;
    Ok(format!("{signing_input}.{signature}"))
}

/// Verify a session token and return its claims.
///
/// # Errors
/// See [`verify_as`].
pub fn verify(token: &str, secret: &[u8], now: i64) -> Result<Claims, TokenError> {
    verify_as(token, secret, now)
}

/// Verify a token and deserialize its payload as `T`.
///
/// Checks, in order: three segments, decodable payload whose `exp`/`nbf` are
/// integers or absent, signature, `nbf <= now`, `now <= exp`, payload shape.
///
/// # Errors
/// The first failing check as a [`TokenError`]; a payload that does not fit `T` is
/// [`TokenError::MalformedToken`].
pub fn verify_as<T: DeserializeOwned>(
    token: &str,
    secret: &[u8],
    now: i64,
) -> Result<T, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::MalformedToken);
    };

    let payload = decode_base64url(payload_b64).map_err(|_| TokenError::MalformedToken)?;
    if payload.len() > MAX_PAYLOAD_LEN || std::str::from_utf8(&payload).is_err() {
        return Err(TokenError::MalformedToken);
    }
    // a struct would also deserialize from a JSON array
    if payload.iter().find(|b| !b.is_ascii_whitespace()) != Some(&b'{') {
        return Err(TokenError::MalformedToken);
    }
    let bounds: TimeBounds =
        serde_json::from_slice(&payload).map_err(|_| TokenError::MalformedToken)?;

    let expected = mac(&format!("{header_b64}.{payload_b64}"), secret)
        .map_err(|_| TokenError::SignatureInvalid)?;
    let presented = normalize(signature_b64);
    if !constant_time_eq(expected.as_bytes(), presented.as_bytes()) {
        return Err(TokenError::SignatureInvalid);
    }

    if let Some(nbf) = bounds.nbf {
        if now < nbf {
            return Err(TokenError::NotYetValid);
        }
    }
    if let Some(exp) = bounds.exp {
        if now > exp {
            return Err(TokenError::Expired);
        }
    }

    serde_json::from_slice(&payload).map_err(|_| TokenError::MalformedToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    const SECRET: &[u8] = b"s3cr3t-32-bytes-minimum-xxxxxxxx";

    #[test]
    fn sign_matches_well_known_hs256_vector() -> Result<()> {
        let header = json!({"alg": "HS256", "typ": "JWT"});
        let payload = json!({"sub": "1234567890", "name": "John Doe", "iat": 1_516_239_022});
        let signature = sign(&header, &payload, b"your-256-bit-secret")?;
        assert_eq!(signature, "SflKxwRJSMeKKF2QT4fwpMeJf36POk6yJV_adQssw5c");
        Ok(())
    }

    #[test]
    fn round_trip_returns_original_claims() -> Result<()> {
        let claims = Claims::new("user-42").issued(1_000, 3_600).not_before(1_000);
        let token = encode(&claims, SECRET)?;
        for now in [1_000, 2_800, 4_600] {
            assert_eq!(verify(&token, SECRET, now), Ok(claims.clone()));
        }
        Ok(())
    }

    #[test]
    fn header_is_fixed_hs256() -> Result<()> {
        let token = encode(&Claims::new("a"), SECRET)?;
        let header = token.split('.').next().unwrap_or_default();
        assert_eq!(header, "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
        Ok(())
    }

    #[test]
    fn wrong_secret_is_signature_invalid() -> Result<()> {
        let token = encode(&Claims::new("user-42"), SECRET)?;
        assert_eq!(
            verify(&token, b"another-secret-of-32-bytes-xxxxx", 0),
            Err(TokenError::SignatureInvalid)
        );
        Ok(())
    }

    #[test]
    fn time_boundaries() -> Result<()> {
        let now = 1_700_000_000;
        let expired = encode(&json!({"sub": "u", "exp": now - 1}), SECRET)?;
        let boundary = encode(&json!({"sub": "u", "exp": now}), SECRET)?;
        let early = encode(&json!({"sub": "u", "nbf": now + 1}), SECRET)?;
        assert_eq!(verify(&expired, SECRET, now), Err(TokenError::Expired));
        assert!(verify(&boundary, SECRET, now).is_ok());
        assert_eq!(verify(&early, SECRET, now), Err(TokenError::NotYetValid));
        Ok(())
    }

    #[test]
    fn absent_bounds_are_unconstrained() -> Result<()> {
        let token = encode(&Claims::new("user-42"), SECRET)?;
        assert!(verify(&token, SECRET, i64::MAX).is_ok());
        assert!(verify(&token, SECRET, i64::MIN).is_ok());
        Ok(())
    }

    #[test]
    fn malformed_inputs() -> Result<()> {
        assert_eq!(verify("not-a-token", SECRET, 0), Err(TokenError::MalformedToken));
        assert_eq!(verify("a.b.c.d", SECRET, 0), Err(TokenError::MalformedToken));
        assert_eq!(verify("a.*.c", SECRET, 0), Err(TokenError::MalformedToken));

        // a JSON array would satisfy the struct deserializer
        let array = encode(&json!([null, null]), SECRET)?;
        assert_eq!(verify_as::<serde_json::Value>(&array, SECRET, 0), Err(TokenError::MalformedToken));

        let float_exp = encode(&json!({"sub": "u", "exp": 1.5}), SECRET)?;
        assert_eq!(verify(&float_exp, SECRET, 0), Err(TokenError::MalformedToken));

        let no_subject = encode(&json!({"exp": 10}), SECRET)?;
        assert_eq!(verify(&no_subject, SECRET, 0), Err(TokenError::MalformedToken));
        Ok(())
    }

    #[test]
    fn lenient_alphabet_and_padding() -> Result<()> {
        assert_eq!(decode_base64url("-_8")?, vec![0xfb, 0xff]);
        assert_eq!(decode_base64url("+/8=")?, vec![0xfb, 0xff]);
        assert_eq!(decode_base64url("Zg==")?, b"f".to_vec());
        assert!(decode_base64url("Zg===").is_err());
        assert!(decode_base64url("Zh").is_err());

        let token = encode(&Claims::new("user-42"), SECRET)?;
        let (signed, signature) = token.rsplit_once('.').unwrap_or_default();
        let standard: String = signature
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();
        assert!(verify(&format!("{signed}.{standard}="), SECRET, 0).is_ok());
        Ok(())
    }

    #[test]
    fn every_signature_bit_flip_fails() -> Result<()> {
        let token = encode(&Claims::new("user-42").issued(0, 60), SECRET)?;
        let start = token.rfind('.').unwrap_or_default() + 1;
        for index in start..token.len() {
            for bit in 0..8 {
                let mut bytes = token.clone().into_bytes();
                bytes[index] ^= 1 << bit;
                if let Ok(flipped) = String::from_utf8(bytes) {
                    assert!(verify(&flipped, SECRET, 30).is_err(), "{flipped}");
                }
            }
        }
        Ok(())
    }
}
