use core::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{base64url, claims, constant_time_eq, find_cookie, SecretSource, TimeBounds, TokenError};

type HmacSha256 = Hmac<Sha256>;

/// Appended to the route prefix to form the redirect target.
pub const AUTHORIZE_PATH: &str = "/oidc/authorize";
pub const DEFAULT_COOKIE_NAME: &str = "auth-token";
pub const DEFAULT_AUTH_ROUTE_PREFIX: &str = "/auth";

/// Compile-time logging gate. With the `log` feature off no line is ever built.
pub const LOGGING_ENABLED: bool = cfg!(feature = "log");

/// Host logging hook. Receives exactly one string per line.
pub type LogSink = fn(&str);

/// Largest decoded payload accepted; bigger tokens are malformed.
pub const MAX_PAYLOAD_LEN: usize = 2048;

/// Length of an unpadded base64url HMAC-SHA256 signature.
pub const SIGNATURE_LEN: usize = base64url::encoded_len(32);

/// Compute the encoded signature over `header "." payload` (both already encoded).
///
/// # Errors
///
/// [`TokenError::SecretUnavailable`] if the MAC cannot be keyed.
pub fn sign_into(
    header: &[u8],
    payload: &[u8],
    secret: &[u8],
) -> Result<[u8; SIGNATURE_LEN], TokenError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| TokenError::SecretUnavailable)?;
    mac.update(header);
    mac.update(b".");
    mac.update(payload);
    let tag = mac.finalize().into_bytes();

    let mut out = [0u8; SIGNATURE_LEN];
    match base64url::encode(&tag, &mut out) {
        Some(SIGNATURE_LEN) => Ok(out),
        _ => Err(TokenError::SignatureInvalid),
    }
}

/// Canonical (URL-safe, unpadded) form of a presented signature segment.
fn normalize_signature(segment: &[u8], out: &mut [u8; SIGNATURE_LEN]) -> Option<()> {
    let segment = base64url::strip_padding(segment);
    if segment.len() != SIGNATURE_LEN {
        return None;
    }
    for (dst, src) in out.iter_mut().zip(segment) {
        *dst = match *src {
            b'+' => b'-',
            b'/' => b'_',
            other => other,
        };
    }
    Some(())
}

/// Verify a compact token and return its time bounds.
///
/// Checks, in order: three segments, decodable payload with parsable claims,
/// signature, `nbf`, `exp`. `exp == now` is still valid.
///
/// # Errors
///
/// The first failing check as a [`TokenError`].
pub fn verify_token(token: &str, secret: &[u8], now: i64) -> Result<TimeBounds, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::MalformedToken);
    };

    let mut decoded = [0u8; MAX_PAYLOAD_LEN];
    let len = base64url::decode_lenient(payload.as_bytes(), &mut decoded)
        .ok_or(TokenError::MalformedToken)?;
    let bounds = claims::scan(&decoded[..len]).ok_or(TokenError::MalformedToken)?;

    let expected = sign_into(header.as_bytes(), payload.as_bytes(), secret)?;
    let mut presented = [0u8; SIGNATURE_LEN];
    if normalize_signature(signature.as_bytes(), &mut presented).is_none()
        || !constant_time_eq(&expected, &presented)
    {
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

    Ok(bounds)
}

/// Values fixed when the verifier artifact is built.
#[derive(Clone, Copy)]
pub struct Settings<'a> {
    pub cookie_name: &'a str,
    /// Route prefix without trailing slash, e.g. `/auth`. May be empty.
    pub auth_route_prefix: &'a str,
    pub log: Option<LogSink>,
}

impl Settings<'static> {
    pub const DEFAULT: Self = Self {
        cookie_name: DEFAULT_COOKIE_NAME,
        auth_route_prefix: DEFAULT_AUTH_ROUTE_PREFIX,
        log: None,
    };
}

impl Default for Settings<'static> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// `{prefix}/oidc/authorize`, kept as two borrowed parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
    prefix: &'a str,
}

impl<'a> Location<'a> {
    #[must_use]
    pub const fn prefix(&self) -> &'a str {
        self.prefix
    }

    #[must_use]
    pub const fn parts(&self) -> [&'a str; 2] {
        [self.prefix, AUTHORIZE_PATH]
    }
}

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix)?;
        f.write_str(AUTHORIZE_PATH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Pass the request to the origin unmodified.
    Forward,
    /// Answer with a redirect to the authorization route.
    Redirect(Location<'a>),
}

pub struct Verifier<'a, S> {
    secret: S,
    settings: Settings<'a>,
}

impl<'a, S: SecretSource> Verifier<'a, S> {
    pub const fn new(secret: S, settings: Settings<'a>) -> Self {
        Self { secret, settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings<'a> {
        &self.settings
    }

    /// Full check of a request given its `Cookie` header values.
    ///
    /// # Errors
    ///
    /// [`TokenError::NoCredential`] when the cookie is missing or empty, otherwise
    /// whatever secret loading or [`verify_token`] reports.
    pub fn check<'h, I>(&self, cookie_headers: I, now: i64) -> Result<TimeBounds, TokenError>
    where
        I: IntoIterator<Item = &'h str>,
    {
        let token = cookie_headers
            .into_iter()
            .find_map(|header| find_cookie(header, self.settings.cookie_name))
            .filter(|value| !value.is_empty())
            .ok_or(TokenError::NoCredential)?;

        self.secret
            .with_secret(|secret| verify_token(token, secret, now))?
    }

    /// Forward or redirect. Every error produces the same redirect.
    pub fn decide<'h, I>(&self, cookie_headers: I, now: i64) -> Decision<'a>
    where
        I: IntoIterator<Item = &'h str>,
    {
        match self.check(cookie_headers, now) {
            Ok(_) => Decision::Forward,
            Err(err) => {
                self.log(err.as_str());
                Decision::Redirect(Location {
                    prefix: self.settings.auth_route_prefix,
                })
            }
        }
    }

    fn log(&self, line: &str) {
        if LOGGING_ENABLED {
            if let Some(sink) = self.settings.log {
                sink(line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InlineSecret, KeyValueRead, KeyValueSecret, ReadError};

    const SECRET: &[u8] = b"s3cr3t-32-bytes-minimum-xxxxxxxx";
    // {"alg":"HS256","typ":"JWT"}
    const HEADER: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

    fn token(payload_json: &str, secret: &[u8]) -> String {
        let mut payload = [0u8; 512];
        let n = base64url::encode(payload_json.as_bytes(), &mut payload).unwrap();
        let payload = core::str::from_utf8(&payload[..n]).unwrap();
        let signature = sign_into(HEADER.as_bytes(), payload.as_bytes(), secret).unwrap();
        let signature = core::str::from_utf8(&signature).unwrap();
        [HEADER, payload, signature].join(".")
    }

    #[test]
    fn matches_well_known_hs256_vector() {
        let signature = sign_into(
            HEADER.as_bytes(),
            b"eyJzdWIiOiIxMjM0NTY3ODkwIiwibmFtZSI6IkpvaG4gRG9lIiwiaWF0IjoxNTE2MjM5MDIyfQ",
            b"your-256-bit-secret",
        )
        .unwrap();
        assert_eq!(&signature[..], b"SflKxwRJSMeKKF2QT4fwpMeJf36POk6yJV_adQssw5c");
    }

    #[test]
    fn time_boundaries() {
        let t = token(r#"{"sub":"user-42","exp":1000,"nbf":500}"#, SECRET);
        assert!(verify_token(&t, SECRET, 1000).is_ok());
        assert!(verify_token(&t, SECRET, 500).is_ok());
        assert_eq!(verify_token(&t, SECRET, 1001), Err(TokenError::Expired));
        assert_eq!(verify_token(&t, SECRET, 499), Err(TokenError::NotYetValid));
    }

    #[test]
    fn absent_bounds_are_unconstrained() {
        let t = token(r#"{"sub":"user-42"}"#, SECRET);
        assert_eq!(verify_token(&t, SECRET, i64::MAX), Ok(TimeBounds::default()));
        assert_eq!(verify_token(&t, SECRET, i64::MIN), Ok(TimeBounds::default()));
    }

    #[test]
    fn wrong_secret() {
        let t = token(r#"{"sub":"user-42","exp":1000}"#, SECRET);
        assert_eq!(
            verify_token(&t, b"another-secret-of-32-bytes-xxxxx", 0),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn malformed_tokens() {
        assert_eq!(verify_token("not-a-token", SECRET, 0), Err(TokenError::MalformedToken));
        assert_eq!(verify_token("a.b", SECRET, 0), Err(TokenError::MalformedToken));
        assert_eq!(verify_token("a.b.c.d", SECRET, 0), Err(TokenError::MalformedToken));
        assert_eq!(verify_token("a.!!!.c", SECRET, 0), Err(TokenError::MalformedToken));
        // "bm90IGpzb24" is "not json"
        assert_eq!(
            verify_token("a.bm90IGpzb24.c", SECRET, 0),
            Err(TokenError::MalformedToken)
        );
    }

    #[test]
    fn accepts_standard_alphabet_signature() {
        let t = token(r#"{"sub":"user-42","n":7}"#, SECRET);
        let (signed, signature) = t.rsplit_once('.').unwrap();
        let variant: String = signature
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();
        let padded = [signed, ".", variant.as_str(), "="].concat();
        assert!(verify_token(&padded, SECRET, 0).is_ok());
    }

    fn cookie(t: &str) -> String {
        ["theme=dark; auth-token=", t].concat()
    }

    #[test]
    fn decide_forwards_valid_and_redirects_otherwise() {
        let verifier = Verifier::new(InlineSecret(SECRET), Settings::DEFAULT);
        let t = token(r#"{"sub":"user-42","exp":1000}"#, SECRET);
        let header = cookie(&t);

        assert_eq!(verifier.decide([header.as_str()], 10), Decision::Forward);

        let redirect = verifier.decide([header.as_str()], 2000);
        let Decision::Redirect(location) = redirect else {
            panic!("expected redirect");
        };
        assert_eq!(location.to_string(), "/auth/oidc/authorize");
        assert_eq!(verifier.decide(["theme=dark"], 10), redirect);
        assert_eq!(verifier.decide(["auth-token=not-a-token"], 10), redirect);
        assert_eq!(verifier.decide(Vec::<&str>::new(), 10), redirect);
    }

    #[test]
    fn cookie_found_in_any_header() {
        let verifier = Verifier::new(InlineSecret(SECRET), Settings::DEFAULT);
        let t = token(r#"{"sub":"user-42"}"#, SECRET);
        let second = ["auth-token=", t.as_str()].concat();
        assert!(verifier.check(["theme=dark", second.as_str()], 0).is_ok());
    }

    #[test]
    fn empty_cookie_is_no_credential() {
        let verifier = Verifier::new(InlineSecret(SECRET), Settings::DEFAULT);
        assert_eq!(verifier.check(["auth-token="], 0), Err(TokenError::NoCredential));
        assert_eq!(verifier.check(["other=1"], 0), Err(TokenError::NoCredential));
        assert_eq!(
            verifier.check(["auth-token=not-a-token"], 0),
            Err(TokenError::MalformedToken)
        );
    }

    #[test]
    fn custom_prefix_and_cookie_name() {
        let settings = Settings {
            cookie_name: "session",
            auth_route_prefix: "",
            log: None,
        };
        let verifier = Verifier::new(InlineSecret(SECRET), settings);
        let Decision::Redirect(location) = verifier.decide(["auth-token=x"], 0) else {
            panic!("expected redirect");
        };
        assert_eq!(location.to_string(), "/oidc/authorize");
        assert_eq!(location.parts(), ["", "/oidc/authorize"]);
    }

    struct Unreachable;

    impl KeyValueRead for Unreachable {
        fn read(&self, _key: &str, _buf: &mut [u8]) -> Result<usize, ReadError> {
            Err(ReadError::Unavailable)
        }
    }

    #[test]
    fn unavailable_secret_denies() {
        let store = Unreachable;
        let verifier = Verifier::new(KeyValueSecret::new(&store, "jwt-secret"), Settings::DEFAULT);
        let t = token(r#"{"sub":"user-42"}"#, SECRET);
        let header = cookie(&t);
        assert_eq!(
            verifier.check([header.as_str()], 0),
            Err(TokenError::SecretUnavailable)
        );
        assert!(matches!(
            verifier.decide([header.as_str()], 0),
            Decision::Redirect(_)
        ));
    }
}
