//! Runtime configuration, built once at startup and shared read-only.
//!
//! Every value the issuer and the edge guard consume lives in [`Config`]. Required
//! fields are checked in [`ConfigBuilder::build`]; nothing reads the process
//! environment after that point.

use regex::Regex;
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use serde::Deserialize;
use std::{fmt, str::FromStr, sync::LazyLock, time::Duration};
use thiserror::Error;
use url::Url;

pub const DEFAULT_SCOPE: &str = "openid";
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const DEFAULT_COOKIE_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
/// User agents cap cookie lifetimes at 400 days anyway.
pub const MAX_COOKIE_TTL_SECONDS: i64 = 400 * 24 * 60 * 60;
pub const DEFAULT_LANDING_PATH: &str = "/";
pub const DEFAULT_IDP_TIMEOUT_SECONDS: u64 = 5;
pub const MIN_SECRET_LEN: usize = 32;

static ROUTE_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(/[A-Za-z0-9._~-]+)*$").ok());

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid url for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid auth route prefix: {0}")]
    InvalidRoutePrefix(String),
    #[error("invalid cookie name: {0}")]
    InvalidCookieName(String),
    #[error("invalid landing path: {0}")]
    InvalidLandingPath(String),
    #[error("{0} must be greater than zero")]
    InvalidTtl(&'static str),
    #[error("{field} must be at most {max} seconds, got {value}")]
    TtlTooLong {
        field: &'static str,
        max: i64,
        value: i64,
    },
    #[error("invalid SameSite policy: {0}")]
    InvalidSameSite(String),
    #[error("signing secret must be at least {min} bytes, got {0}", min = MIN_SECRET_LEN)]
    SecretTooShort(usize),
    #[error("signing secret must be at most {max} bytes, got {0}", max = edge_verifier::MAX_SECRET_LEN)]
    SecretTooLong(usize),
    #[error("invalid signing secret: {0}")]
    InvalidSecret(String),
}

/// Signing secret as it arrives from the command line or environment.
///
/// Either a bare string (used byte for byte) or a JSON object
/// `{"value": "...", "encoding": "raw" | "base64url" | "hex"}`.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SecretInput {
    Plain(String),
    Encoded(EncodedSecret),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodedSecret {
    value: String,
    #[serde(default)]
    encoding: SecretEncoding,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEncoding {
    #[default]
    Raw,
    Base64url,
    Hex,
}

impl SecretInput {
    /// Parse a raw argument. Values starting with `{` must be a valid JSON object.
    ///
    /// # Errors
    /// Returns an error if the value looks like JSON but does not parse.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim_start().starts_with('{') {
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidSecret(e.to_string()))
        } else {
            Ok(Self::Plain(raw.to_string()))
        }
    }

    /// Normalize into raw secret bytes.
    ///
    /// # Errors
    /// Returns an error if decoding fails or the result has the wrong length.
    pub fn into_secret(self) -> Result<SigningSecret, ConfigError> {
        let bytes = match self {
            Self::Plain(value) => value.into_bytes(),
            Self::Encoded(EncodedSecret { value, encoding }) => match encoding {
                SecretEncoding::Raw => value.into_bytes(),
                SecretEncoding::Base64url => crate::token::decode_base64url(&value)
                    .map_err(|_| ConfigError::InvalidSecret("invalid base64url".to_string()))?,
                SecretEncoding::Hex => hex::decode(value.trim())
                    .map_err(|e| ConfigError::InvalidSecret(e.to_string()))?,
            },
        };
        SigningSecret::new(bytes)
    }
}

/// The shared HMAC key. Never logged, never sent to the client.
pub struct SigningSecret(SecretSlice<u8>);

impl SigningSecret {
    /// # Errors
    /// Returns an error if the secret is shorter than [`MIN_SECRET_LEN`] or longer than
    /// what the edge verifier can load.
    pub fn new(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort(bytes.len()));
        }
        if bytes.len() > edge_verifier::MAX_SECRET_LEN {
            return Err(ConfigError::SecretTooLong(bytes.len()));
        }
        Ok(Self(SecretSlice::from(bytes)))
    }

    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl Clone for SigningSecret {
    fn clone(&self) -> Self {
        Self(SecretSlice::from(self.expose().to_vec()))
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            _ => Err(ConfigError::InvalidSameSite(s.to_string())),
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip trailing slashes and check the prefix is a plain path (possibly empty).
///
/// # Errors
/// Returns an error for anything other than `/segment/segment...` with unreserved characters.
pub fn normalize_route_prefix(prefix: &str) -> Result<String, ConfigError> {
    let normalized = prefix.trim().trim_end_matches('/');
    let valid = ROUTE_PREFIX
        .as_ref()
        .is_some_and(|re| re.is_match(normalized));
    if valid {
        Ok(normalized.to_string())
    } else {
        Err(ConfigError::InvalidRoutePrefix(prefix.to_string()))
    }
}

/// RFC 6265 cookie-name token: visible ASCII without separators.
#[must_use]
pub fn valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}

#[derive(Debug, Clone)]
pub struct Config {
    issuer_url: Url,
    client_id: String,
    client_secret: Option<SecretString>,
    scope: String,
    public_url: Url,
    signing_secret: SigningSecret,
    token_ttl_seconds: i64,
    cookie_ttl_seconds: i64,
    auth_route_prefix: String,
    cookie_name: String,
    same_site: SameSite,
    landing_path: String,
    idp_timeout: Duration,
}

impl Config {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    #[must_use]
    pub fn issuer_url(&self) -> &Url {
        &self.issuer_url
    }

    /// `{issuer}/.well-known/openid-configuration`
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.issuer_url.as_str().trim_end_matches('/')
        )
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> Option<&SecretString> {
        self.client_secret.as_ref()
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn public_url(&self) -> &Url {
        &self.public_url
    }

    /// `{public_url}{prefix}/oidc/callback`
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}{}",
            self.public_url.as_str().trim_end_matches('/'),
            self.callback_path()
        )
    }

    #[must_use]
    pub fn signing_secret(&self) -> &SigningSecret {
        &self.signing_secret
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn cookie_ttl_seconds(&self) -> i64 {
        self.cookie_ttl_seconds
    }

    #[must_use]
    pub fn auth_route_prefix(&self) -> &str {
        &self.auth_route_prefix
    }

    #[must_use]
    pub fn authorize_path(&self) -> String {
        format!("{}{}", self.auth_route_prefix, edge_verifier::AUTHORIZE_PATH)
    }

    #[must_use]
    pub fn callback_path(&self) -> String {
        format!("{}/oidc/callback", self.auth_route_prefix)
    }

    #[must_use]
    pub fn logout_path(&self) -> String {
        format!("{}/oidc/logout", self.auth_route_prefix)
    }

    /// Path scope of the short-lived authorization flow cookie.
    #[must_use]
    pub fn flow_cookie_path(&self) -> String {
        format!("{}/oidc", self.auth_route_prefix)
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    #[must_use]
    pub fn idp_timeout(&self) -> Duration {
        self.idp_timeout
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    issuer_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    scope: Option<String>,
    public_url: Option<String>,
    signing_secret: Option<SecretInput>,
    token_ttl_seconds: Option<i64>,
    cookie_ttl_seconds: Option<i64>,
    auth_route_prefix: Option<String>,
    cookie_name: Option<String>,
    same_site: Option<SameSite>,
    landing_path: Option<String>,
    idp_timeout_seconds: Option<u64>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn with_issuer_url(mut self, url: impl Into<String>) -> Self {
        self.issuer_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: Option<SecretString>) -> Self {
        self.client_secret = secret;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_signing_secret(mut self, secret: SecretInput) -> Self {
        self.signing_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_cookie_ttl_seconds(mut self, seconds: i64) -> Self {
        self.cookie_ttl_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_auth_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.auth_route_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    #[must_use]
    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_idp_timeout_seconds(mut self, seconds: u64) -> Self {
        self.idp_timeout_seconds = Some(seconds);
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    /// Returns the first missing or invalid setting.
    pub fn build(self) -> Result<Config, ConfigError> {
        let issuer_url = parse_url("issuer-url", self.issuer_url)?;
        let public_url = parse_url("public-url", self.public_url)?;
        let client_id = self
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ConfigError::Missing("client-id"))?;
        let signing_secret = self
            .signing_secret
            .ok_or(ConfigError::Missing("jwt-secret"))?
            .into_secret()?;

        let token_ttl_seconds = self.token_ttl_seconds.unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
        if token_ttl_seconds <= 0 {
            return Err(ConfigError::InvalidTtl("token-ttl-seconds"));
        }
        let cookie_ttl_seconds = self
            .cookie_ttl_seconds
            .unwrap_or(DEFAULT_COOKIE_TTL_SECONDS);
        if cookie_ttl_seconds <= 0 {
            return Err(ConfigError::InvalidTtl("cookie-ttl-seconds"));
        }
        if cookie_ttl_seconds > MAX_COOKIE_TTL_SECONDS {
            return Err(ConfigError::TtlTooLong {
                field: "cookie-ttl-seconds",
                max: MAX_COOKIE_TTL_SECONDS,
                value: cookie_ttl_seconds,
            });
        }
        let idp_timeout_seconds = self
            .idp_timeout_seconds
            .unwrap_or(DEFAULT_IDP_TIMEOUT_SECONDS);
        if idp_timeout_seconds == 0 {
            return Err(ConfigError::InvalidTtl("idp-timeout-seconds"));
        }

        let auth_route_prefix = normalize_route_prefix(
            self.auth_route_prefix
                .as_deref()
                .unwrap_or(edge_verifier::DEFAULT_AUTH_ROUTE_PREFIX),
        )?;

        let cookie_name = self
            .cookie_name
            .unwrap_or_else(|| edge_verifier::DEFAULT_COOKIE_NAME.to_string());
        if !valid_cookie_name(&cookie_name) {
            return Err(ConfigError::InvalidCookieName(cookie_name));
        }

        let landing_path = self
            .landing_path
            .unwrap_or_else(|| DEFAULT_LANDING_PATH.to_string());
        if !landing_path.starts_with('/') || landing_path.starts_with("//") {
            return Err(ConfigError::InvalidLandingPath(landing_path));
        }

        Ok(Config {
            issuer_url,
            client_id,
            client_secret: self.client_secret,
            scope: self.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            public_url,
            signing_secret,
            token_ttl_seconds,
            cookie_ttl_seconds,
            auth_route_prefix,
            cookie_name,
            same_site: self.same_site.unwrap_or_default(),
            landing_path,
            idp_timeout: Duration::from_secs(idp_timeout_seconds),
        })
    }
}

fn parse_url(field: &'static str, value: Option<String>) -> Result<Url, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(field))?;
    Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { field, source })
}
