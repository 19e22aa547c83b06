//! Host adapter that runs the `no_std` verifier in front of an axum service.

mod cache;
mod proxy;

pub use self::cache::{CachedKeyValue, DEFAULT_SECRET_CACHE_TTL};
pub use self::proxy::{forward, Upstream};

use crate::{config::Config, config::SigningSecret, now_unix_seconds};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use edge_verifier::{
    Decision, InlineSecret, KeyValueRead, KeyValueSecret, LogSink, SecretSource, Settings,
    TimeBounds, TokenError, Verifier,
};
use std::sync::Arc;
use tracing::debug;

/// Where the guard's secret comes from.
#[derive(Clone)]
pub enum EdgeSecret {
    /// Held in process, like a secret compiled into the edge artifact.
    Inline(SigningSecret),
    /// Read from a key/value store per request. Wrap blocking stores in
    /// [`CachedKeyValue`].
    KeyValue {
        store: Arc<dyn KeyValueRead + Send + Sync>,
        key: String,
    },
}

impl SecretSource for EdgeSecret {
    fn with_secret<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, TokenError> {
        match self {
            Self::Inline(secret) => InlineSecret(secret.expose()).with_secret(f),
            Self::KeyValue { store, key } => KeyValueSecret::new(store.as_ref(), key).with_secret(f),
        }
    }
}

struct GuardInner {
    secret: EdgeSecret,
    cookie_name: String,
    auth_route_prefix: String,
}

#[derive(Clone)]
pub struct EdgeGuard {
    inner: Arc<GuardInner>,
}

fn log_rejection(reason: &str) {
    debug!(reason, "edge rejected request");
}

impl EdgeGuard {
    #[must_use]
    pub fn new(
        secret: EdgeSecret,
        cookie_name: impl Into<String>,
        auth_route_prefix: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                secret,
                cookie_name: cookie_name.into(),
                auth_route_prefix: auth_route_prefix.into(),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, secret: EdgeSecret) -> Self {
        Self::new(secret, config.cookie_name(), config.auth_route_prefix())
    }

    fn verifier(&self) -> Verifier<'_, &EdgeSecret> {
        Verifier::new(
            &self.inner.secret,
            Settings {
                cookie_name: &self.inner.cookie_name,
                auth_route_prefix: &self.inner.auth_route_prefix,
                log: Some(log_rejection as LogSink),
            },
        )
    }

    /// # Errors
    /// The reason the request would be redirected.
    pub fn check(&self, headers: &HeaderMap, now: i64) -> Result<TimeBounds, TokenError> {
        self.verifier().check(cookie_headers(headers), now)
    }

    #[must_use]
    pub fn decide(&self, headers: &HeaderMap, now: i64) -> Decision<'_> {
        self.verifier().decide(cookie_headers(headers), now)
    }
}

fn cookie_headers(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Middleware: forward requests carrying a valid session, redirect the rest to the
/// authorize route.
pub async fn require_session(
    State(guard): State<EdgeGuard>,
    request: Request,
    next: Next,
) -> Response {
    let location = match guard.decide(request.headers(), now_unix_seconds()) {
        Decision::Forward => None,
        Decision::Redirect(location) => Some(location.to_string()),
    };

    match location {
        Some(location) => redirect(&location),
        None => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        distribution::kv::FileKvStore,
        token::{self, Claims},
    };
    use anyhow::Result;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use edge_verifier::ReadError;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"s3cr3t-32-bytes-minimum-xxxxxxxx";

    fn inline_guard() -> Result<EdgeGuard> {
        let secret = SigningSecret::new(SECRET.to_vec())?;
        Ok(EdgeGuard::new(EdgeSecret::Inline(secret), "auth-token", "/auth"))
    }

    fn cookie(value: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_str("theme=dark")?);
        headers.append(header::COOKIE, HeaderValue::from_str(value)?);
        Ok(headers)
    }

    #[test]
    fn reads_cookie_from_any_header() -> Result<()> {
        let token = token::encode(&Claims::new("user-42").issued(100, 60), SECRET)?;
        let guard = inline_guard()?;
        let headers = cookie(&format!("auth-token={token}"))?;
        assert!(guard.check(&headers, 120).is_ok());
        assert_eq!(guard.check(&headers, 161), Err(TokenError::Expired));
        assert_eq!(guard.check(&HeaderMap::new(), 120), Err(TokenError::NoCredential));
        Ok(())
    }

    struct Unreachable;

    impl KeyValueRead for Unreachable {
        fn read(&self, _key: &str, _buf: &mut [u8]) -> Result<usize, ReadError> {
            Err(ReadError::Unavailable)
        }
    }

    #[test]
    fn unreadable_store_denies() -> Result<()> {
        let token = token::encode(&Claims::new("user-42"), SECRET)?;
        let guard = EdgeGuard::new(
            EdgeSecret::KeyValue {
                store: Arc::new(Unreachable),
                key: "jwt-secret".to_string(),
            },
            "auth-token",
            "/auth",
        );
        let headers = cookie(&format!("auth-token={token}"))?;
        assert_eq!(guard.check(&headers, 0), Err(TokenError::SecretUnavailable));
        assert!(matches!(guard.decide(&headers, 0), Decision::Redirect(_)));
        Ok(())
    }

    #[test]
    fn cached_file_store_skips_the_disk_per_request() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("jwt-secret");
        std::fs::write(&path, SECRET)?;
        let guard = EdgeGuard::new(
            EdgeSecret::KeyValue {
                store: Arc::new(CachedKeyValue::new(
                    Arc::new(FileKvStore::new(dir.path())),
                    DEFAULT_SECRET_CACHE_TTL,
                )),
                key: "jwt-secret".to_string(),
            },
            "auth-token",
            "/auth",
        );
        let token = token::encode(&Claims::new("user-42"), SECRET)?;
        let headers = cookie(&format!("auth-token={token}"))?;

        assert!(guard.check(&headers, 0).is_ok());
        std::fs::remove_file(&path)?;
        assert!(guard.check(&headers, 0).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn middleware_forwards_or_redirects() -> Result<()> {
        let app = Router::new()
            .route("/", get(|| async { "origin" }))
            .layer(from_fn_with_state(inline_guard()?, require_session));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION),
            Some(&HeaderValue::from_static("/auth/oidc/authorize"))
        );

        let now = now_unix_seconds();
        let token = token::encode(&Claims::new("user-42").issued(now, 3_600), SECRET)?;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, format!("auth-token={token}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
