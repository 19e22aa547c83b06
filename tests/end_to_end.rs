//! Issue a session for `user-42` and check it at the edge over time.

use anyhow::Result;
use axum::http::{header, HeaderMap, HeaderValue};
use edge_verifier::{Decision, TokenError};
use edgeward::{
    config::{Config, SecretInput},
    edge::{EdgeGuard, EdgeSecret},
    issuer::Issuer,
};
use std::sync::Arc;

const SECRET: &str = "s3cr3t-32-bytes-minimum-xxxxxxxx";
const ISSUED_AT: i64 = 1_700_000_000;

fn config() -> Result<Config> {
    Ok(Config::builder()
        .with_issuer_url("https://idp.example")
        .with_client_id("edgeward")
        .with_public_url("https://app.example")
        .with_signing_secret(SecretInput::parse(SECRET)?)
        .with_token_ttl_seconds(3_600)
        .build()?)
}

fn cookie_header(value: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(value)?);
    Ok(headers)
}

fn location(decision: &Decision<'_>) -> Option<String> {
    match decision {
        Decision::Forward => None,
        Decision::Redirect(location) => Some(location.to_string()),
    }
}

#[test]
fn session_is_forwarded_then_redirected() -> Result<()> {
    let config = Arc::new(config()?);
    let issuer = Issuer::new(config.clone())?;
    let token = issuer.mint("user-42", ISSUED_AT)?;

    let guard = EdgeGuard::from_config(
        &config,
        EdgeSecret::Inline(config.signing_secret().clone()),
    );
    let headers = cookie_header(&format!("auth-token={token}"))?;

    let half_hour = guard.decide(&headers, ISSUED_AT + 30 * 60);
    assert!(matches!(half_hour, Decision::Forward));

    let two_hours = guard.decide(&headers, ISSUED_AT + 2 * 60 * 60);
    assert_eq!(location(&two_hours).as_deref(), Some("/auth/oidc/authorize"));
    assert_eq!(
        guard.check(&headers, ISSUED_AT + 2 * 60 * 60),
        Err(TokenError::Expired)
    );
    Ok(())
}

#[test]
fn garbage_cookie_redirects_like_no_cookie() -> Result<()> {
    let config = config()?;
    let guard = EdgeGuard::from_config(
        &config,
        EdgeSecret::Inline(config.signing_secret().clone()),
    );

    let garbage = cookie_header("auth-token=not-a-token")?;
    let missing = HeaderMap::new();

    assert_eq!(guard.check(&garbage, ISSUED_AT), Err(TokenError::MalformedToken));
    assert_eq!(guard.check(&missing, ISSUED_AT), Err(TokenError::NoCredential));
    assert_eq!(
        location(&guard.decide(&garbage, ISSUED_AT)),
        location(&guard.decide(&missing, ISSUED_AT))
    );
    assert_eq!(
        location(&guard.decide(&garbage, ISSUED_AT)).as_deref(),
        Some("/auth/oidc/authorize")
    );
    Ok(())
}

#[test]
fn token_ttl_and_cookie_ttl_are_independent() -> Result<()> {
    let config = Arc::new(
        Config::builder()
            .with_issuer_url("https://idp.example")
            .with_client_id("edgeward")
            .with_public_url("https://app.example")
            .with_signing_secret(SecretInput::parse(SECRET)?)
            .with_token_ttl_seconds(60)
            .with_cookie_ttl_seconds(86_400)
            .build()?,
    );
    let token = Issuer::new(config.clone())?.mint("user-42", ISSUED_AT)?;
    let claims = edgeward::token::verify(&token, SECRET.as_bytes(), ISSUED_AT)?;
    assert_eq!(claims.exp, Some(ISSUED_AT + 60));

    let cookie = edgeward::issuer::cookie::session_cookie(&config, &token, ISSUED_AT);
    assert!(cookie.contains("Max-Age=86400"));
    Ok(())
}
