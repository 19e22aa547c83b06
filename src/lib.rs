//! # Edgeward (OIDC session issuer for edge-validated sessions)
//!
//! `edgeward` authenticates traffic at a content-delivery edge against an external
//! OpenID Connect provider without any network call on the steady-state request path.
//!
//! ## Two halves, one contract
//!
//! - **Issuer** ([`issuer`], served by [`api`]): runs the authorization-code flow with
//!   PKCE against the provider, then mints a compact HS256 token (`header.payload.signature`)
//!   and hands it to the browser as the `auth-token` cookie.
//! - **Edge verifier** (the `edge_verifier` crate): a `no_std`, allocation-free check
//!   that runs per request inside the edge runtime. It recomputes the HMAC with the
//!   shared secret, checks `nbf`/`exp`, and either forwards the request or redirects
//!   to `{auth_route_prefix}/oidc/authorize`.
//!
//! Both halves agree on the wire format through [`token`] (the reference codec) and on
//! the secret through [`distribution`], which provisions it either inline into the
//! edge artifact or through a key/value store the edge reads at request time.
//!
//! ## Time
//!
//! All token times are epoch **seconds**. `exp == now` is still valid.

pub mod api;
pub mod cli;
pub mod config;
pub mod distribution;
pub mod edge;
pub mod issuer;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Current time in epoch seconds.
#[must_use]
pub fn now_unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}
