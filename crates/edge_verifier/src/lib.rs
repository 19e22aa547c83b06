//! Session check that runs inside an edge runtime on every request.
//!
//! The crate is written directly in the subset the edge hosts accept:
//!
//! - `no_std`, no allocator; every buffer is a fixed-size array on the stack.
//! - the only external code is the HMAC-SHA256 primitive (`hmac` + `sha2`).
//! - no formatting or other variadic macros; functions take a fixed argument list.
//! - logging is compiled out unless the `log` feature is enabled, and the host sink
//!   receives exactly one `&str` per line.
//! - no I/O besides, optionally, one synchronous key/value read for the secret.
//!
//! The decision is binary: forward the request untouched, or redirect to
//! `{auth_route_prefix}/oidc/authorize`. Every [`TokenError`] maps to the same redirect.
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod base64url;
pub mod claims;
mod compare;
mod cookie;
mod error;
mod secret;
mod verifier;

pub use claims::TimeBounds;
pub use compare::constant_time_eq;
pub use cookie::find_cookie;
pub use error::TokenError;
pub use secret::{InlineSecret, KeyValueRead, KeyValueSecret, ReadError, SecretSource, MAX_SECRET_LEN};
pub use verifier::{
    sign_into, verify_token, Decision, Location, LogSink, Settings, Verifier, AUTHORIZE_PATH,
    DEFAULT_AUTH_ROUTE_PREFIX, DEFAULT_COOKIE_NAME, LOGGING_ENABLED, MAX_PAYLOAD_LEN,
    SIGNATURE_LEN,
};
