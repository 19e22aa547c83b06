//! `Set-Cookie` values written by the issuer.

use super::flow::{FLOW_COOKIE_NAME, FLOW_TTL_SECONDS};
use crate::config::Config;
use chrono::DateTime;

const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// IMF-fixdate for `Expires`.
fn http_date(epoch_seconds: i64) -> String {
    DateTime::from_timestamp(epoch_seconds, 0).map_or_else(
        || EPOCH_HTTP_DATE.to_string(),
        |date| date.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    )
}

#[must_use]
pub fn session_cookie(config: &Config, token: &str, now: i64) -> String {
    let max_age = config.cookie_ttl_seconds();
    format!(
        "{}={token}; Path=/; HttpOnly; Secure; SameSite={}; Max-Age={max_age}; Expires={}",
        config.cookie_name(),
        config.same_site(),
        http_date(now.saturating_add(max_age)),
    )
}

#[must_use]
pub fn clear_session_cookie(config: &Config) -> String {
    format!(
        "{}=; Path=/; HttpOnly; Secure; SameSite={}; Max-Age=0; Expires={EPOCH_HTTP_DATE}",
        config.cookie_name(),
        config.same_site(),
    )
}

// Lax: the callback is a top-level navigation coming back from the provider.
#[must_use]
pub fn flow_cookie(config: &Config, sealed: &str) -> String {
    format!(
        "{FLOW_COOKIE_NAME}={sealed}; Path={}; HttpOnly; Secure; SameSite=Lax; Max-Age={FLOW_TTL_SECONDS}",
        config.flow_cookie_path(),
    )
}

#[must_use]
pub fn clear_flow_cookie(config: &Config) -> String {
    format!(
        "{FLOW_COOKIE_NAME}=; Path={}; HttpOnly; Secure; SameSite=Lax; Max-Age=0; Expires={EPOCH_HTTP_DATE}",
        config.flow_cookie_path(),
    )
}
