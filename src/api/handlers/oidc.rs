use crate::{
    issuer::{cookie, CallbackParams, Issuer, IssuerError, FLOW_COOKIE_NAME},
    now_unix_seconds,
};
use axum::{
    extract::{Extension, Query},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorizeQuery {
    /// Local path to land on after login.
    pub return_to: Option<String>,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

fn redirect<I>(location: &str, cookies: I) -> Response
where
    I: IntoIterator<Item = String>,
{
    let Ok(location) = HeaderValue::from_str(location) else {
        error!("redirect target is not a valid header value");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, location);
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(err) => {
                error!("invalid Set-Cookie value: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }
    (StatusCode::FOUND, headers).into_response()
}

fn flow_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| edge_verifier::find_cookie(value, FLOW_COOKIE_NAME))
}

#[utoipa::path(
    get,
    path = "/auth/oidc/authorize",
    params(AuthorizeQuery),
    responses (
        (status = 302, description = "Redirect to the provider's authorization endpoint"),
        (status = 502, description = "Provider discovery failed", body = ErrorBody)
    ),
    tag = "oidc",
)]
/// Start the authorization-code flow.
pub async fn authorize(
    Extension(issuer): Extension<Arc<Issuer>>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, IssuerError> {
    let start = issuer
        .begin(query.return_to.as_deref(), now_unix_seconds())
        .await?;
    Ok(redirect(&start.location, [start.flow_cookie]))
}

#[utoipa::path(
    get,
    path = "/auth/oidc/callback",
    params(CallbackParams),
    responses (
        (status = 302, description = "Session cookie set, redirect to the return path"),
        (status = 400, description = "Missing or mismatched authorization state", body = ErrorBody),
        (status = 502, description = "Provider error, failed exchange or invalid claims", body = ErrorBody)
    ),
    tag = "oidc",
)]
/// Complete the flow and issue the session cookie.
pub async fn callback(
    Extension(issuer): Extension<Arc<Issuer>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response, IssuerError> {
    let session = issuer
        .complete(&params, flow_cookie(&headers), now_unix_seconds())
        .await?;
    Ok(redirect(&session.location, session.set_cookies))
}

#[utoipa::path(
    get,
    path = "/auth/oidc/logout",
    responses (
        (status = 302, description = "Session cookie cleared, redirect to the landing path")
    ),
    tag = "oidc",
)]
/// Clear the session cookie.
pub async fn logout(Extension(issuer): Extension<Arc<Issuer>>) -> Response {
    let config = issuer.config();
    redirect(
        config.landing_path(),
        [cookie::clear_session_cookie(config)],
    )
}
