//! Minimal reverse proxy to the origin behind the in-process edge guard.

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::{redirect::Policy, Client};
use std::{sync::Arc, time::Duration};
use tracing::error;
use url::Url;

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub struct Upstream {
    base: Url,
    client: Client,
}

impl Upstream {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { base, client })
    }

    fn target(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base.clone();
        let joined = format!("{}{path}", self.base.path().trim_end_matches('/'));
        url.set_path(&joined);
        url.set_query(query);
        url
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let (parts, body) = request.into_parts();
        let url = self.target(parts.uri.path(), parts.uri.query());
        let body = to_bytes(body, MAX_BODY_BYTES)
            .await
            .context("failed to buffer request body")?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .context("upstream request failed")?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        let bytes = upstream.bytes().await.context("failed to read upstream body")?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(listed.iter()) {
        headers.remove(name);
    }
}

/// Fallback handler: send the request to the origin unchanged.
pub async fn forward(State(upstream): State<Arc<Upstream>>, request: Request) -> Response {
    match upstream.send(request).await {
        Ok(response) => response,
        Err(err) => {
            error!("{err:#}");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn target_joins_base_path() -> Result<()> {
        let upstream = Upstream::new(Url::parse("http://origin:9000/app/")?, Duration::from_secs(1))?;
        assert_eq!(
            upstream.target("/reports", Some("page=2")).as_str(),
            "http://origin:9000/app/reports?page=2"
        );
        let root = Upstream::new(Url::parse("http://origin:9000")?, Duration::from_secs(1))?;
        assert_eq!(root.target("/", None).as_str(), "http://origin:9000/");
        Ok(())
    }

    #[test]
    fn strips_hop_by_hop_headers() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-trace"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::COOKIE, HeaderValue::from_static("auth-token=a.b.c"));
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::COOKIE));
        Ok(())
    }
}
