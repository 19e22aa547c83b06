//! HTTP surface of the issuer: the `oidc` routes under the auth route prefix,
//! `/health`, the `OpenAPI` document and, with an upstream configured, the edge
//! guard in front of everything else.

use crate::{
    api::handlers::{health, oidc},
    edge::{self, EdgeGuard, Upstream},
    issuer::Issuer,
};
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::get,
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use self::openapi::openapi;

/// Edge guard plus the origin it protects.
pub struct Protected {
    pub guard: EdgeGuard,
    pub upstream: Upstream,
}

/// Build the application router.
#[must_use]
pub fn router(issuer: Arc<Issuer>, protected: Option<Protected>) -> Router {
    let prefix = issuer.config().auth_route_prefix().to_string();

    let oidc_routes = Router::new()
        .route("/oidc/authorize", get(oidc::authorize))
        .route("/oidc/callback", get(oidc::callback))
        .route("/oidc/logout", get(oidc::logout));

    let mut app = if prefix.is_empty() {
        Router::new().merge(oidc_routes)
    } else {
        Router::new().nest(&prefix, oidc_routes)
    };

    app = app
        .route("/health", get(health::health).options(health::health))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi(&prefix)));

    if let Some(Protected { guard, upstream }) = protected {
        let origin = Router::new()
            .fallback(edge::forward)
            .layer(from_fn_with_state(guard, edge::require_session))
            .with_state(Arc::new(upstream));
        app = app.fallback_service(origin);
    }

    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(issuer)),
    )
}

/// Serve until Ctrl-C.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(port: u16, issuer: Arc<Issuer>, protected: Option<Protected>) -> Result<()> {
    let app = router(issuer, protected);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
