use crate::token;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("provider discovery failed: {0}")]
    DiscoveryFailed(String),
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),
    #[error("invalid id token claims: {0}")]
    InvalidClaims(&'static str),
    #[error("invalid authorization state: {0}")]
    InvalidState(&'static str),
    #[error("could not mint token: {0}")]
    Token(#[from] token::Error),
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

impl IssuerError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DiscoveryFailed(_) | Self::ExchangeFailed(_) | Self::InvalidClaims(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::Token(_) | Self::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for response bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DiscoveryFailed(_) => "discovery_failed",
            Self::ExchangeFailed(_) => "exchange_failed",
            Self::InvalidClaims(_) => "invalid_claims",
            Self::InvalidState(_) => "invalid_state",
            Self::Token(_) | Self::Client(_) => "internal_error",
        }
    }
}

impl IntoResponse for IssuerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{self}");
        } else {
            tracing::debug!("{self}");
        }
        (status, Json(json!({ "error": self.code() }))).into_response()
    }
}
