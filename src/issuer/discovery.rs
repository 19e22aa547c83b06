use super::IssuerError;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

/// The subset of the provider's discovery document the flow needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

impl ProviderMetadata {
    fn validate(self) -> Result<Self, IssuerError> {
        for (field, value) in [
            ("issuer", &self.issuer),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("jwks_uri", &self.jwks_uri),
        ] {
            if value.trim().is_empty() {
                return Err(IssuerError::DiscoveryFailed(format!("empty {field}")));
            }
        }
        Ok(self)
    }
}

#[instrument(skip(client))]
pub(super) async fn fetch(client: &Client, url: &str) -> Result<ProviderMetadata, IssuerError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| IssuerError::DiscoveryFailed(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IssuerError::DiscoveryFailed(format!("status {status}")));
    }

    let metadata: ProviderMetadata = response
        .json()
        .await
        .map_err(|err| IssuerError::DiscoveryFailed(err.to_string()))?;

    debug!(issuer = %metadata.issuer, "provider discovered");

    metadata.validate()
}
