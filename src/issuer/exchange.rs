use super::{IssuerError, ProviderMetadata};
use crate::{config::Config, token};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(list) => list.iter().any(|aud| aud == client_id),
        }
    }
}

/// Claims read from the ID token returned by the token endpoint.
///
/// The token arrives over the direct TLS back channel, so its signature is not
/// re-validated against the provider's JWKS.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    #[serde(default)]
    pub sub: Option<String>,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default)]
    pub nonce: Option<String>,
}

impl IdTokenClaims {
    /// Decode the payload segment of a compact ID token.
    ///
    /// # Errors
    /// [`IssuerError::InvalidClaims`] when the token is not a three-segment JWS with a
    /// JSON payload carrying the required claims.
    pub fn decode(id_token: &str) -> Result<Self, IssuerError> {
        let mut parts = id_token.split('.');
        let (Some(_), Some(payload), Some(_), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(IssuerError::InvalidClaims("id token is not a compact JWS"));
        };
        let json = token::decode_base64url(payload)
            .map_err(|_| IssuerError::InvalidClaims("undecodable id token payload"))?;
        serde_json::from_slice(&json)
            .map_err(|_| IssuerError::InvalidClaims("id token payload lacks required claims"))
    }

    /// Check the claims for this flow and return the subject.
    ///
    /// # Errors
    /// [`IssuerError::InvalidClaims`] naming the first failed check.
    pub fn validate(
        &self,
        issuer: &str,
        client_id: &str,
        nonce: &str,
        now: i64,
    ) -> Result<&str, IssuerError> {
        if self.iss != issuer {
            return Err(IssuerError::InvalidClaims("issuer mismatch"));
        }
        if !self.aud.contains(client_id) {
            return Err(IssuerError::InvalidClaims("audience mismatch"));
        }
        if now > self.exp {
            return Err(IssuerError::InvalidClaims("id token expired"));
        }
        if self.nonce.as_deref() != Some(nonce) {
            return Err(IssuerError::InvalidClaims("nonce mismatch"));
        }
        match self.sub.as_deref() {
            Some(sub) if !sub.is_empty() => Ok(sub),
            _ => Err(IssuerError::InvalidClaims("missing subject")),
        }
    }
}

/// Redeem `code` at the token endpoint and return the raw ID token.
#[instrument(skip(client, config, metadata, code, verifier))]
pub(super) async fn exchange_code(
    client: &Client,
    config: &Config,
    metadata: &ProviderMetadata,
    code: &str,
    verifier: &str,
) -> Result<String, IssuerError> {
    let redirect_uri = config.redirect_uri();
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri.as_str()),
        ("client_id", config.client_id()),
        ("code_verifier", verifier),
    ];
    if let Some(secret) = config.client_secret() {
        form.push(("client_secret", secret.expose_secret()));
    }

    let response = client
        .post(&metadata.token_endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|err| IssuerError::ExchangeFailed(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IssuerError::ExchangeFailed(format!("status {status}")));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|err| IssuerError::ExchangeFailed(err.to_string()))?;

    debug!("authorization code redeemed");

    body.id_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| IssuerError::ExchangeFailed("response has no id_token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn id_token(claims: &serde_json::Value) -> Result<String> {
        Ok(token::encode(claims, b"provider-key")?)
    }

    #[test]
    fn decode_and_validate() -> Result<()> {
        let raw = id_token(&json!({
            "iss": "https://idp.example",
            "sub": "user-42",
            "aud": ["other", "edgeward"],
            "exp": 2_000,
            "nonce": "n-1",
        }))?;
        let claims = IdTokenClaims::decode(&raw)?;
        assert_eq!(
            claims.validate("https://idp.example", "edgeward", "n-1", 1_000)?,
            "user-42"
        );
        Ok(())
    }

    #[test]
    fn each_check_fails_independently() -> Result<()> {
        let raw = id_token(&json!({
            "iss": "https://idp.example",
            "sub": "user-42",
            "aud": "edgeward",
            "exp": 2_000,
            "nonce": "n-1",
        }))?;
        let claims = IdTokenClaims::decode(&raw)?;

        let cases = [
            ("https://other.example", "edgeward", "n-1", 1_000, "issuer mismatch"),
            ("https://idp.example", "someone", "n-1", 1_000, "audience mismatch"),
            ("https://idp.example", "edgeward", "n-1", 2_001, "id token expired"),
            ("https://idp.example", "edgeward", "n-2", 1_000, "nonce mismatch"),
        ];
        for (iss, aud, nonce, now, reason) in cases {
            let result = claims.validate(iss, aud, nonce, now);
            assert!(
                matches!(result, Err(IssuerError::InvalidClaims(r)) if r == reason),
                "{reason}"
            );
        }
        Ok(())
    }

    #[test]
    fn missing_or_empty_subject() -> Result<()> {
        for sub in [json!(null), json!("")] {
            let raw = id_token(&json!({
                "iss": "i", "sub": sub, "aud": "c", "exp": 10, "nonce": "n",
            }))?;
            let claims = IdTokenClaims::decode(&raw)?;
            let result = claims.validate("i", "c", "n", 0);
            assert!(matches!(result, Err(IssuerError::InvalidClaims("missing subject"))));
        }
        Ok(())
    }

    #[test]
    fn undecodable_tokens() {
        for raw in ["", "a.b", "a.!!!.c", "a.e30.c"] {
            assert!(matches!(
                IdTokenClaims::decode(raw),
                Err(IssuerError::InvalidClaims(_))
            ));
        }
    }
}
