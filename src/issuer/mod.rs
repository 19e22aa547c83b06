//! Session issuer: authorization-code flow with PKCE against the provider, then a
//! locally minted session token handed out as a cookie.
//!
//! Per login the issuer makes at most two outbound calls per step (discovery, then
//! the token exchange on callback), each bounded by the configured IdP timeout. No
//! token is minted unless every earlier step succeeded.

pub mod cookie;
mod discovery;
mod error;
mod exchange;
mod flow;

pub use self::discovery::ProviderMetadata;
pub use self::error::IssuerError;
pub use self::exchange::{Audience, IdTokenClaims};
pub use self::flow::{validate_return_to, FlowState, FLOW_COOKIE_NAME, FLOW_TTL_SECONDS};

use crate::{
    config::Config,
    token::{self, Claims},
    APP_USER_AGENT,
};
use edge_verifier::constant_time_eq;
use reqwest::Client;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};
use url::Url;
use utoipa::IntoParams;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Query string of the provider's redirect back to the callback route.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug)]
pub struct AuthorizationStart {
    /// Provider authorization URL to redirect the browser to.
    pub location: String,
    pub flow_cookie: String,
}

#[derive(Debug)]
pub struct Session {
    pub location: String,
    pub token: String,
    /// Session cookie first, then the flow cookie removal.
    pub set_cookies: Vec<String>,
}

pub struct Issuer {
    config: Arc<Config>,
    client: Client,
}

impl Issuer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Arc<Config>) -> Result<Self, IssuerError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT.min(config.idp_timeout()))
            .timeout(config.idp_timeout())
            .build()?;

        Ok(Self { config, client })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the provider's discovery document.
    ///
    /// # Errors
    /// [`IssuerError::DiscoveryFailed`] on transport errors, non-2xx, or a document
    /// missing a required endpoint.
    pub async fn discover(&self) -> Result<ProviderMetadata, IssuerError> {
        discovery::fetch(&self.client, &self.config.discovery_url()).await
    }

    /// Start a login: new state, nonce and PKCE verifier, sealed into the flow cookie.
    ///
    /// # Errors
    /// Discovery failures, or an authorization endpoint that is not a URL.
    #[instrument(skip(self))]
    pub async fn begin(
        &self,
        return_to: Option<&str>,
        now: i64,
    ) -> Result<AuthorizationStart, IssuerError> {
        let metadata = self.discover().await?;

        let return_to = validate_return_to(return_to, self.config.landing_path());
        let flow = FlowState::new(return_to, now);

        let mut url = Url::parse(&metadata.authorization_endpoint).map_err(|err| {
            IssuerError::DiscoveryFailed(format!("invalid authorization_endpoint: {err}"))
        })?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.config.client_id())
            .append_pair("redirect_uri", &self.config.redirect_uri())
            .append_pair("scope", self.config.scope())
            .append_pair("state", &flow.state)
            .append_pair("nonce", &flow.nonce)
            .append_pair("code_challenge", &flow.code_challenge())
            .append_pair("code_challenge_method", "S256");

        let sealed = flow.seal(self.config.signing_secret().expose())?;

        Ok(AuthorizationStart {
            location: url.into(),
            flow_cookie: cookie::flow_cookie(&self.config, &sealed),
        })
    }

    /// Finish a login from the provider's callback.
    ///
    /// # Errors
    /// - [`IssuerError::ExchangeFailed`] if the provider reported an error or the
    ///   token endpoint failed
    /// - [`IssuerError::InvalidState`] for a missing, forged or expired flow cookie, a
    ///   `state` mismatch, or a missing `code`
    /// - [`IssuerError::DiscoveryFailed`] and [`IssuerError::InvalidClaims`] from the
    ///   respective steps
    #[instrument(skip_all)]
    pub async fn complete(
        &self,
        params: &CallbackParams,
        flow_cookie: Option<&str>,
        now: i64,
    ) -> Result<Session, IssuerError> {
        if let Some(error) = &params.error {
            return Err(IssuerError::ExchangeFailed(format!(
                "provider returned {error}: {}",
                params.error_description.as_deref().unwrap_or("no description")
            )));
        }

        let sealed = flow_cookie
            .filter(|value| !value.is_empty())
            .ok_or(IssuerError::InvalidState("missing authorization state"))?;
        let flow = FlowState::open(sealed, self.config.signing_secret().expose(), now)?;

        let state = params.state.as_deref().unwrap_or_default();
        if !constant_time_eq(state.as_bytes(), flow.state.as_bytes()) {
            return Err(IssuerError::InvalidState("state mismatch"));
        }
        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(IssuerError::InvalidState("missing authorization code"))?;

        let metadata = self.discover().await?;
        let id_token =
            exchange::exchange_code(&self.client, &self.config, &metadata, code, &flow.verifier)
                .await?;

        let claims = IdTokenClaims::decode(&id_token)?;
        let subject = claims.validate(&metadata.issuer, self.config.client_id(), &flow.nonce, now)?;

        let token = self.mint(subject, now)?;
        info!(sub = subject, "session issued");

        Ok(Session {
            location: flow.return_to,
            set_cookies: vec![
                cookie::session_cookie(&self.config, &token, now),
                cookie::clear_flow_cookie(&self.config),
            ],
            token,
        })
    }

    /// Mint a session token `{sub, iat: now, exp: now + token_ttl}`.
    ///
    /// # Errors
    /// [`IssuerError::InvalidClaims`] for an empty subject.
    pub fn mint(&self, sub: &str, now: i64) -> Result<String, IssuerError> {
        if sub.is_empty() {
            return Err(IssuerError::InvalidClaims("missing subject"));
        }
        let claims = Claims::new(sub).issued(now, self.config.token_ttl_seconds());
        Ok(token::encode(&claims, self.config.signing_secret().expose())?)
    }
}
