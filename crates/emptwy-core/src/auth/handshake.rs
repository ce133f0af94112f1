//! ============================================================================
//! Three-Legged OAuth 1.0a Handshake
//! ============================================================================
//! Turns consumer credentials into an AuthorizedClient:
//!
//! ```text
//! Unauthenticated --GET request_token--> RequestTokenHeld
//! RequestTokenHeld --user verifier-----> UserAuthorized
//! UserAuthorized --POST access_token---> Authenticated
//! ```
//!
//! A supplied access token starts (and ends) in Authenticated; a supplied
//! request token starts in RequestTokenHeld. No step is retried.
//! ============================================================================

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument, Span};
use url::Url;

use super::client::{send_signed, split_query, AuthorizedClient, RawResponse};
use super::credentials::{AccessToken, ConsumerCredentials, RequestToken, TokenPair};
use super::signer::OAuthSigner;
use crate::types::{is_success_status, EmptwyError, Result};

pub const DEFAULT_REQUEST_TOKEN_URL: &str = "http://twitter.com/oauth/request_token";
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "http://twitter.com/oauth/access_token";
pub const DEFAULT_AUTHORIZE_URL: &str = "http://twitter.com/oauth/authorize";

/// The three OAuth endpoints of a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthEndpoints {
    pub request_token_url: String,
    pub access_token_url: String,
    /// Browser-facing; never requested by the handshake itself
    pub authorize_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            request_token_url: DEFAULT_REQUEST_TOKEN_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
        }
    }
}

/// Capability that gets a user to authorize a request token.
///
/// Implementations may block on user input indefinitely.
#[async_trait]
pub trait VerifierSource: Send + Sync {
    async fn obtain_verifier(&self, authorize_url: &str, request_token_key: &str)
        -> Result<String>;
}

/// `{authorize_url}?oauth_token={request_token_key}`
pub fn authorization_link(authorize_url: &str, request_token_key: &str) -> String {
    match Url::parse(authorize_url) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("oauth_token", request_token_key);
            url.to_string()
        }
        Err(_) => format!("{}?oauth_token={}", authorize_url, request_token_key),
    }
}

/// Where the handshake currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Unauthenticated,
    RequestTokenHeld(RequestToken),
    UserAuthorized(RequestToken),
    Authenticated(AccessToken),
}

/// Drives the handshake one transition at a time
pub struct OAuthHandshake {
    endpoints: OAuthEndpoints,
    consumer: ConsumerCredentials,
    http: reqwest::Client,
    state: HandshakeState,
    span: Span,
}

impl OAuthHandshake {
    pub fn new(endpoints: OAuthEndpoints, consumer: ConsumerCredentials) -> Self {
        Self {
            endpoints,
            consumer,
            http: reqwest::Client::new(),
            state: HandshakeState::Unauthenticated,
            span: tracing::info_span!("oauth_handshake"),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Logging context for every event the handshake emits
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Skip the request-token call. Ignored once an access token is set.
    pub fn with_request_token(mut self, token: TokenPair) -> Self {
        if !matches!(self.state, HandshakeState::Authenticated(_)) {
            self.state = HandshakeState::RequestTokenHeld(token.into());
        }
        self
    }

    /// Skip the whole handshake
    pub fn with_access_token(mut self, token: AccessToken) -> Self {
        self.state = HandshakeState::Authenticated(token);
        self
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Run the remaining transitions and return the authorized client
    pub async fn build_authorized_client(
        mut self,
        verifier: &dyn VerifierSource,
    ) -> Result<AuthorizedClient> {
        let span = self.span.clone();
        async move {
            loop {
                if let HandshakeState::Authenticated(token) = &self.state {
                    return Ok(AuthorizedClient::with_http_client(
                        self.consumer.clone(),
                        token.clone(),
                        self.http.clone(),
                    ));
                }
                self.step(verifier).await?;
            }
        }
        .instrument(span)
        .await
    }

    /// Perform exactly one transition. A no-op when already authenticated.
    pub async fn step(&mut self, verifier: &dyn VerifierSource) -> Result<()> {
        let next = match &self.state {
            HandshakeState::Unauthenticated => {
                debug!("Getting OAuth Request Token");
                let signer = OAuthSigner::new(self.consumer.clone());
                let url = &self.endpoints.request_token_url;
                let token = self
                    .fetch_token(Method::GET, url, &signer, "request token")
                    .await?;
                debug!(key = %token.key, "Got OAuth Request Token");
                HandshakeState::RequestTokenHeld(token.into())
            }
            HandshakeState::RequestTokenHeld(request_token) => {
                debug!(key = %request_token.key, "Asking user for OAuth authorization");
                let code = verifier
                    .obtain_verifier(&self.endpoints.authorize_url, &request_token.key)
                    .await?;
                let code = code.trim();
                debug!(key = %request_token.key, "Got OAuth verifier");
                HandshakeState::UserAuthorized(request_token.clone().with_verifier(code))
            }
            HandshakeState::UserAuthorized(request_token) => {
                debug!("Getting OAuth Access Token");
                let mut signer = OAuthSigner::new(self.consumer.clone()).with_token(
                    TokenPair::new(request_token.key.clone(), request_token.secret.clone()),
                );
                if let Some(code) = &request_token.verifier {
                    signer = signer.with_verifier(code.clone());
                }
                let url = &self.endpoints.access_token_url;
                let token = self
                    .fetch_token(Method::POST, url, &signer, "access token")
                    .await?;
                debug!(key = %token.key, "Got OAuth Access Token");
                HandshakeState::Authenticated(token)
            }
            HandshakeState::Authenticated(_) => return Ok(()),
        };

        self.state = next;
        Ok(())
    }

    async fn fetch_token(
        &self,
        method: Method,
        url: &str,
        signer: &OAuthSigner,
        what: &str,
    ) -> Result<TokenPair> {
        let (base_url, url_query) = split_query(url)?;
        let RawResponse { status, body } =
            send_signed(&self.http, signer, method, &base_url, &url_query, &[]).await?;

        if !is_success_status(status) {
            return Err(EmptwyError::authentication(
                Some(status),
                format!("{} endpoint rejected the request", what),
            ));
        }

        TokenPair::from_query_string(&body)
    }
}
