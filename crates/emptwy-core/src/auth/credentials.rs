//! OAuth 1.0a credential values.
//!
//! Consumer credentials identify the application; token pairs identify a
//! user grant. Request and access tokens share the `{key, secret}` shape and
//! the same form-encoded wire representation.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::types::{EmptwyError, Result};

/// Application key/secret pair issued by Twitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

impl ConsumerCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

/// `oauth_token` / `oauth_token_secret` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub key: String,
    pub secret: String,
}

/// Long-lived token used for every API call of a run
pub type AccessToken = TokenPair;

impl TokenPair {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Build an optional pair from optional halves.
    ///
    /// Empty strings count as absent. Supplying exactly one half is a
    /// validation error; `label` names the pair in the message.
    pub fn from_parts(
        key: Option<String>,
        secret: Option<String>,
        label: &str,
    ) -> Result<Option<Self>> {
        let key = key.filter(|k| !k.is_empty());
        let secret = secret.filter(|s| !s.is_empty());

        match (key, secret) {
            (Some(key), Some(secret)) => Ok(Some(Self { key, secret })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(EmptwyError::Validation(format!(
                "{} key given without its secret",
                label
            ))),
            (None, Some(_)) => Err(EmptwyError::Validation(format!(
                "{} secret given without its key",
                label
            ))),
        }
    }

    /// Parse a token endpoint response body such as
    /// `oauth_token=abc&oauth_token_secret=xyz&oauth_callback_confirmed=true`.
    pub fn from_query_string(body: &str) -> Result<Self> {
        let mut key = None;
        let mut secret = None;

        for (name, value) in form_urlencoded::parse(body.trim().as_bytes()) {
            match name.as_ref() {
                "oauth_token" => key = Some(value.into_owned()),
                "oauth_token_secret" => secret = Some(value.into_owned()),
                _ => {}
            }
        }

        let key = key.ok_or_else(|| {
            EmptwyError::authentication(None, "token response is missing oauth_token")
        })?;
        let secret = secret.ok_or_else(|| {
            EmptwyError::authentication(None, "token response is missing oauth_token_secret")
        })?;

        Ok(Self { key, secret })
    }

    /// Encode as `oauth_token=..&oauth_token_secret=..`
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("oauth_token", &self.key)
            .append_pair("oauth_token_secret", &self.secret)
            .finish()
    }
}

/// Short-lived token that exists only while the handshake runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub key: String,
    pub secret: String,
    /// Attached once the user has authorized the token
    pub verifier: Option<String>,
}

impl RequestToken {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }
}

impl From<TokenPair> for RequestToken {
    fn from(pair: TokenPair) -> Self {
        Self::new(pair.key, pair.secret)
    }
}
