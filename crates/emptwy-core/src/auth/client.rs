//! ============================================================================
//! Authorized Client - Signed HTTP Requests
//! ============================================================================
//! An immutable pairing of consumer credentials and access token. Cloning is
//! cheap (the underlying reqwest pool is reference counted), so every worker
//! gets its own copy instead of sharing a mutable client.
//! ============================================================================

use reqwest::Method;
use tracing::debug;
use url::Url;

use super::credentials::{AccessToken, ConsumerCredentials};
use super::signer::OAuthSigner;
use crate::types::{EmptwyError, Result};

/// Status code and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Consumer credentials + access token, able to issue signed requests
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    consumer: ConsumerCredentials,
    token: AccessToken,
    http: reqwest::Client,
}

impl AuthorizedClient {
    pub fn new(consumer: ConsumerCredentials, token: AccessToken) -> Self {
        Self::with_http_client(consumer, token, reqwest::Client::new())
    }

    /// Use a preconfigured reqwest client (timeouts, user agent)
    pub fn with_http_client(
        consumer: ConsumerCredentials,
        token: AccessToken,
        http: reqwest::Client,
    ) -> Self {
        Self {
            consumer,
            token,
            http,
        }
    }

    pub fn consumer(&self) -> &ConsumerCredentials {
        &self.consumer
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.token
    }

    pub fn signer(&self) -> OAuthSigner {
        OAuthSigner::new(self.consumer.clone()).with_token(self.token.clone())
    }

    /// Issue a signed request. Any query string already on `url` stays on
    /// the URL and is included in the signature.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RawResponse> {
        let (base_url, url_query) = split_query(url)?;
        send_signed(&self.http, &self.signer(), method, &base_url, &url_query, params).await
    }
}

/// Separate `https://host/path?a=1` into `https://host/path` and `[(a, 1)]`
pub fn split_query(url: &str) -> Result<(String, Vec<(String, String)>)> {
    let mut parsed =
        Url::parse(url).map_err(|e| EmptwyError::Validation(format!("invalid URL {}: {}", url, e)))?;

    let params = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    parsed.set_query(None);
    parsed.set_fragment(None);

    Ok((parsed.to_string(), params))
}

/// Sign and send one request.
///
/// `url_query` always goes in the query string. GET-like methods append
/// `params` to it; POST and PUT carry `params` as a form body. Both sets are
/// signed.
pub(crate) async fn send_signed(
    http: &reqwest::Client,
    signer: &OAuthSigner,
    method: Method,
    url: &str,
    url_query: &[(String, String)],
    params: &[(String, String)],
) -> Result<RawResponse> {
    let mut signed = url_query.to_vec();
    signed.extend(params.iter().cloned());
    let auth_header = signer.sign(method.as_str(), url, &signed)?;

    let has_body = method == Method::POST || method == Method::PUT;
    let mut req = http
        .request(method.clone(), url)
        .header(reqwest::header::AUTHORIZATION, auth_header);

    if has_body {
        if !url_query.is_empty() {
            req = req.query(url_query);
        }
        if !params.is_empty() {
            req = req.form(params);
        }
    } else if !signed.is_empty() {
        req = req.query(&signed);
    }

    debug!(%method, url, "Sending signed request");
    let response = req.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    debug!(%method, url, status, bytes = body.len(), "Received response");

    Ok(RawResponse { status, body })
}
