//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! Produces the `Authorization` header for a method, base URL and request
//! parameter set. The signing key is the consumer secret joined with the
//! token secret, or with an empty string before any token exists.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::RngCore;
use sha1::Sha1;

use super::credentials::{ConsumerCredentials, TokenPair};
use crate::types::{EmptwyError, Result};

/// RFC 3986 unreserved characters stay literal: ALPHA / DIGIT / "-" / "." / "_" / "~"
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Signs requests for one consumer and, optionally, one token
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    consumer: ConsumerCredentials,
    token: Option<TokenPair>,
    verifier: Option<String>,
}

impl OAuthSigner {
    /// Consumer-only signer, as used for the request-token call
    pub fn new(consumer: ConsumerCredentials) -> Self {
        Self {
            consumer,
            token: None,
            verifier: None,
        }
    }

    pub fn with_token(mut self, token: TokenPair) -> Self {
        self.token = Some(token);
        self
    }

    /// Adds `oauth_verifier` to the signed protocol parameters
    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }

    /// Build the `Authorization` header with a fresh nonce and timestamp.
    ///
    /// `url` must not carry a query string; query and form parameters go in
    /// `params` so they are covered by the signature.
    pub fn sign(&self, method: &str, url: &str, params: &[(String, String)]) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp();
        if timestamp < 0 {
            return Err(EmptwyError::Signing(format!(
                "system clock is before the epoch ({})",
                timestamp
            )));
        }
        self.sign_with(method, url, params, &generate_nonce(), &timestamp.to_string())
    }

    /// Deterministic variant of [`sign`](Self::sign)
    pub fn sign_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params = self.protocol_params(nonce, timestamp);

        let base_string = signature_base_string(method, url, &oauth_params, params);
        let signature = hmac_sha1(&self.signing_key(), &base_string)?;
        oauth_params.push(("oauth_signature".to_string(), signature));

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {}", header))
    }

    fn protocol_params(&self, nonce: &str, timestamp: &str) -> Vec<(String, String)> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer.key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                SIGNATURE_METHOD.to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
        ];

        if let Some(token) = &self.token {
            oauth_params.push(("oauth_token".to_string(), token.key.clone()));
        }
        if let Some(verifier) = &self.verifier {
            oauth_params.push(("oauth_verifier".to_string(), verifier.clone()));
        }
        oauth_params.push(("oauth_version".to_string(), OAUTH_VERSION.to_string()));

        oauth_params
    }

    fn signing_key(&self) -> String {
        let token_secret = self
            .token
            .as_ref()
            .map(|t| percent_encode(&t.secret))
            .unwrap_or_default();
        format!("{}&{}", percent_encode(&self.consumer.secret), token_secret)
    }
}

/// `METHOD&encoded(url)&encoded(sorted params)`
pub fn signature_base_string(
    method: &str,
    url: &str,
    oauth_params: &[(String, String)],
    params: &[(String, String)],
) -> String {
    // Sort on the encoded forms, name first then value
    let mut encoded: Vec<(String, String)> = oauth_params
        .iter()
        .chain(params.iter())
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    )
}

/// Percent-encode a string according to RFC 3986
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hmac_sha1(key: &str, data: &str) -> Result<String> {
    type HmacSha1 = Hmac<Sha1>;

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| EmptwyError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
