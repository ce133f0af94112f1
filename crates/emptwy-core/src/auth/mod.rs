//! ============================================================================
//! Auth Module - OAuth 1.0a Flows
//! ============================================================================
//! Handles authentication against Twitter's OAuth 1.0a endpoints:
//! - HMAC-SHA1 request signing
//! - Three-legged handshake (request token, user verifier, access token)
//! - Immutable authorized client used by every API call
//! ============================================================================

mod client;
mod credentials;
mod handshake;
mod signer;

pub use client::{split_query, AuthorizedClient, RawResponse};
pub use credentials::{AccessToken, ConsumerCredentials, RequestToken, TokenPair};
pub use handshake::{
    authorization_link, HandshakeState, OAuthEndpoints, OAuthHandshake, VerifierSource,
    DEFAULT_ACCESS_TOKEN_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_REQUEST_TOKEN_URL,
};
pub use signer::{percent_encode, signature_base_string, OAuthSigner};
