//! ============================================================================
//! EMPTWY-CORE: Timeline Eraser Engine
//! ============================================================================
//! This crate handles all backend logic for the emptwy CLI:
//! - OAuth 1.0a request signing and three-legged handshake
//! - Twitter REST v1 timeline fetch and status deletion
//! - Concurrent deletion pipeline with configurable retry
//! ============================================================================

pub mod auth;
pub mod executor;
pub mod pipeline;
pub mod retry;
pub mod types;

// Re-export main types for convenience
pub use auth::{AuthorizedClient, ConsumerCredentials, OAuthEndpoints, OAuthHandshake, TokenPair};
pub use executor::{ApiConfig, StatusApi, TwitterExecutor};
pub use pipeline::{DeletionPipeline, DeletionReport, PipelineConfig};
pub use retry::RetryPolicy;
pub use types::*;
