//! ============================================================================
//! Executor Module - Twitter API Operations
//! ============================================================================
//! - TwitterExecutor: timeline fetch and status deletion via REST v1
//! - StatusApi: the seam the deletion pipeline drives (faked in tests)
//! ============================================================================

mod twitter;

pub use twitter::{ApiConfig, StatusApi, TwitterExecutor, DEFAULT_API_BASE_URL};
