//! ============================================================================
//! Core Types for Emptwy
//! ============================================================================
//! Defines the error taxonomy and the timeline data structures shared by the
//! Twitter executor and the deletion pipeline.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Maximum number of statuses Twitter returns for a single timeline page
pub const MAX_TIMELINE_COUNT: u32 = 200;

/// Opaque numeric identifier of a timeline post
pub type StatusId = u64;

/// Error types for the OAuth handshake, the Twitter API and the pipeline
#[derive(Debug, thiserror::Error)]
pub enum EmptwyError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication failed{}: {message}", http_suffix(.status))]
    Authentication { status: Option<u16>, message: String },

    #[error("Twitter API responded with HTTP {status}")]
    Response { status: u16 },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OAuth signing error: {0}")]
    Signing(String),

    #[error("Deletion worker failed: {0}")]
    Worker(String),
}

impl EmptwyError {
    /// Whether the pipeline may put the failed item back on the queue.
    /// Only non-success API responses qualify; everything else aborts the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmptwyError::Response { .. })
    }

    pub fn authentication(status: Option<u16>, message: impl Into<String>) -> Self {
        EmptwyError::Authentication {
            status,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EmptwyError>;

fn http_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

/// True for statuses in the inclusive range [200, 400)
pub fn is_success_status(status: u16) -> bool {
    (200..400).contains(&status)
}

// ============================================================================
// Timeline Types
// ============================================================================

/// A timeline post. Only the id is needed to delete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
}

/// Parameters for fetching one page of a user timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineQuery {
    pub screen_name: String,
    /// Zero-based page index
    pub page: i64,
    /// Statuses per page, in (0, 200]
    pub count: i64,
    #[serde(default = "default_include_retweets")]
    pub include_retweets: bool,
}

fn default_include_retweets() -> bool {
    true
}

impl TimelineQuery {
    /// First page of up to 200 statuses, retweets included
    pub fn new(screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            page: 0,
            count: MAX_TIMELINE_COUNT as i64,
            include_retweets: true,
        }
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    pub fn include_retweets(mut self, include: bool) -> Self {
        self.include_retweets = include;
        self
    }

    /// Reject out-of-range paging before anything touches the network
    pub fn validate(&self) -> Result<()> {
        if self.page < 0 {
            return Err(EmptwyError::Validation(format!(
                "page must be >= 0, got {}",
                self.page
            )));
        }
        if !(1..=MAX_TIMELINE_COUNT as i64).contains(&self.count) {
            return Err(EmptwyError::Validation(format!(
                "count must be in range (0, {}], got {}",
                MAX_TIMELINE_COUNT, self.count
            )));
        }
        Ok(())
    }

    /// Query parameters in wire order. Validates first.
    pub fn to_params(&self) -> Result<Vec<(String, String)>> {
        self.validate()?;
        Ok(vec![
            ("screen_name".to_string(), self.screen_name.clone()),
            ("trim_user".to_string(), "1".to_string()),
            ("count".to_string(), self.count.to_string()),
            ("page".to_string(), self.page.to_string()),
            (
                "include_rts".to_string(),
                if self.include_retweets { "1" } else { "0" }.to_string(),
            ),
        ])
    }
}
