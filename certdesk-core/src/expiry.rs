use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use crate::config::DEFAULT_EXPIRY_DAYS;

/// Freshness of a certificate bundle, derived from its modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertStatus {
    Valid,
    Expired,
}

impl CertStatus {
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }

    /// Check mark used in listings.
    pub fn mark(self) -> &'static str {
        match self {
            Self::Valid => "✓",
            Self::Expired => "✗",
        }
    }
}

/// Age threshold separating valid from expired bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    window: Duration,
}

impl ExpiryPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_days(days: u32) -> Self {
        Self::new(Duration::days(i64::from(days)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Valid iff `modified >= now - window`; the boundary itself is valid.
    ///
    /// A window reaching past the representable range expires nothing.
    pub fn classify(&self, modified: DateTime<Local>, now: DateTime<Local>) -> CertStatus {
        match now.checked_sub_signed(self.window) {
            Some(cutoff) if modified < cutoff => CertStatus::Expired,
            _ => CertStatus::Valid,
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::from_days(DEFAULT_EXPIRY_DAYS)
    }
}
