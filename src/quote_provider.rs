//! Fund quote domain types and the provider seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback estimated net value used on any failure.
pub const FALLBACK_NET: &str = "0.0000";
/// Fallback estimated percentage change used on any failure.
pub const FALLBACK_CHANGE: &str = "0.00";
/// Display name used when the upstream payload omits `name`.
pub const UNKNOWN_FUND_NAME: &str = "未知基金";

// Allocation fields are not published by the estimate endpoint; these stubs
// mirror the values the upstream site shows for a typical mixed fund.
pub const STUB_FUND_TYPE: &str = "混合";
pub const STUB_STOCK_RATIO: &str = "94%";
pub const STUB_BOND_RATIO: &str = "3%";
pub const STUB_CASH_RATIO: &str = "3%";

/// Normalized quote record returned for every requested code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundQuote {
    pub code: String,
    pub name: String,
    pub estimate_net: String,
    pub estimate_change: String,
    pub fund_type: String,
    pub stock_ratio: String,
    pub bond_ratio: String,
    pub cash_ratio: String,
}

impl FundQuote {
    /// Builds a quote from upstream fields plus the static allocation stubs.
    pub fn published(code: &str, name: String, estimate_net: String, estimate_change: String) -> Self {
        Self {
            code: code.to_string(),
            name,
            estimate_net,
            estimate_change,
            fund_type: STUB_FUND_TYPE.to_string(),
            stock_ratio: STUB_STOCK_RATIO.to_string(),
            bond_ratio: STUB_BOND_RATIO.to_string(),
            cash_ratio: STUB_CASH_RATIO.to_string(),
        }
    }

    /// Degraded record for an upstream fetch failure. `reason` is a short
    /// category string, e.g. `timeout` or `connection failed`.
    pub fn unavailable(code: &str, reason: &str) -> Self {
        Self {
            name: format!("fetch failed: {reason}"),
            estimate_net: FALLBACK_NET.to_string(),
            estimate_change: FALLBACK_CHANGE.to_string(),
            ..Self::published(code, String::new(), String::new(), String::new())
        }
    }

    /// Placeholder record for a code that failed validation. Echoes the
    /// original input so callers keep a 1:1 request/response correspondence.
    pub fn invalid(code: &str) -> Self {
        Self {
            name: "invalid fund code".to_string(),
            estimate_net: FALLBACK_NET.to_string(),
            estimate_change: FALLBACK_CHANGE.to_string(),
            ..Self::published(code, String::new(), String::new(), String::new())
        }
    }
}

/// Failure taxonomy for a single upstream fetch. Each stage of the request
/// and the two-stage JSONP parse gets its own kind.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request timed out")]
    Timeout,
    #[error("could not connect to upstream")]
    Connect,
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("no JSONP wrapper in upstream response")]
    MissingWrapper,
    #[error("malformed JSON payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("upstream request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl FetchError {
    /// Short category string surfaced in degraded quote names.
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Connect => "connection failed",
            FetchError::Status(_) => "upstream status",
            FetchError::MissingWrapper | FetchError::Decode(_) => "invalid payload",
            FetchError::Request(_) => "request failed",
        }
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, code: &str) -> Result<FundQuote, FetchError>;
}

/// Validity rule for inbound fund codes. The upstream accepts both 5 and 6
/// digit identifiers depending on the fund family; the stricter 6-digit rule
/// is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeLengthPolicy {
    #[default]
    SixOnly,
    FiveOrSix,
}

impl CodeLengthPolicy {
    pub fn matches(&self, code: &str) -> bool {
        let length_ok = match self {
            CodeLengthPolicy::SixOnly => code.len() == 6,
            CodeLengthPolicy::FiveOrSix => matches!(code.len(), 5 | 6),
        };
        length_ok && code.bytes().all(|b| b.is_ascii_digit())
    }
}
