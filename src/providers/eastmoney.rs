use crate::config::UpstreamConfig;
use crate::providers::jsonp::strip_jsonp;
use crate::quote_provider::{
    FetchError, FundQuote, QuoteProvider, FALLBACK_CHANGE, FALLBACK_NET, UNKNOWN_FUND_NAME,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

// The endpoint rejects non-browser clients; this matches a desktop Chrome.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Fetches intraday estimates from the Eastmoney `fundgz` JSONP endpoint.
pub struct EastmoneyProvider {
    base_url: String,
    referer: String,
    client: reqwest::Client,
}

impl EastmoneyProvider {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            referer: config.referer.clone(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EstimatePayload {
    #[serde(default)]
    name: Option<String>,
    /// Estimated net asset value.
    #[serde(default)]
    gsz: Option<String>,
    /// Estimated percentage change.
    #[serde(default)]
    gszzl: Option<String>,
}

fn classify_transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Connect
    } else {
        FetchError::Request(err)
    }
}

#[async_trait]
impl QuoteProvider for EastmoneyProvider {
    async fn fetch_quote(&self, code: &str) -> Result<FundQuote, FetchError> {
        // rt is a cache-buster the upstream expects from browser clients.
        let url = format!(
            "{}/js/{}.js?rt={}",
            self.base_url,
            code,
            Utc::now().timestamp_millis()
        );
        debug!("Requesting estimate from {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::REFERER, &self.referer)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        let payload = strip_jsonp(&body).ok_or(FetchError::MissingWrapper)?;
        let estimate: EstimatePayload = serde_json::from_str(payload)?;

        debug!(code, estimate = ?estimate, "Parsed upstream estimate");

        Ok(FundQuote::published(
            code,
            estimate.name.unwrap_or_else(|| UNKNOWN_FUND_NAME.to_string()),
            estimate.gsz.unwrap_or_else(|| FALLBACK_NET.to_string()),
            estimate.gszzl.unwrap_or_else(|| FALLBACK_CHANGE.to_string()),
        ))
    }
}
