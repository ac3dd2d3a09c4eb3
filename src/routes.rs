use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::quote_provider::FundQuote;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct FundBatchRequest {
    pub codes: Vec<String>,
}

/// Batch quote lookup. Always answers 200 with one record per input code in
/// input order; invalid codes yield placeholder records instead of being
/// dropped, so response indices line up with the request.
pub async fn fund_batch(
    State(state): State<AppState>,
    payload: Result<Json<FundBatchRequest>, JsonRejection>,
) -> Result<Json<Vec<FundQuote>>, ApiError> {
    let Json(request) =
        payload.map_err(|_| ApiError::BadRequest("codes must be an array".to_string()))?;

    debug!(count = request.codes.len(), "Handling fund batch request");

    let mut quotes = Vec::with_capacity(request.codes.len());
    for code in &request.codes {
        if state.code_policy.matches(code) {
            quotes.push(state.cache.get_or_fetch(code).await);
        } else {
            debug!(code, "Rejected fund code");
            quotes.push(FundQuote::invalid(code));
        }
    }

    Ok(Json(quotes))
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
