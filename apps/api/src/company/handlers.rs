//! Axum route handlers for company lookups.

use axum::extract::{Query, State};
use serde::Deserialize;

use crate::company::enricher::enrich;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeCompanyQuery {
    #[serde(default)]
    pub company_name: String,
}

/// POST /api/analyze_company?company_name=...
///
/// Returns the plain-text company blurb. Unlike the generation pipeline,
/// search failures surface to the caller here.
pub async fn handle_analyze_company(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeCompanyQuery>,
) -> Result<String, AppError> {
    enrich(
        state.company_search.as_ref(),
        &query.company_name,
        state.config.limits.company_blurb_max_chars,
    )
    .await
}
