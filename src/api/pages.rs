//! Static pages and the diagnostic error endpoints

use axum::{extract::State, http::Uri, response::Response};
use tera::Context as TeraContext;

use super::error::PageError;
use super::middleware::{AppState, RequestContext};

/// GET /pages/about/
pub async fn about(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, PageError> {
    state.render(&ctx, "pages/about.html", &TeraContext::new())
}

/// GET /pages/rules/
pub async fn rules(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, PageError> {
    state.render(&ctx, "pages/rules.html", &TeraContext::new())
}

/// GET /error/ always fails with a server error
pub async fn server_error() -> Result<Response, PageError> {
    let divisor = 0_i64;
    let quotient = 1_i64
        .checked_div(divisor)
        .ok_or_else(|| anyhow::anyhow!("division by zero"))?;
    Err(PageError::Internal(anyhow::anyhow!(
        "unexpected quotient {}",
        quotient
    )))
}

/// GET /forbidden/
pub async fn forbidden() -> PageError {
    PageError::Forbidden("diagnostic endpoint".to_string())
}

/// Any unmatched path
pub async fn not_found(uri: Uri) -> PageError {
    PageError::NotFound(uri.path().to_string())
}
