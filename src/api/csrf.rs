//! CSRF-checked form bodies

use axum::extract::{Form, FromRequest, Request};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::PageError;
use super::middleware::CsrfToken;

#[derive(Debug, Deserialize)]
struct CsrfProtected<T> {
    #[serde(default)]
    csrfmiddlewaretoken: String,
    #[serde(flatten)]
    form: T,
}

/// Body of a confirmation form that only carries the CSRF token
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Confirmation {}

/// A urlencoded form whose `csrfmiddlewaretoken` field matches the
/// `csrftoken` cookie. Anything else is rejected with the CSRF 403 page
/// before the handler runs.
#[derive(Debug, Clone)]
pub struct CsrfForm<T>(pub T);

impl<T, S> FromRequest<S> for CsrfForm<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let expected = req.extensions().get::<CsrfToken>().map(|t| t.0.clone());

        let Form(payload) = Form::<CsrfProtected<T>>::from_request(req, state)
            .await
            .map_err(|e| PageError::BadRequest(format!("Unreadable form: {}", e)))?;

        match expected {
            Some(token) if tokens_match(&token, &payload.csrfmiddlewaretoken) => {
                Ok(CsrfForm(payload.form))
            }
            _ => Err(PageError::CsrfFailure),
        }
    }
}

fn tokens_match(expected: &str, given: &str) -> bool {
    if expected.is_empty() || expected.len() != given.len() {
        return false;
    }
    expected
        .bytes()
        .zip(given.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
