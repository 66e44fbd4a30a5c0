//! Page-level errors
//!
//! Handlers return `Result<Response, PageError>`. An error response carries
//! only its status and an [`ErrorTemplate`] marker; the
//! `render_error_pages` middleware turns it into the themed HTML page, so
//! nothing here needs the template engine or the current user.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::services::{
    CategoryServiceError, CommentServiceError, PostServiceError, UserServiceError,
};

/// Template used to render an error response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorTemplate(pub &'static str);

impl ErrorTemplate {
    /// Default template for a bare error status (extractor rejections, panics)
    pub fn for_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self("pages/404.html"),
            StatusCode::FORBIDDEN => Self("pages/403.html"),
            s if s.is_server_error() => Self("pages/500.html"),
            _ => Self("pages/400.html"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("CSRF verification failed")]
    CsrfFailure,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Anonymous access to a page that needs a login
    #[error("Login required")]
    LoginRequired { next: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) | Self::CsrfFailure => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::LoginRequired { .. } => StatusCode::FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn template(&self) -> ErrorTemplate {
        match self {
            Self::CsrfFailure => ErrorTemplate("pages/403csrf.html"),
            other => ErrorTemplate::for_status(other.status()),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match &self {
            Self::LoginRequired { next } => {
                return found(&format!("/auth/login/?next={}", urlencoding::encode(next)));
            }
            Self::Internal(e) => tracing::error!("Internal error: {:#}", e),
            Self::CsrfFailure => tracing::warn!("Rejected POST with a missing or wrong CSRF token"),
            other => tracing::debug!("{}", other),
        }

        let mut response = self.status().into_response();
        response.extensions_mut().insert(self.template());
        response
    }
}

/// `302 Found` redirect
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => PageError::BadRequest(format!("bad redirect target {:?}", location)).into_response(),
    }
}

/// Parse a numeric path segment. Anything else is a missing page, not a
/// malformed request.
pub fn parse_id(raw: &str) -> Result<i64, PageError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| PageError::NotFound(format!("no object with id {:?}", raw)))
}

impl From<PostServiceError> for PageError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(what) => Self::NotFound(what),
            PostServiceError::ValidationError(errors) => Self::BadRequest(errors.to_string()),
            PostServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

impl From<CommentServiceError> for PageError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(what) => Self::NotFound(what),
            CommentServiceError::ValidationError(errors) => Self::BadRequest(errors.to_string()),
            CommentServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::Forbidden(msg),
            UserServiceError::ValidationError(errors) => Self::BadRequest(errors.to_string()),
            UserServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

impl From<CategoryServiceError> for PageError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::DuplicateSlug(slug) => {
                Self::BadRequest(format!("duplicate slug {}", slug))
            }
            CategoryServiceError::ValidationError(msg) => Self::BadRequest(msg),
            CategoryServiceError::InternalError(e) => Self::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_required_redirects_with_next() {
        let response = PageError::LoginRequired {
            next: "/posts/create/".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login/?next=%2Fposts%2Fcreate%2F"
        );
    }

    #[test]
    fn test_error_responses_carry_their_template() {
        let response = PageError::CsrfFailure.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.extensions().get::<ErrorTemplate>(),
            Some(&ErrorTemplate("pages/403csrf.html"))
        );

        let response = PageError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.extensions().get::<ErrorTemplate>(),
            Some(&ErrorTemplate("pages/500.html"))
        );
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("abc"), Err(PageError::NotFound(_))));
        assert!(matches!(parse_id("0"), Err(PageError::NotFound(_))));
        assert!(matches!(parse_id("-3"), Err(PageError::NotFound(_))));
    }

    #[test]
    fn test_service_errors_map_to_statuses() {
        let err: PageError = PostServiceError::NotFound("post 1".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: PageError = CommentServiceError::InternalError(anyhow::anyhow!("db")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
