//! Request plumbing shared by every page
//!
//! Contains:
//! - `AppState`, the services handed to handlers
//! - `RequestContext`, the per-request user and CSRF token
//! - Session and CSRF cookies
//! - Error page rendering for bare error responses

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tera::Context as TeraContext;
use uuid::Uuid;

use super::error::{ErrorTemplate, PageError};
use crate::config::SessionConfig;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCommentRepository, SqlxLocationRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Session, User};
use crate::services::{
    CategoryService, CommentService, LocationService, PostService, UserService,
};
use crate::theme::{StandardTemplateVars, ThemeEngine};

/// Name of the login session cookie
pub const SESSION_COOKIE: &str = "session";
/// Name of the CSRF cookie; forms echo it as `csrfmiddlewaretoken`
pub const CSRF_COOKIE: &str = "csrftoken";
/// One year
const CSRF_COOKIE_MAX_AGE: i64 = 365 * 24 * 60 * 60;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub category_service: Arc<CategoryService>,
    pub location_service: Arc<LocationService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub session_config: Arc<SessionConfig>,
}

impl AppState {
    /// Wire repositories and services on top of one pool
    pub fn new(pool: DynDatabasePool, theme_engine: ThemeEngine, session_config: SessionConfig) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let locations = SqlxLocationRepository::boxed(pool.clone());
        let posts = SqlxPostRepository::boxed(pool.clone());
        let comments = SqlxCommentRepository::boxed(pool);

        Self {
            user_service: Arc::new(UserService::with_session_lifetime(
                users.clone(),
                sessions,
                session_config.lifetime_days,
            )),
            post_service: Arc::new(PostService::new(
                posts.clone(),
                categories.clone(),
                locations.clone(),
                users,
                comments.clone(),
            )),
            comment_service: Arc::new(CommentService::new(comments, posts)),
            category_service: Arc::new(CategoryService::new(categories)),
            location_service: Arc::new(LocationService::new(locations)),
            theme_engine: Arc::new(theme_engine),
            session_config: Arc::new(session_config),
        }
    }

    /// Render a full page for this request
    pub fn render(
        &self,
        ctx: &RequestContext,
        template: &str,
        context: &TeraContext,
    ) -> Result<Response, PageError> {
        let html = self
            .theme_engine
            .render_page(template, context, &ctx.template_vars())?;
        Ok(Html(html).into_response())
    }
}

/// CSRF token of the current request, put into the request extensions by
/// [`csrf_cookie`]
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

/// Who is asking, passed explicitly to every handler
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Logged-in user; `None` for anonymous requests
    pub user: Option<User>,
    /// Session token the user was resolved from
    pub session_id: Option<String>,
    pub csrf_token: String,
    /// Request path without the query string
    pub path: String,
}

impl RequestContext {
    /// The logged-in user, or a redirect to the login page that comes back here
    pub fn require_user(&self) -> Result<&User, PageError> {
        self.user.as_ref().ok_or_else(|| PageError::LoginRequired {
            next: self.path.clone(),
        })
    }

    pub fn template_vars(&self) -> StandardTemplateVars {
        StandardTemplateVars::new(self.path.clone(), self.csrf_token.clone())
            .with_user(self.user.as_ref())
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let csrf_token = parts
            .extensions
            .get::<CsrfToken>()
            .map(|t| t.0.clone())
            .unwrap_or_default();

        let mut user = None;
        let mut session_id = None;
        if let Some(token) = extract_session_token(&parts.headers) {
            user = state.user_service.validate_session(&token).await?;
            if user.is_some() {
                session_id = Some(token);
            }
        }

        Ok(Self {
            user,
            session_id,
            csrf_token,
            path: parts.uri.path().to_string(),
        })
    }
}

/// Value of the first cookie called `name`
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Session token from the `session` cookie
fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).filter(|t| !t.is_empty())
}

/// `Set-Cookie` value that stores a freshly opened session
pub fn session_cookie(session: &Session, config: &SessionConfig) -> Result<HeaderValue, PageError> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session.id,
        session.max_age_seconds()
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| PageError::Internal(anyhow::anyhow!("Invalid session cookie: {}", e)))
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn is_well_formed_token(token: &str) -> bool {
    (16..=64).contains(&token.len()) && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Make sure every client holds a CSRF token.
///
/// The token from the `csrftoken` cookie is reused; a missing or malformed
/// one is replaced and the new value is set on the response.
pub async fn csrf_cookie(mut request: Request, next: Next) -> Response {
    let existing = cookie_value(request.headers(), CSRF_COOKIE).filter(|t| is_well_formed_token(t));
    let token = existing
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    request.extensions_mut().insert(CsrfToken(token.clone()));

    let mut response = next.run(request).await;

    if existing.is_none() {
        let cookie = format!(
            "{}={}; Path=/; SameSite=Lax; Max-Age={}",
            CSRF_COOKIE, token, CSRF_COOKIE_MAX_AGE
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid CSRF cookie: {}", e),
        }
    }
    response
}

/// Replace the body of every 4xx/5xx response with the matching error page
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let csrf_token = request
        .extensions()
        .get::<CsrfToken>()
        .map(|t| t.0.clone())
        .unwrap_or_default();
    let session_token = extract_session_token(request.headers());

    let response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let template = response
        .extensions()
        .get::<ErrorTemplate>()
        .copied()
        .unwrap_or_else(|| ErrorTemplate::for_status(status));

    let user = match session_token {
        Some(token) => state
            .user_service
            .validate_session(&token)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Session lookup failed while rendering error page: {}", e);
                None
            }),
        None => None,
    };

    let status_line = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    let vars = StandardTemplateVars::new(path, csrf_token).with_user(user.as_ref());
    let html = state
        .theme_engine
        .render_error_page(template.0, &status_line, &vars);

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    Response::from_parts(parts, Body::from(html))
}
