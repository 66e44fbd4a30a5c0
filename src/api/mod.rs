//! HTTP layer - HTML pages and routing
//!
//! Every handler takes an explicit [`RequestContext`] (current user, CSRF
//! token, path) and returns a rendered page or a redirect. Errors travel as
//! [`PageError`] and are turned into themed error pages by middleware.

pub mod auth;
pub mod blog;
pub mod comments;
pub mod csrf;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod posts;
pub mod users;


use axum::{
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};

pub use csrf::CsrfForm;
pub use error::{found, PageError};
pub use middleware::{AppState, RequestContext};

/// Routes of the site, without middleware
pub fn build_page_router() -> Router<AppState> {
    Router::new()
        .route("/", get(blog::index))
        .route("/category/{slug}/", get(blog::category_posts))
        .route("/posts/{id}/", get(blog::post_detail))
        .route("/posts/create/", get(posts::create_form).post(posts::create))
        .route("/posts/{id}/edit/", get(posts::edit_form).post(posts::edit))
        .route("/posts/{id}/delete", get(posts::delete_confirm).post(posts::delete))
        .route("/posts/{id}/comment/", axum::routing::post(comments::add))
        .route(
            "/posts/{id}/edit_comment/{cid}",
            get(comments::edit_form).post(comments::edit),
        )
        .route(
            "/posts/{id}/delete_comment/{cid}/",
            get(comments::delete_confirm).post(comments::delete),
        )
        .route("/profile/edit", get(users::edit_profile_form).post(users::edit_profile))
        .route("/profile/{username}/", get(users::profile))
        .route("/auth/registration/", get(auth::registration_form).post(auth::register))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout_link).post(auth::logout))
        .route(
            "/auth/password_change/",
            get(auth::password_change_form).post(auth::password_change),
        )
        .route("/auth/password_change/done/", get(auth::password_change_done))
        .route("/pages/about/", get(pages::about))
        .route("/pages/rules/", get(pages::rules))
        .route("/error/", get(pages::server_error))
        .route("/forbidden/", get(pages::forbidden))
        .fallback(pages::not_found)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    build_page_router()
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(axum_middleware::from_fn(middleware::csrf_cookie))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A panicking handler becomes a plain 500; the error page middleware
/// renders it like any other server error.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    PageError::Internal(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}
