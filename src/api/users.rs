//! Profile pages

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use tera::Context as TeraContext;

use super::blog::{feed_context, PageQuery};
use super::csrf::CsrfForm;
use super::error::{found, PageError};
use super::middleware::{AppState, RequestContext};
use crate::forms::{FormErrors, UserForm};
use crate::services::UserServiceError;

pub(crate) fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

/// GET /profile/{username}/
pub async fn profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let (author, posts) = state
        .post_service
        .list_by_author(&username, ctx.user.as_ref(), query.lenient())
        .await?;

    let mut context = feed_context(&posts);
    context.insert("is_owner", &ctx.user.as_ref().is_some_and(|u| u.id == author.id));
    context.insert("display_name", &author.display_name());
    context.insert("profile", &author);
    state.render(&ctx, "blog/profile.html", &context)
}

fn render_form(
    state: &AppState,
    ctx: &RequestContext,
    form: &UserForm,
    errors: &FormErrors,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    state.render(ctx, "blog/user.html", &context)
}

/// GET /profile/edit
pub async fn edit_profile_form(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, PageError> {
    let user = ctx.require_user()?;
    render_form(&state, &ctx, &UserForm::from_user(user), &FormErrors::new())
}

/// POST /profile/edit
pub async fn edit_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    CsrfForm(form): CsrfForm<UserForm>,
) -> Result<Response, PageError> {
    let user = ctx.require_user()?;
    match state.user_service.update_profile(user, &form).await {
        Ok(updated) => Ok(found(&profile_url(&updated.username))),
        Err(UserServiceError::ValidationError(errors)) => render_form(&state, &ctx, &form, &errors),
        Err(e) => Err(e.into()),
    }
}
