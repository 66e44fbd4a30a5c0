//! Post create, edit and delete pages

use axum::{
    extract::{Path, State},
    response::Response,
};
use chrono::Utc;
use tera::Context as TeraContext;

use super::csrf::{Confirmation, CsrfForm};
use super::error::{found, parse_id, PageError};
use super::middleware::{AppState, RequestContext};
use super::users::profile_url;
use crate::forms::{FormErrors, PostForm, NON_FIELD_ERRORS};
use crate::permissions::{can_delete_post, can_modify};
use crate::services::PostServiceError;

pub(crate) fn post_url(id: i64) -> String {
    format!("/posts/{}/", id)
}

async fn render_form(
    state: &AppState,
    ctx: &RequestContext,
    form: &PostForm,
    errors: &FormErrors,
    is_edit: bool,
) -> Result<Response, PageError> {
    let categories = state.category_service.list().await?;
    let locations = state.location_service.list().await?;

    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("non_field_errors", errors.get(NON_FIELD_ERRORS));
    context.insert("categories", &categories);
    context.insert("locations", &locations);
    context.insert("is_edit", &is_edit);
    state.render(ctx, "blog/create.html", &context)
}

/// GET /posts/create/
pub async fn create_form(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, PageError> {
    ctx.require_user()?;
    render_form(&state, &ctx, &PostForm::blank(Utc::now()), &FormErrors::new(), false).await
}

/// POST /posts/create/
pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    CsrfForm(form): CsrfForm<PostForm>,
) -> Result<Response, PageError> {
    let user = ctx.require_user()?;
    match state.post_service.create(user, &form).await {
        Ok(_) => Ok(found(&profile_url(&user.username))),
        Err(PostServiceError::ValidationError(errors)) => {
            render_form(&state, &ctx, &form, &errors, false).await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}/edit/
pub async fn edit_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let user = ctx.require_user()?;
    let post = state.post_service.get(parse_id(&id)?).await?;
    if !can_modify(user, &post) {
        return Ok(found(&post_url(post.id)));
    }
    render_form(&state, &ctx, &PostForm::from_post(&post), &FormErrors::new(), true).await
}

/// POST /posts/{id}/edit/
pub async fn edit(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    CsrfForm(form): CsrfForm<PostForm>,
) -> Result<Response, PageError> {
    let user = ctx.require_user()?;
    let post = state.post_service.get(parse_id(&id)?).await?;
    if !can_modify(user, &post) {
        tracing::info!(post_id = post.id, user_id = user.id, "edit refused: not the author");
        return Ok(found(&post_url(post.id)));
    }

    match state.post_service.update(&post, &form).await {
        Ok(updated) => Ok(found(&post_url(updated.id))),
        Err(PostServiceError::ValidationError(errors)) => {
            render_form(&state, &ctx, &form, &errors, true).await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}/delete
///
/// Anyone but the author or a superuser, anonymous visitors included, is
/// sent back to the post.
pub async fn delete_confirm(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let post = state.post_service.get(parse_id(&id)?).await?;
    if !ctx.user.as_ref().is_some_and(|user| can_delete_post(user, &post)) {
        return Ok(found(&post_url(post.id)));
    }

    let mut context = TeraContext::new();
    context.insert("post", &post);
    state.render(&ctx, "blog/delete.html", &context)
}

/// POST /posts/{id}/delete
pub async fn delete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    CsrfForm(_): CsrfForm<Confirmation>,
) -> Result<Response, PageError> {
    let post = state.post_service.get(parse_id(&id)?).await?;
    if !ctx.user.as_ref().is_some_and(|user| can_delete_post(user, &post)) {
        tracing::info!(
            post_id = post.id,
            user_id = ctx.user.as_ref().map(|u| u.id),
            "delete refused"
        );
        return Ok(found(&post_url(post.id)));
    }

    state.post_service.delete(post.id).await?;
    Ok(found("/"))
}
