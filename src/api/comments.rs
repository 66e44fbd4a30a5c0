//! Comment pages

use axum::{
    extract::{Path, State},
    response::Response,
};
use tera::Context as TeraContext;

use super::csrf::{Confirmation, CsrfForm};
use super::error::{found, parse_id, PageError};
use super::middleware::{AppState, RequestContext};
use super::posts::post_url;
use crate::forms::{CommentForm, FormErrors};
use crate::models::Comment;
use crate::permissions::can_modify;
use crate::services::CommentServiceError;

/// POST /posts/{id}/comment/
///
/// Always lands back on the post; a blank comment is dropped without a
/// message. Anonymous visitors log in and return to the post itself, since
/// this route has no GET.
pub async fn add(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    CsrfForm(form): CsrfForm<CommentForm>,
) -> Result<Response, PageError> {
    let post_id = parse_id(&id)?;
    let user = ctx.user.as_ref().ok_or_else(|| PageError::LoginRequired {
        next: post_url(post_id),
    })?;

    match state.comment_service.add(post_id, user, &form).await {
        Ok(comment) => {
            tracing::debug!(comment_id = comment.id, post_id, "comment added");
        }
        Err(CommentServiceError::ValidationError(errors)) => {
            tracing::debug!(post_id, user_id = user.id, "comment dropped: {}", errors);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(found(&post_url(post_id)))
}

/// Resolve `{id}` and `{cid}` to a comment on that post, owned by the
/// current user. `Err(redirect)` when someone else wrote it.
async fn own_comment(
    state: &AppState,
    ctx: &RequestContext,
    post_id: &str,
    comment_id: &str,
) -> Result<Result<Comment, Response>, PageError> {
    let user = ctx.require_user()?;
    let post_id = parse_id(post_id)?;
    let comment_id = parse_id(comment_id)?;

    let comment = state.comment_service.get_for_post(post_id, comment_id).await?;
    if !can_modify(user, &comment) {
        tracing::info!(comment_id, user_id = user.id, "comment change refused: not the author");
        return Ok(Err(found(&post_url(post_id))));
    }
    Ok(Ok(comment))
}

fn render(
    state: &AppState,
    ctx: &RequestContext,
    comment: &Comment,
    form: Option<(&CommentForm, &FormErrors)>,
) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("comment", comment);
    context.insert("post_id", &comment.post_id);
    match form {
        Some((form, errors)) => {
            context.insert("deleting", &false);
            context.insert("form", form);
            context.insert("errors", errors);
        }
        None => {
            context.insert("deleting", &true);
            context.insert("errors", &FormErrors::new());
        }
    }
    state.render(ctx, "blog/comment.html", &context)
}

/// GET /posts/{id}/edit_comment/{cid}
pub async fn edit_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, cid)): Path<(String, String)>,
) -> Result<Response, PageError> {
    let comment = match own_comment(&state, &ctx, &id, &cid).await? {
        Ok(comment) => comment,
        Err(redirect) => return Ok(redirect),
    };
    let form = CommentForm::new(comment.text.clone());
    render(&state, &ctx, &comment, Some((&form, &FormErrors::new())))
}

/// POST /posts/{id}/edit_comment/{cid}
pub async fn edit(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, cid)): Path<(String, String)>,
    CsrfForm(form): CsrfForm<CommentForm>,
) -> Result<Response, PageError> {
    let comment = match own_comment(&state, &ctx, &id, &cid).await? {
        Ok(comment) => comment,
        Err(redirect) => return Ok(redirect),
    };

    match state.comment_service.update(&comment, &form).await {
        Ok(updated) => Ok(found(&post_url(updated.post_id))),
        Err(CommentServiceError::ValidationError(errors)) => {
            render(&state, &ctx, &comment, Some((&form, &errors)))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}/delete_comment/{cid}/
pub async fn delete_confirm(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, cid)): Path<(String, String)>,
) -> Result<Response, PageError> {
    match own_comment(&state, &ctx, &id, &cid).await? {
        Ok(comment) => render(&state, &ctx, &comment, None),
        Err(redirect) => Ok(redirect),
    }
}

/// POST /posts/{id}/delete_comment/{cid}/
pub async fn delete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, cid)): Path<(String, String)>,
    CsrfForm(_): CsrfForm<Confirmation>,
) -> Result<Response, PageError> {
    let comment = match own_comment(&state, &ctx, &id, &cid).await? {
        Ok(comment) => comment,
        Err(redirect) => return Ok(redirect),
    };

    state.comment_service.delete(comment.id).await?;
    Ok(found(&post_url(comment.post_id)))
}
