//! Account pages: sign up, log in, log out, password change

use axum::{
    extract::{Query, State},
    http::header,
    response::Response,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::csrf::{Confirmation, CsrfForm};
use super::error::{found, PageError};
use super::middleware::{clear_session_cookie, session_cookie, AppState, RequestContext};
use crate::forms::{
    FormErrors, LoginForm, PasswordChangeForm, RegistrationForm, NON_FIELD_ERRORS,
};
use crate::services::UserServiceError;

/// Where a login lands when no `next` is given
const LOGIN_REDIRECT: &str = "/";

/// `next` only if it points back into this site
pub fn safe_next(next: &str) -> Option<&str> {
    let next = next.trim();
    let local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.chars().any(|c| c.is_control());
    local.then_some(next)
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

fn form_context<T: serde::Serialize>(form: &T, errors: &FormErrors) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("non_field_errors", errors.get(NON_FIELD_ERRORS));
    context
}

// ============================================================================
// Registration
// ============================================================================

/// GET /auth/registration/
pub async fn registration_form(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, PageError> {
    let context = form_context(&RegistrationForm::default(), &FormErrors::new());
    state.render(&ctx, "registration/registration_form.html", &context)
}

/// POST /auth/registration/
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    CsrfForm(form): CsrfForm<RegistrationForm>,
) -> Result<Response, PageError> {
    match state.user_service.register(&form).await {
        Ok(_) => Ok(found(LOGIN_REDIRECT)),
        Err(UserServiceError::ValidationError(errors)) => state.render(
            &ctx,
            "registration/registration_form.html",
            &form_context(&form, &errors),
        ),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Login / logout
// ============================================================================

fn render_login(
    state: &AppState,
    ctx: &RequestContext,
    form: &LoginForm,
    errors: &FormErrors,
) -> Result<Response, PageError> {
    let mut context = form_context(form, errors);
    context.insert("next", safe_next(&form.next).unwrap_or_default());
    state.render(ctx, "registration/login.html", &context)
}

/// GET /auth/login/
pub async fn login_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<NextQuery>,
) -> Result<Response, PageError> {
    let form = LoginForm {
        next: query.next,
        ..LoginForm::default()
    };
    render_login(&state, &ctx, &form, &FormErrors::new())
}

/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    CsrfForm(form): CsrfForm<LoginForm>,
) -> Result<Response, PageError> {
    let (username, password) = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return render_login(&state, &ctx, &form, &errors),
    };

    match state.user_service.login(&username, &password).await {
        Ok((_, session)) => {
            let cookie = session_cookie(&session, &state.session_config)?;
            let target = safe_next(&form.next).unwrap_or(LOGIN_REDIRECT);
            let mut response = found(target);
            response.headers_mut().append(header::SET_COOKIE, cookie);
            Ok(response)
        }
        Err(UserServiceError::AuthenticationError(message)) => {
            render_login(&state, &ctx, &form, &FormErrors::single(NON_FIELD_ERRORS, message))
        }
        Err(e) => Err(e.into()),
    }
}

async fn end_session(state: &AppState, ctx: &RequestContext) -> Result<Response, PageError> {
    if let Some(session_id) = &ctx.session_id {
        state.user_service.logout(session_id).await?;
    }

    // The page itself is rendered as anonymous.
    let anonymous = RequestContext {
        user: None,
        session_id: None,
        ..ctx.clone()
    };
    let mut response = state.render(&anonymous, "registration/logged_out.html", &TeraContext::new())?;
    response
        .headers_mut()
        .append(header::SET_COOKIE, clear_session_cookie());
    Ok(response)
}

/// GET /auth/logout/
pub async fn logout_link(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, PageError> {
    end_session(&state, &ctx).await
}

/// POST /auth/logout/
pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
    CsrfForm(_): CsrfForm<Confirmation>,
) -> Result<Response, PageError> {
    end_session(&state, &ctx).await
}

// ============================================================================
// Password change
// ============================================================================

/// GET /auth/password_change/
pub async fn password_change_form(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, PageError> {
    ctx.require_user()?;
    let context = form_context(&PasswordChangeForm::default(), &FormErrors::new());
    state.render(&ctx, "registration/password_change_form.html", &context)
}

/// POST /auth/password_change/
pub async fn password_change(
    State(state): State<AppState>,
    ctx: RequestContext,
    CsrfForm(form): CsrfForm<PasswordChangeForm>,
) -> Result<Response, PageError> {
    let user = ctx.require_user()?;
    let current_session = ctx.session_id.as_deref().unwrap_or_default();

    match state
        .user_service
        .change_password(user, current_session, &form)
        .await
    {
        Ok(()) => Ok(found("/auth/password_change/done/")),
        Err(UserServiceError::ValidationError(errors)) => state.render(
            &ctx,
            "registration/password_change_form.html",
            &form_context(&form, &errors),
        ),
        Err(e) => Err(e.into()),
    }
}

/// GET /auth/password_change/done/
pub async fn password_change_done(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, PageError> {
    ctx.require_user()?;
    state.render(&ctx, "registration/password_change_done.html", &TeraContext::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next("/posts/3/"), Some("/posts/3/"));
        assert_eq!(safe_next(" /profile/edit "), Some("/profile/edit"));
        assert_eq!(safe_next(""), None);
        assert_eq!(safe_next("https://evil.example/"), None);
        assert_eq!(safe_next("//evil.example/"), None);
        assert_eq!(safe_next("/\\evil.example/"), None);
    }
}
