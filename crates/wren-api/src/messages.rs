use axum::Form;
use axum::extract::{Extension, Path, State};
use axum::http::HeaderValue;
use axum::response::{Html, IntoResponse, Redirect, Response};
use wren_types::forms::{CsrfForm, MessageForm};

use crate::error::AppError;
use crate::forms::{self, ValidationErrors};
use crate::session::{AuthedUser, SessionContext, access_denied};
use crate::{AppState, pages, view};

pub async fn new_message_page(
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
) -> Response {
    render_form(&ctx, &viewer, &MessageForm::default(), &ValidationErrors::default())
        .into_response()
}

pub async fn create_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }

    if let Err(errors) = forms::validate_message(&form) {
        return Ok(render_form(&ctx, &viewer, &form, &errors).into_response());
    }

    state.db.insert_message(viewer.0.id, &form.text)?;
    Ok(Redirect::to(&format!("/users/{}", viewer.0.id)).into_response())
}

pub async fn show_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(message_id): Path<i64>,
) -> Result<Response, AppError> {
    let row = state.db.get_message(message_id)?.ok_or(AppError::NotFound)?;
    let message = view::message_from_row(row);
    let liked = state.db.has_liked(viewer.0.id, message.id)?;

    let body = pages::message_detail(&message, &viewer.0, liked, &ctx.csrf_token());
    Ok(pages::render(&ctx, Some(&viewer.0), "Message", body).into_response())
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(message_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }

    let row = state.db.get_message(message_id)?.ok_or(AppError::NotFound)?;

    // Ownership check: non-owners get the same uniform rejection as
    // anonymous users.
    if row.user_id != viewer.0.id {
        return Ok(access_denied(&ctx));
    }

    state.db.delete_message(message_id)?;
    Ok(Redirect::to(&format!("/users/{}", viewer.0.id)).into_response())
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(message_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }

    let row = state.db.get_message(message_id)?.ok_or(AppError::NotFound)?;

    // Liking one's own message is a distinct condition from missing auth.
    if row.user_id == viewer.0.id {
        return Err(AppError::Forbidden);
    }

    state.db.toggle_like(viewer.0.id, message_id)?;
    Ok(Redirect::to(safe_redirect(form.came_from.as_deref())).into_response())
}

/// Only same-site paths that form a valid Location header are honored;
/// anything else falls back to home so a missing or hostile `came_from`
/// never breaks the request.
fn safe_redirect(came_from: Option<&str>) -> &str {
    match came_from {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.chars().any(|c| c.is_ascii_control())
                && HeaderValue::from_str(path).is_ok() =>
        {
            path
        }
        _ => "/",
    }
}

fn render_form(
    ctx: &SessionContext,
    viewer: &AuthedUser,
    form: &MessageForm,
    errors: &ValidationErrors,
) -> Html<String> {
    pages::render(
        ctx,
        Some(&viewer.0),
        "New message",
        pages::message_form(form, errors, &ctx.csrf_token()),
    )
}

#[cfg(test)]
mod tests {
    use super::safe_redirect;

    #[test]
    fn came_from_defaults_to_home() {
        assert_eq!(safe_redirect(None), "/");
        assert_eq!(safe_redirect(Some("")), "/");
        assert_eq!(safe_redirect(Some("/users/3")), "/users/3");
        // protocol-relative and absolute URLs are not followed
        assert_eq!(safe_redirect(Some("//evil.example")), "/");
        assert_eq!(safe_redirect(Some("https://evil.example")), "/");
    }

    #[test]
    fn came_from_with_control_characters_falls_back() {
        // a path that cannot form a Location header must not 500 the request
        assert_eq!(safe_redirect(Some("/line\nbreak")), "/");
        assert_eq!(safe_redirect(Some("/tab\there")), "/");
        assert_eq!(safe_redirect(Some("/nul\0byte")), "/");
    }
}
