use axum::Form;
use axum::extract::{Extension, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use wren_db::DbError;
use wren_types::forms::{CsrfForm, LoginForm, SignupForm};
use wren_types::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL};

use crate::error::AppError;
use crate::forms::{self, ValidationErrors};
use crate::session::{AuthedUser, FlashLevel, SessionContext, access_denied};
use crate::{AppState, pages, password};

pub async fn signup_page(Extension(ctx): Extension<SessionContext>) -> Html<String> {
    // Visiting the signup page drops any existing login.
    ctx.logout();
    render_signup(&ctx, &SignupForm::default(), &ValidationErrors::default())
}

pub async fn signup(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }
    ctx.logout();

    if let Err(errors) = forms::validate_signup(&form) {
        return Ok(render_signup(&ctx, &form, &errors).into_response());
    }

    let image_url = if form.image_url.trim().is_empty() {
        DEFAULT_IMAGE_URL
    } else {
        form.image_url.as_str()
    };
    let hash = password::hash_password(&form.password)?;

    let user = match state.db.create_user(
        &form.username,
        &form.email,
        &hash,
        image_url,
        DEFAULT_HEADER_IMAGE_URL,
    ) {
        Ok(user) => user,
        Err(DbError::Duplicate) => {
            ctx.flash(FlashLevel::Danger, "Username already taken");
            return Ok(render_signup(&ctx, &form, &ValidationErrors::default()).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    ctx.login(user.id);
    Ok(Redirect::to("/").into_response())
}

pub async fn login_page(Extension(ctx): Extension<SessionContext>) -> Html<String> {
    render_login(&ctx, &LoginForm::default(), &ValidationErrors::default())
}

pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }

    if let Err(errors) = forms::validate_login(&form) {
        return Ok(render_login(&ctx, &form, &errors).into_response());
    }

    match password::authenticate(&state.db, &form.username, &form.password)? {
        Some(user) => {
            ctx.login(user.id);
            ctx.flash(FlashLevel::Success, format!("Hello, {}!", user.username));
            Ok(Redirect::to("/").into_response())
        }
        None => {
            ctx.flash(FlashLevel::Danger, "Invalid credentials.");
            Ok(render_login(&ctx, &form, &ValidationErrors::default()).into_response())
        }
    }
}

pub async fn logout(
    Extension(ctx): Extension<SessionContext>,
    user: AuthedUser,
    Form(form): Form<CsrfForm>,
) -> Response {
    let _ = user;
    if !ctx.verify_csrf(&form.csrf_token) {
        return access_denied(&ctx);
    }

    ctx.logout();
    ctx.flash(FlashLevel::Success, "You have successfully logged out.");
    Redirect::to("/login").into_response()
}

fn render_signup(ctx: &SessionContext, form: &SignupForm, errors: &ValidationErrors) -> Html<String> {
    pages::render(ctx, None, "Sign up", pages::signup_form(form, errors, &ctx.csrf_token()))
}

fn render_login(ctx: &SessionContext, form: &LoginForm, errors: &ValidationErrors) -> Html<String> {
    pages::render(ctx, None, "Log in", pages::login_form(form, errors, &ctx.csrf_token()))
}
