use std::collections::HashSet;

use axum::Form;
use axum::extract::{Extension, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use wren_db::DbError;
use wren_types::User;
use wren_types::forms::{CsrfForm, ProfileForm};
use wren_types::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL};

use crate::error::AppError;
use crate::forms::{self, ValidationErrors};
use crate::session::{AuthedUser, FlashLevel, SessionContext, access_denied};
use crate::{AppState, pages, password, view};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let q = query.q.as_deref().filter(|s| !s.is_empty());
    let users = view::users_from_rows(state.db.list_users(q)?);
    Ok(pages::render(&ctx, Some(&viewer.0), "Users", pages::users_index(&users, q))
        .into_response())
}

pub async fn show_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let profile = load_profile(&state, user_id)?;
    let messages = view::messages_from_rows(state.db.messages_of_user(user_id)?);
    let is_following = state.db.is_following(viewer.0.id, user_id)?;
    let liked: HashSet<i64> = state.db.liked_message_ids(viewer.0.id)?.into_iter().collect();

    let title = format!("@{}", profile.username);
    let body = pages::user_detail(&profile, &messages, &viewer.0, is_following, &liked, &ctx.csrf_token());
    Ok(pages::render(&ctx, Some(&viewer.0), &title, body).into_response())
}

pub async fn show_following(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let profile = load_profile(&state, user_id)?;
    let users = view::users_from_rows(state.db.following_of(user_id)?);
    let body = pages::follow_list("Following", &profile, &users);
    Ok(pages::render(&ctx, Some(&viewer.0), "Following", body).into_response())
}

pub async fn show_followers(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let profile = load_profile(&state, user_id)?;
    let users = view::users_from_rows(state.db.followers_of(user_id)?);
    let body = pages::follow_list("Followers", &profile, &users);
    Ok(pages::render(&ctx, Some(&viewer.0), "Followers", body).into_response())
}

pub async fn show_likes(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let profile = load_profile(&state, user_id)?;
    let messages = view::messages_from_rows(state.db.likes_of_user(user_id)?);
    let liked: HashSet<i64> = state.db.liked_message_ids(viewer.0.id)?.into_iter().collect();
    let body = pages::likes_page(&profile, &messages, &viewer.0, &liked, &ctx.csrf_token());
    Ok(pages::render(&ctx, Some(&viewer.0), "Likes", body).into_response())
}

pub async fn start_following(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(user_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }
    let target = load_profile(&state, user_id)?;

    if !state.db.is_following(viewer.0.id, target.id)? {
        state.db.follow(viewer.0.id, target.id)?;
    }
    Ok(Redirect::to(&format!("/users/{}/following", viewer.0.id)).into_response())
}

pub async fn stop_following(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Path(user_id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }
    let target = load_profile(&state, user_id)?;

    state.db.unfollow(viewer.0.id, target.id)?;
    Ok(Redirect::to(&format!("/users/{}/following", viewer.0.id)).into_response())
}

pub async fn profile_page(
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
) -> Response {
    let form = prefilled_form(&viewer.0);
    render_profile(&ctx, &viewer.0, &form, &ValidationErrors::default()).into_response()
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }

    if let Err(errors) = forms::validate_profile(&form) {
        return Ok(render_profile(&ctx, &viewer.0, &form, &errors).into_response());
    }

    // The edit only applies after re-entering the current password.
    if password::authenticate(&state.db, &viewer.0.username, &form.password)?.is_none() {
        ctx.flash(FlashLevel::Danger, "Wrong password, please try again.");
        return Ok(render_profile(&ctx, &viewer.0, &form, &ValidationErrors::default())
            .into_response());
    }

    let image_url = if form.image_url.trim().is_empty() {
        DEFAULT_IMAGE_URL
    } else {
        form.image_url.as_str()
    };
    let header_image_url = if form.header_image_url.trim().is_empty() {
        DEFAULT_HEADER_IMAGE_URL
    } else {
        form.header_image_url.as_str()
    };

    match state.db.update_profile(
        viewer.0.id,
        &form.username,
        &form.email,
        image_url,
        header_image_url,
        &form.bio,
        &form.location,
    ) {
        Ok(()) => Ok(Redirect::to(&format!("/users/{}", viewer.0.id)).into_response()),
        Err(DbError::Duplicate) => {
            ctx.flash(FlashLevel::Danger, "Username already taken");
            Ok(render_profile(&ctx, &viewer.0, &form, &ValidationErrors::default())
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    viewer: AuthedUser,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    if !ctx.verify_csrf(&form.csrf_token) {
        return Ok(access_denied(&ctx));
    }

    ctx.logout();
    state.db.delete_user(viewer.0.id)?;
    Ok(Redirect::to("/signup").into_response())
}

fn load_profile(state: &AppState, user_id: i64) -> Result<User, AppError> {
    let row = state.db.get_user_by_id(user_id)?.ok_or(AppError::NotFound)?;
    Ok(view::user_from_row(row))
}

fn prefilled_form(user: &User) -> ProfileForm {
    ProfileForm {
        username: user.username.clone(),
        email: user.email.clone(),
        image_url: user.image_url.clone(),
        header_image_url: user.header_image_url.clone(),
        bio: user.bio.clone(),
        location: user.location.clone(),
        password: String::new(),
        csrf_token: String::new(),
    }
}

fn render_profile(
    ctx: &SessionContext,
    viewer: &User,
    form: &ProfileForm,
    errors: &ValidationErrors,
) -> axum::response::Html<String> {
    pages::render(
        ctx,
        Some(viewer),
        "Edit profile",
        pages::profile_form(form, errors, &ctx.csrf_token()),
    )
}
