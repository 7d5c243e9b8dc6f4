use std::collections::HashSet;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::error::AppError;
use crate::session::{CurrentUser, SessionContext};
use crate::{AppState, pages, view};

/// Feed size cap for the home timeline.
const FEED_LIMIT: u32 = 100;

pub async fn homepage(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    match current.0 {
        Some(user) => {
            let messages = view::messages_from_rows(state.db.home_feed(user.id, FEED_LIMIT)?);
            let liked: HashSet<i64> = state.db.liked_message_ids(user.id)?.into_iter().collect();
            let body = pages::home_feed(&messages, &user, &liked, &ctx.csrf_token());
            Ok(pages::render(&ctx, Some(&user), "Home", body).into_response())
        }
        None => Ok(pages::render(&ctx, None, "Welcome", pages::home_anon()).into_response()),
    }
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(pages::not_found_page()))
}
