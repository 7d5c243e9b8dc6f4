pub mod auth;
pub mod error;
pub mod forms;
pub mod home;
pub mod messages;
pub mod pages;
pub mod password;
pub mod session;
pub mod users;
pub mod view;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, header};
use axum::middleware;
use axum::routing::{get, post};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use session::{AuthedUser, CurrentUser, SessionContext, SessionStore};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: wren_db::Database,
    pub sessions: SessionStore,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::homepage))
        .route("/signup", get(auth::signup_page).post(auth::signup))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/users", get(users::list_users))
        .route("/users/profile", get(users::profile_page).post(users::update_profile))
        .route("/users/delete", post(users::delete_user))
        .route("/users/{user_id}", get(users::show_user))
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/{user_id}/likes", get(users::show_likes))
        .route("/users/follow/{user_id}", post(users::start_following))
        .route("/users/stop-following/{user_id}", post(users::stop_following))
        .route("/messages/new", get(messages::new_message_page).post(messages::create_message))
        .route("/messages/{message_id}", get(messages::show_message))
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .route("/messages/{message_id}/like", post(messages::toggle_like))
        .fallback(home::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), session::load_session))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
