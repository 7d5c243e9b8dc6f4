use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::error;

use crate::pages;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A referenced entity id has no row.
    #[error("not found")]
    NotFound,
    /// Self-interaction (liking one's own message), distinct from the
    /// generic unauthorized redirect.
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Db(#[from] wren_db::DbError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => {
                (StatusCode::NOT_FOUND, Html(pages::not_found_page())).into_response()
            }
            AppError::Forbidden => {
                (StatusCode::FORBIDDEN, Html(pages::forbidden_page())).into_response()
            }
            AppError::Db(e) => {
                error!("database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::server_error_page()))
                    .into_response()
            }
            AppError::Internal(e) => {
                error!("internal error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::server_error_page()))
                    .into_response()
            }
        }
    }
}
