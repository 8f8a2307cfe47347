use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use cafe_types::forms::FieldErrors;
use thiserror::Error;
use tracing::error;

use crate::flash::{self, Flash};
use crate::views;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("no user with that email")]
    UnknownEmail,

    #[error("password does not match")]
    BadPassword,

    #[error("login required")]
    LoginRequired,

    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid form: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(AuthError::Forbidden) => (
                StatusCode::FORBIDDEN,
                views::error_page(StatusCode::FORBIDDEN, "Only the site administrator can do that."),
            )
                .into_response(),
            ApiError::Auth(AuthError::Internal(e)) | ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    views::error_page(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong."),
                )
                    .into_response()
            }
            ApiError::Auth(auth) => {
                let flash = Flash::for_auth_error(&auth).unwrap_or(Flash::LoginRequired);
                let jar = flash::set(CookieJar::new(), flash);
                (jar, Redirect::to("/login")).into_response()
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                views::error_page(StatusCode::NOT_FOUND, "That cafe does not exist."),
            )
                .into_response(),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                views::error_page(StatusCode::UNPROCESSABLE_ENTITY, &errors.to_string()),
            )
                .into_response(),
        }
    }
}
