use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use cafe_types::models::{Session, User};

use crate::auth::{AppState, SESSION_COOKIE};
use crate::error::{ApiError, AuthError};

/// Who is making the request. Anonymous when both fields are `None`.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub session: Option<Session>,
    pub user: Option<User>,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned().unwrap_or_default())
    }
}

/// Resolve the session cookie and attach an [`Identity`] to the request.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.auth.identify(cookie.value())?,
        None => Identity::default(),
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Let the request through only when someone is logged in.
pub async fn require_login(identity: Identity, req: Request, next: Next) -> Result<Response, ApiError> {
    if identity.user.is_none() {
        return Err(AuthError::LoginRequired.into());
    }
    Ok(next.run(req).await)
}
