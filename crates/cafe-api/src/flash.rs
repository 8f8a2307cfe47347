//! One-shot messages carried across a redirect in a cookie.
//!
//! The cookie holds a short key rather than the message text, so the value
//! never needs escaping and cannot be used to inject arbitrary copy.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::error::AuthError;

pub const FLASH_COOKIE: &str = "cafe_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    EmailTaken,
    UnknownEmail,
    BadPassword,
    LoginRequired,
}

impl Flash {
    fn key(self) -> &'static str {
        match self {
            Flash::EmailTaken => "email-taken",
            Flash::UnknownEmail => "unknown-email",
            Flash::BadPassword => "bad-password",
            Flash::LoginRequired => "login-required",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "email-taken" => Some(Flash::EmailTaken),
            "unknown-email" => Some(Flash::UnknownEmail),
            "bad-password" => Some(Flash::BadPassword),
            "login-required" => Some(Flash::LoginRequired),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Flash::EmailTaken => "You've already signed up with that email, log in instead!",
            Flash::UnknownEmail => "That email does not exist, please try again.",
            Flash::BadPassword => "Password incorrect, please try again.",
            Flash::LoginRequired => "You need to login or register to comment.",
        }
    }

    pub fn for_auth_error(err: &AuthError) -> Option<Self> {
        match err {
            AuthError::DuplicateEmail => Some(Flash::EmailTaken),
            AuthError::UnknownEmail => Some(Flash::UnknownEmail),
            AuthError::BadPassword => Some(Flash::BadPassword),
            AuthError::LoginRequired => Some(Flash::LoginRequired),
            AuthError::Forbidden | AuthError::Internal(_) => None,
        }
    }
}

pub fn set(jar: CookieJar, flash: Flash) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, flash.key()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Read the pending flash, if any, and clear it.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };
    let flash = Flash::from_key(cookie.value());
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flash)
}
