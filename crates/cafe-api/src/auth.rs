use std::sync::Arc;

use anyhow::{Context, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, NaiveDateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use maud::Markup;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use cafe_db::Database;
use cafe_types::forms::{
    Credentials, FieldErrors, LoginForm, NewUser, RegisterForm, validate_login,
    validate_registration,
};
use cafe_types::models::{Session, User};

use crate::error::{ApiError, AuthError};
use crate::flash;
use crate::listings::ListingStore;
use crate::middleware::Identity;
use crate::{blocking, views};

pub const SESSION_COOKIE: &str = "cafe_session";

/// SQLite `datetime('now')` format, always UTC.
const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub auth: Authenticator,
    pub listings: ListingStore,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Claims carried by the signed session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sid: Uuid,
    sub: i64,
    exp: usize,
}

/// Issues, resolves and destroys sessions on top of the users and sessions
/// tables.
pub struct Authenticator {
    db: Arc<Database>,
    secret: String,
    params: Params,
    session_ttl: chrono::Duration,
}

impl Authenticator {
    pub fn new(
        db: Arc<Database>,
        secret: impl Into<String>,
        cost: HashCost,
        session_ttl: chrono::Duration,
    ) -> anyhow::Result<Self> {
        if session_ttl <= chrono::Duration::zero() {
            return Err(anyhow!("Session lifetime must be positive, got {}", session_ttl));
        }
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| anyhow!("Invalid password hash cost: {}", e))?;

        Ok(Self {
            db,
            secret: secret.into(),
            params,
            session_ttl,
        })
    }

    fn hasher(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn register(&self, user: &NewUser) -> Result<Session, AuthError> {
        if self.db.get_user_by_email(&user.email)?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .hasher()
            .hash_password(user.password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?
            .to_string();

        // The UNIQUE constraint settles a race between two registrations.
        let user_id = self
            .db
            .create_user(&user.email, &user.name, &password_hash)?
            .ok_or(AuthError::DuplicateEmail)?;

        info!("Registered user {}", user_id);
        self.open_session(user_id)
    }

    pub fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let user = self
            .db
            .get_user_by_email(&credentials.email)?
            .ok_or(AuthError::UnknownEmail)?;

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow!("Stored hash for user {} is unreadable: {}", user.id, e))?;

        match self
            .hasher()
            .verify_password(credentials.password.as_bytes(), &parsed_hash)
        {
            Ok(()) => {}
            Err(password_hash::Error::Password) => {
                warn!("Failed login for user {}", user.id);
                return Err(AuthError::BadPassword);
            }
            Err(e) => return Err(anyhow!("Password verification failed: {}", e).into()),
        }

        let purged = self.db.purge_expired_sessions()?;
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
        }

        info!("User {} logged in", user.id);
        self.open_session(user.id)
    }

    /// Idempotent: logging out an already-closed session is not an error.
    pub fn logout(&self, session: &Session) -> anyhow::Result<()> {
        if self.db.delete_session(&session.id.to_string())? {
            info!("User {} logged out", session.user_id);
        }
        Ok(())
    }

    pub fn current_user(&self, session: &Session) -> anyhow::Result<Option<User>> {
        let live = self
            .db
            .get_live_session(&session.id.to_string())?
            .is_some_and(|row| row.user_id == session.user_id);
        if !live {
            return Ok(None);
        }

        let user = self.db.get_user_by_id(session.user_id)?.map(|row| User {
            id: row.id,
            email: row.email,
            name: row.name,
        });
        Ok(user)
    }

    pub fn require_role<P>(&self, identity: &Identity, predicate: P) -> Result<(), AuthError>
    where
        P: FnOnce(&User) -> bool,
    {
        match identity.user.as_ref() {
            Some(user) if predicate(user) => Ok(()),
            _ => Err(AuthError::Forbidden),
        }
    }

    /// The administrator is the first user ever registered.
    pub fn require_admin(&self, identity: &Identity) -> Result<(), AuthError> {
        let admin_id = self.db.first_user_id()?;
        self.require_role(identity, |user| Some(user.id) == admin_id)
    }

    pub fn is_admin(&self, identity: &Identity) -> anyhow::Result<bool> {
        match self.require_admin(identity) {
            Ok(()) => Ok(true),
            Err(AuthError::Internal(e)) => Err(e),
            Err(_) => Ok(false),
        }
    }

    fn open_session(&self, user_id: i64) -> Result<Session, AuthError> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            expires_at: Utc::now() + self.session_ttl,
        };

        self.db.create_session(
            &session.id.to_string(),
            user_id,
            &session.expires_at.format(SQLITE_TIMESTAMP).to_string(),
        )?;

        Ok(session)
    }

    pub fn issue_token(&self, session: &Session) -> anyhow::Result<String> {
        let claims = Claims {
            sid: session.id,
            sub: session.user_id,
            exp: session.expires_at.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// A token that fails signature or expiry checks, or whose session row is
    /// gone, resolves to `None`.
    pub fn resolve_token(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let claims = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("Rejected session token: {}", e);
                return Ok(None);
            }
        };

        let Some(row) = self.db.get_live_session(&claims.sid.to_string())? else {
            return Ok(None);
        };
        if row.user_id != claims.sub {
            return Ok(None);
        }

        let expires_at: DateTime<Utc> = NaiveDateTime::parse_from_str(&row.expires_at, SQLITE_TIMESTAMP)
            .with_context(|| format!("Corrupt expires_at '{}' on session {}", row.expires_at, row.id))?
            .and_utc();

        Ok(Some(Session {
            id: claims.sid,
            user_id: row.user_id,
            expires_at,
        }))
    }

    /// Resolve a cookie value to the identity behind it.
    pub fn identify(&self, token: &str) -> anyhow::Result<Identity> {
        let Some(session) = self.resolve_token(token)? else {
            return Ok(Identity::default());
        };
        let user = self.current_user(&session)?;
        Ok(Identity {
            session: user.is_some().then_some(session),
            user,
        })
    }

    pub fn session_cookie(&self, session: &Session) -> anyhow::Result<Cookie<'static>> {
        let token = self.issue_token(session)?;
        Ok(Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build())
    }
}

// -- Handlers --

pub async fn register_form(identity: Identity, jar: CookieJar) -> (CookieJar, Markup) {
    let (jar, flash) = flash::take(jar);
    let page = views::register_page(&identity, flash, &RegisterForm::default(), &FieldErrors::new());
    (jar, page)
}

pub async fn register(
    State(state): State<AppState>,
    identity: Identity,
    jar: CookieJar,
    Form(mut form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let new_user = match validate_registration(&form) {
        Ok(new_user) => new_user,
        Err(errors) => {
            form.password.clear();
            let page = views::register_page(&identity, None, &form, &errors);
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    // Argon2 is CPU-bound; keep it off the async workers
    let st = state.clone();
    let session = blocking(move || st.auth.register(&new_user)).await?;

    let jar = jar.add(state.auth.session_cookie(&session)?);
    Ok((jar, Redirect::to("/cafes")).into_response())
}

pub async fn login_form(identity: Identity, jar: CookieJar) -> (CookieJar, Markup) {
    let (jar, flash) = flash::take(jar);
    let page = views::login_page(&identity, flash, &LoginForm::default(), &FieldErrors::new());
    (jar, page)
}

pub async fn login(
    State(state): State<AppState>,
    identity: Identity,
    jar: CookieJar,
    Form(mut form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let credentials = match validate_login(&form) {
        Ok(credentials) => credentials,
        Err(errors) => {
            form.password.clear();
            let page = views::login_page(&identity, None, &form, &errors);
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let st = state.clone();
    let session = blocking(move || st.auth.login(&credentials)).await?;

    let jar = jar.add(state.auth.session_cookie(&session)?);
    Ok((jar, Redirect::to("/cafes")).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    identity: Identity,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    if let Some(session) = identity.session.as_ref() {
        state.auth.logout(session)?;
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/cafes")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{authenticator, new_user};

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn register_then_login_scenario() {
        let (db, auth) = authenticator();
        let session = auth.register(&new_user("a@x.com", "A", "pw1")).unwrap();
        assert_eq!(db.count_users().unwrap(), 1);

        let user = auth.current_user(&session).unwrap().unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.name, "A");

        let again = auth.login(&credentials("a@x.com", "pw1")).unwrap();
        assert_eq!(again.user_id, user.id);
        assert_ne!(again.id, session.id);

        assert!(matches!(
            auth.login(&credentials("a@x.com", "wrong")),
            Err(AuthError::BadPassword)
        ));
    }

    #[test]
    fn duplicate_email_creates_no_row() {
        let (db, auth) = authenticator();
        auth.register(&new_user("a@x.com", "A", "pw1")).unwrap();

        let err = auth.register(&new_user("a@x.com", "Other", "pw2")).unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn stored_hash_is_not_the_plaintext() {
        let (db, auth) = authenticator();
        auth.register(&new_user("a@x.com", "A", "pw1")).unwrap();

        let row = db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_ne!(row.password, "pw1");
        assert!(row.password.starts_with("$argon2id$"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let (db, auth) = authenticator();
        auth.register(&new_user("a@x.com", "A", "same")).unwrap();
        auth.register(&new_user("b@x.com", "B", "same")).unwrap();

        let a = db.get_user_by_email("a@x.com").unwrap().unwrap();
        let b = db.get_user_by_email("b@x.com").unwrap().unwrap();
        assert_ne!(a.password, b.password);
    }

    #[test]
    fn unknown_email_is_reported() {
        let (_db, auth) = authenticator();
        assert!(matches!(
            auth.login(&credentials("nobody@x.com", "pw")),
            Err(AuthError::UnknownEmail)
        ));
    }

    #[test]
    fn token_roundtrip_and_logout() {
        let (_db, auth) = authenticator();
        let session = auth.register(&new_user("a@x.com", "A", "pw1")).unwrap();
        let token = auth.issue_token(&session).unwrap();

        let identity = auth.identify(&token).unwrap();
        assert_eq!(identity.user.as_ref().map(|u| u.id), Some(session.user_id));
        assert_eq!(identity.session.as_ref().map(|s| s.id), Some(session.id));

        auth.logout(&session).unwrap();
        auth.logout(&session).unwrap();
        assert!(auth.resolve_token(&token).unwrap().is_none());
        assert!(auth.identify(&token).unwrap().user.is_none());
    }

    #[test]
    fn expired_session_row_does_not_resolve() {
        let (db, auth) = authenticator();
        let live = auth.register(&new_user("a@x.com", "A", "pw1")).unwrap();

        // Token still inside its `exp`, but the row behind it has lapsed.
        let stale = Session {
            id: Uuid::new_v4(),
            user_id: live.user_id,
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        db.create_session(
            &stale.id.to_string(),
            stale.user_id,
            &stale.expires_at.format(SQLITE_TIMESTAMP).to_string(),
        )
        .unwrap();
        let token = auth
            .issue_token(&Session {
                expires_at: Utc::now() + chrono::Duration::hours(1),
                ..stale.clone()
            })
            .unwrap();

        assert!(auth.resolve_token(&token).unwrap().is_none());
        assert!(auth.current_user(&stale).unwrap().is_none());
        let identity = auth.identify(&token).unwrap();
        assert!(identity.user.is_none());
        assert!(identity.session.is_none());

        // Logging in prunes the lapsed row.
        auth.login(&credentials("a@x.com", "pw1")).unwrap();
        assert!(!db.delete_session(&stale.id.to_string()).unwrap());
    }

    #[test]
    fn non_positive_session_lifetime_is_rejected() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        for ttl in [chrono::Duration::zero(), chrono::Duration::hours(-5)] {
            assert!(Authenticator::new(db.clone(), "k", crate::test_support::FAST_HASH, ttl).is_err());
        }
    }

    #[test]
    fn tampered_or_foreign_tokens_do_not_resolve() {
        let (db, auth) = authenticator();
        let session = auth.register(&new_user("a@x.com", "A", "pw1")).unwrap();

        let other = Authenticator::new(db, "some-other-secret", crate::test_support::FAST_HASH, chrono::Duration::hours(1)).unwrap();
        let foreign = other.issue_token(&session).unwrap();
        assert!(auth.resolve_token(&foreign).unwrap().is_none());
        assert!(auth.resolve_token("not-a-jwt").unwrap().is_none());
    }

    #[test]
    fn only_first_user_is_admin() {
        let (_db, auth) = authenticator();
        let first = auth.register(&new_user("admin@x.com", "Admin", "pw")).unwrap();
        let second = auth.register(&new_user("b@x.com", "B", "pw")).unwrap();

        let admin = auth.identify(&auth.issue_token(&first).unwrap()).unwrap();
        let member = auth.identify(&auth.issue_token(&second).unwrap()).unwrap();

        assert!(auth.require_admin(&admin).is_ok());
        assert!(matches!(auth.require_admin(&member), Err(AuthError::Forbidden)));
        assert!(matches!(auth.require_admin(&Identity::default()), Err(AuthError::Forbidden)));
        assert!(auth.is_admin(&admin).unwrap());
        assert!(!auth.is_admin(&member).unwrap());
    }
}
