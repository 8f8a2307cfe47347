use std::sync::Arc;

use anyhow::Context;
use axum::{
    Form,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use chrono::{NaiveDate, Utc};
use maud::Markup;
use tracing::{info, warn};

use cafe_db::Database;
use cafe_db::models::{CafeRow, NewCafeRow};
use cafe_types::forms::{AddCafeForm, CommentForm, FieldErrors, validate_cafe, validate_comment};
use cafe_types::models::{Cafe, Comment, User};

use crate::auth::{AppState, Authenticator};
use crate::error::{ApiError, AuthError};
use crate::flash;
use crate::middleware::Identity;
use crate::views;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Listing id taken from the `{id}` path segment. A segment that is not an
/// id names no listing, so it is rejected as `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingId(pub i64);

impl<S> FromRequestParts<S> for ListingId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::NotFound)?;
        raw.parse().map(ListingId).map_err(|_| ApiError::NotFound)
    }
}

/// Cafe listings and the comments attached to them.
pub struct ListingStore {
    db: Arc<Database>,
}

impl ListingStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Validate and insert a listing stamped with today's date.
    pub fn create(&self, form: &AddCafeForm, author: Option<&User>) -> Result<Cafe, ApiError> {
        let cafe = validate_cafe(form)?;
        let date = Utc::now().date_naive();
        let date_text = date.format(DATE_FORMAT).to_string();
        let author_id = author.map(|u| u.id);

        let inserted = self.db.insert_cafe(&NewCafeRow {
            name: &cafe.name,
            map_url: &cafe.map_url,
            img_url: &cafe.img_url,
            location: &cafe.location,
            has_sockets: cafe.has_sockets,
            has_toilet: cafe.has_toilet,
            has_wifi: cafe.has_wifi,
            can_take_calls: cafe.can_take_calls,
            seats: &cafe.seats,
            coffee_price: &cafe.coffee_price,
            author_id,
            date: &date_text,
        })?;

        let Some(id) = inserted else {
            let mut errors = FieldErrors::new();
            errors.push("name", "A cafe with that name already exists.");
            return Err(errors.into());
        };

        info!("Created cafe {} ({})", id, cafe.name);
        Ok(Cafe {
            id,
            name: cafe.name,
            map_url: cafe.map_url,
            img_url: cafe.img_url,
            location: cafe.location,
            has_sockets: cafe.has_sockets,
            has_toilet: cafe.has_toilet,
            has_wifi: cafe.has_wifi,
            can_take_calls: cafe.can_take_calls,
            seats: cafe.seats,
            coffee_price: cafe.coffee_price,
            author_id,
            date,
        })
    }

    pub fn get(&self, id: i64) -> anyhow::Result<Option<Cafe>> {
        self.db.get_cafe(id)?.map(cafe_from_row).transpose()
    }

    /// Every listing, ordered by id.
    pub fn list_all(&self) -> anyhow::Result<Vec<Cafe>> {
        self.db.list_cafes()?.into_iter().map(cafe_from_row).collect()
    }

    /// Admin-only. Comments on the listing go with it.
    pub fn delete(&self, id: i64, identity: &Identity, auth: &Authenticator) -> Result<(), ApiError> {
        if let Err(e) = auth.require_admin(identity) {
            if matches!(e, AuthError::Forbidden) {
                warn!(
                    "Refused delete of cafe {} for user {:?}",
                    id,
                    identity.user.as_ref().map(|u| u.id)
                );
            }
            return Err(e.into());
        }

        if !self.db.delete_cafe(id)? {
            return Err(ApiError::NotFound);
        }

        info!("Deleted cafe {}", id);
        Ok(())
    }

    pub fn comments(&self, post_id: i64) -> anyhow::Result<Vec<Comment>> {
        let rows = self.db.get_comments_for_post(post_id)?;
        Ok(rows
            .into_iter()
            .map(|row| Comment {
                id: row.id,
                post_id: row.post_id,
                author_id: row.author_id,
                author_name: row.author_name,
                text: row.text,
            })
            .collect())
    }

    pub fn add_comment(&self, post_id: i64, form: &CommentForm, author: &User) -> Result<Comment, ApiError> {
        let comment = validate_comment(form)?;

        let id = self
            .db
            .insert_comment(post_id, author.id, &comment.text)?
            .ok_or(ApiError::NotFound)?;

        Ok(Comment {
            id,
            post_id,
            author_id: author.id,
            author_name: author.name.clone(),
            text: comment.text,
        })
    }
}

fn cafe_from_row(row: CafeRow) -> anyhow::Result<Cafe> {
    let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
        .with_context(|| format!("Corrupt date '{}' on cafe {}", row.date, row.id))?;

    Ok(Cafe {
        id: row.id,
        name: row.name,
        map_url: row.map_url,
        img_url: row.img_url,
        location: row.location,
        has_sockets: row.has_sockets,
        has_toilet: row.has_toilet,
        has_wifi: row.has_wifi,
        can_take_calls: row.can_take_calls,
        seats: row.seats,
        coffee_price: row.coffee_price,
        author_id: row.author_id,
        date,
    })
}

// -- Handlers --

pub async fn cafes(
    State(state): State<AppState>,
    identity: Identity,
    jar: CookieJar,
) -> Result<(CookieJar, Markup), ApiError> {
    let cafes = state.listings.list_all()?;
    let is_admin = state.auth.is_admin(&identity)?;
    let (jar, flash) = flash::take(jar);
    Ok((jar, views::cafes_page(&identity, flash, &cafes, is_admin)))
}

pub async fn add_form(identity: Identity, jar: CookieJar) -> (CookieJar, Markup) {
    let (jar, flash) = flash::take(jar);
    let page = views::add_page(&identity, flash, &AddCafeForm::default(), &FieldErrors::new());
    (jar, page)
}

pub async fn add(
    State(state): State<AppState>,
    identity: Identity,
    Form(form): Form<AddCafeForm>,
) -> Result<Response, ApiError> {
    match state.listings.create(&form, identity.user.as_ref()) {
        Ok(_) => Ok(Redirect::to("/cafes").into_response()),
        Err(ApiError::Validation(errors)) => {
            let page = views::add_page(&identity, None, &form, &errors);
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn show_post(
    State(state): State<AppState>,
    ListingId(id): ListingId,
    identity: Identity,
    jar: CookieJar,
) -> Result<(CookieJar, Markup), ApiError> {
    let cafe = state.listings.get(id)?.ok_or(ApiError::NotFound)?;
    let comments = state.listings.comments(id)?;
    let (jar, flash) = flash::take(jar);
    let page = views::post_page(&identity, flash, &cafe, &comments, &CommentForm::default(), &FieldErrors::new());
    Ok((jar, page))
}

/// Guarded by `require_login` in the router.
pub async fn post_comment(
    State(state): State<AppState>,
    ListingId(id): ListingId,
    identity: Identity,
    Form(form): Form<CommentForm>,
) -> Result<Response, ApiError> {
    let author = identity.user.as_ref().ok_or(AuthError::LoginRequired)?;

    match state.listings.add_comment(id, &form, author) {
        Ok(_) => Ok(Redirect::to(&format!("/post/{id}")).into_response()),
        Err(ApiError::Validation(errors)) => {
            let cafe = state.listings.get(id)?.ok_or(ApiError::NotFound)?;
            let comments = state.listings.comments(id)?;
            let page = views::post_page(&identity, None, &cafe, &comments, &form, &errors);
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn delete(
    State(state): State<AppState>,
    id: Result<ListingId, ApiError>,
    identity: Identity,
) -> Result<Redirect, ApiError> {
    // Non-admins are refused before the id is looked at.
    let ListingId(id) = match id {
        Ok(id) => id,
        Err(e) => {
            state.auth.require_admin(&identity)?;
            return Err(e);
        }
    };
    state.listings.delete(id, &identity, &state.auth)?;
    Ok(Redirect::to("/cafes"))
}
