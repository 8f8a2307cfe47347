use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{MethodRouter, get, post},
};

use crate::auth::{self, AppState};
use crate::listings;
use crate::middleware::{load_session, require_login};
use crate::pages;

/// Every page route. Session loading wraps all of them; commenting is the
/// only route that needs a logged-in user up front.
pub fn router(state: AppState) -> Router {
    let post_routes: MethodRouter<AppState> = get(listings::show_post)
        .merge(post(listings::post_comment).route_layer(from_fn(require_login)));

    Router::new()
        .route("/", get(pages::home))
        .route("/health", get(pages::health))
        .route("/cafes", get(listings::cafes))
        .route("/add", get(listings::add_form).post(listings::add))
        .route("/post/{id}", post_routes)
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/delete/{id}", get(listings::delete))
        .layer(from_fn_with_state(state.clone(), load_session))
        .with_state(state)
}
