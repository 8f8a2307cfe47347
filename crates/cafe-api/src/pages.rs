use axum_extra::extract::CookieJar;
use maud::Markup;

use crate::flash;
use crate::middleware::Identity;
use crate::views;

pub async fn home(identity: Identity, jar: CookieJar) -> (CookieJar, Markup) {
    let (jar, flash) = flash::take(jar);
    (jar, views::home_page(&identity, flash))
}

pub async fn health() -> &'static str {
    "ok"
}
