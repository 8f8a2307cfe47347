//! Server-rendered pages. All interpolation is escaped by maud, including
//! comment text.

use axum::http::StatusCode;
use maud::{DOCTYPE, Markup, html};

use cafe_types::forms::{AddCafeForm, CommentForm, FieldErrors, LoginForm, RegisterForm};
use cafe_types::models::{Cafe, Comment, User};

use crate::flash::Flash;
use crate::middleware::Identity;

const SITE_NAME: &str = "Coffee & Wifi";

fn layout(title: &str, user: Option<&User>, flash: Option<Flash>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | " (SITE_NAME) }
            }
            body {
                nav {
                    a href="/" { (SITE_NAME) }
                    " · "
                    a href="/cafes" { "Cafes" }
                    " · "
                    a href="/add" { "Add a cafe" }
                    " · "
                    @if let Some(user) = user {
                        span.user { "Signed in as " (user.name) }
                        " · "
                        a href="/logout" { "Log out" }
                    } @else {
                        a href="/login" { "Log in" }
                        " · "
                        a href="/register" { "Register" }
                    }
                }
                @if let Some(flash) = flash {
                    p.flash role="alert" { (flash.message()) }
                }
                main { (content) }
            }
        }
    }
}

fn field(name: &str, label: &str, kind: &str, value: &str, errors: &FieldErrors) -> Markup {
    html! {
        p {
            label for=(name) { (label) }
            br;
            input type=(kind) id=(name) name=(name) value=(value);
            @if let Some(message) = errors.get(name) {
                br;
                span.error { (message) }
            }
        }
    }
}

fn checkbox(name: &str, label: &str, checked: bool) -> Markup {
    html! {
        p {
            label {
                input type="checkbox" name=(name) value="y" checked[checked];
                " " (label)
            }
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "✔" } else { "✘" }
}

pub fn home_page(identity: &Identity, flash: Option<Flash>) -> Markup {
    layout(
        "Home",
        identity.user.as_ref(),
        flash,
        html! {
            h1 { (SITE_NAME) }
            p { "Find a cafe with good coffee, fast wifi and a socket for your laptop." }
            p { a href="/cafes" { "Show me the cafes" } }
        },
    )
}

pub fn cafes_page(identity: &Identity, flash: Option<Flash>, cafes: &[Cafe], is_admin: bool) -> Markup {
    layout(
        "Cafes",
        identity.user.as_ref(),
        flash,
        html! {
            h1 { "All cafes" }
            @if cafes.is_empty() {
                p { "No cafes yet. " a href="/add" { "Add the first one." } }
            } @else {
                table {
                    thead {
                        tr {
                            th { "Cafe" } th { "Location" } th { "Sockets" } th { "Toilet" }
                            th { "Wifi" } th { "Calls" } th { "Seats" } th { "Coffee" } th { "Map" }
                            @if is_admin { th {} }
                        }
                    }
                    tbody {
                        @for cafe in cafes {
                            tr {
                                td { a href={ "/post/" (cafe.id) } { (cafe.name) } }
                                td { (cafe.location) }
                                td { (yes_no(cafe.has_sockets)) }
                                td { (yes_no(cafe.has_toilet)) }
                                td { (yes_no(cafe.has_wifi)) }
                                td { (yes_no(cafe.can_take_calls)) }
                                td { (cafe.seats) }
                                td { (cafe.coffee_price) }
                                td { a href=(cafe.map_url) { "Map" } }
                                @if is_admin {
                                    td { a href={ "/delete/" (cafe.id) } { "Delete" } }
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn add_page(identity: &Identity, flash: Option<Flash>, form: &AddCafeForm, errors: &FieldErrors) -> Markup {
    layout(
        "Add a cafe",
        identity.user.as_ref(),
        flash,
        html! {
            h1 { "Add a new cafe" }
            form method="post" action="/add" {
                (field("name", "Name of Cafe", "text", &form.name, errors))
                (field("map_url", "Map url", "url", &form.map_url, errors))
                (field("img_url", "Img url", "url", &form.img_url, errors))
                (field("location", "Location", "text", &form.location, errors))
                (checkbox("has_sockets", "Has sockets", form.has_sockets.is_some()))
                (checkbox("has_toilet", "Has toilet", form.has_toilet.is_some()))
                (checkbox("has_wifi", "Has wifi", form.has_wifi.is_some()))
                (checkbox("can_take_calls", "Can take calls", form.can_take_calls.is_some()))
                (field("seats", "Number of seats", "text", &form.seats, errors))
                (field("coffee_price", "Coffee price in pounds", "text", &form.coffee_price, errors))
                button type="submit" { "Submit Cafe" }
            }
        },
    )
}

pub fn post_page(
    identity: &Identity,
    flash: Option<Flash>,
    cafe: &Cafe,
    comments: &[Comment],
    form: &CommentForm,
    errors: &FieldErrors,
) -> Markup {
    layout(
        &cafe.name,
        identity.user.as_ref(),
        flash,
        html! {
            article {
                h1 { (cafe.name) }
                p.meta { (cafe.location) " · added on " (cafe.display_date()) }
                img src=(cafe.img_url) alt=(cafe.name) width="480";
                ul {
                    li { "Sockets: " (yes_no(cafe.has_sockets)) }
                    li { "Toilet: " (yes_no(cafe.has_toilet)) }
                    li { "Wifi: " (yes_no(cafe.has_wifi)) }
                    li { "Can take calls: " (yes_no(cafe.can_take_calls)) }
                    li { "Seats: " (cafe.seats) }
                    li { "Coffee: " (cafe.coffee_price) }
                }
                p { a href=(cafe.map_url) { "Open in maps" } }
            }
            section.comments {
                h2 { "Comments" }
                @if comments.is_empty() {
                    p { "No comments yet." }
                }
                @for comment in comments {
                    div.comment {
                        p { (comment.text) }
                        p.author { "Posted by " (comment.author_name) }
                    }
                }
                form method="post" action={ "/post/" (cafe.id) } {
                    p {
                        label for="comment_text" { "Comment" }
                        br;
                        textarea id="comment_text" name="comment_text" rows="4" cols="60" { (form.comment_text) }
                        @if let Some(message) = errors.get("comment_text") {
                            br;
                            span.error { (message) }
                        }
                    }
                    button type="submit" { "Submit comment" }
                }
            }
        },
    )
}

pub fn register_page(identity: &Identity, flash: Option<Flash>, form: &RegisterForm, errors: &FieldErrors) -> Markup {
    layout(
        "Register",
        identity.user.as_ref(),
        flash,
        html! {
            h1 { "Register" }
            form method="post" action="/register" {
                (field("email", "Email", "email", &form.email, errors))
                (field("name", "Name", "text", &form.name, errors))
                (field("password", "Password", "password", &form.password, errors))
                button type="submit" { "Sign up" }
            }
        },
    )
}

pub fn login_page(identity: &Identity, flash: Option<Flash>, form: &LoginForm, errors: &FieldErrors) -> Markup {
    layout(
        "Log in",
        identity.user.as_ref(),
        flash,
        html! {
            h1 { "Log in" }
            form method="post" action="/login" {
                (field("email", "Email", "email", &form.email, errors))
                (field("password", "Password", "password", &form.password, errors))
                button type="submit" { "Log in" }
            }
        },
    )
}

pub fn error_page(status: StatusCode, message: &str) -> Markup {
    let title = status.canonical_reason().unwrap_or("Error");
    layout(
        title,
        None,
        None,
        html! {
            h1 { (status.as_u16()) " " (title) }
            p { (message) }
            p { a href="/cafes" { "Back to the cafes" } }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn comment_text_is_escaped() {
        let cafe = Cafe {
            id: 1,
            name: "Cafe X".into(),
            map_url: "https://x".into(),
            img_url: "https://y".into(),
            location: "Town".into(),
            has_sockets: true,
            has_toilet: false,
            has_wifi: true,
            can_take_calls: false,
            seats: "5".into(),
            coffee_price: "2.50".into(),
            author_id: None,
            date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        };
        let comments = vec![Comment {
            id: 1,
            post_id: 1,
            author_id: 1,
            author_name: "A".into(),
            text: "<script>alert(1)</script>".into(),
        }];

        let html = post_page(
            &Identity::default(),
            None,
            &cafe,
            &comments,
            &CommentForm::default(),
            &FieldErrors::new(),
        )
        .into_string();

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("October 18, 2026"));
    }

    #[test]
    fn field_errors_render_inline() {
        let mut errors = FieldErrors::new();
        errors.push("map_url", "Invalid URL.");
        let html = add_page(&Identity::default(), None, &AddCafeForm::default(), &errors).into_string();
        assert!(html.contains("Invalid URL."));
    }
}
