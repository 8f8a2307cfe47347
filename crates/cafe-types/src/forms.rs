//! Form shapes accepted by the site and their validators.
//!
//! Each raw form is what the browser posts (every field optional at the
//! serde level, so a missing field becomes an empty string and is reported as
//! a field error rather than a rejected request). Each validator is a pure
//! function from the raw form to a typed bag or a list of field errors.

use serde::Deserialize;
use url::Url;

// -- Field errors --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First message recorded against `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

const REQUIRED: &str = "This field is required.";
const INVALID_URL: &str = "Invalid URL.";

fn require(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, REQUIRED);
    }
}

fn require_url(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, REQUIRED);
    } else if !is_web_url(value.trim()) {
        errors.push(field, INVALID_URL);
    }
}

/// Absolute http(s) URL with a host.
pub fn is_web_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

// -- Add listing --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddCafeForm {
    pub name: String,
    pub map_url: String,
    pub img_url: String,
    pub location: String,
    pub has_sockets: Option<String>,
    pub has_toilet: Option<String>,
    pub has_wifi: Option<String>,
    pub can_take_calls: Option<String>,
    pub seats: String,
    pub coffee_price: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCafe {
    pub name: String,
    pub map_url: String,
    pub img_url: String,
    pub location: String,
    pub has_sockets: bool,
    pub has_toilet: bool,
    pub has_wifi: bool,
    pub can_take_calls: bool,
    pub seats: String,
    pub coffee_price: String,
}

pub fn validate_cafe(form: &AddCafeForm) -> Result<NewCafe, FieldErrors> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "name", &form.name);
    require_url(&mut errors, "map_url", &form.map_url);
    require_url(&mut errors, "img_url", &form.img_url);
    require(&mut errors, "location", &form.location);
    require(&mut errors, "seats", &form.seats);
    require(&mut errors, "coffee_price", &form.coffee_price);

    errors.into_result(|| NewCafe {
        name: form.name.clone(),
        map_url: form.map_url.clone(),
        img_url: form.img_url.clone(),
        location: form.location.clone(),
        has_sockets: form.has_sockets.is_some(),
        has_toilet: form.has_toilet.is_some(),
        has_wifi: form.has_wifi.is_some(),
        can_take_calls: form.can_take_calls.is_some(),
        seats: form.seats.clone(),
        coffee_price: form.coffee_price.clone(),
    })
}

// -- Register --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
}

pub fn validate_registration(form: &RegisterForm) -> Result<NewUser, FieldErrors> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "email", &form.email);
    require(&mut errors, "name", &form.name);
    require(&mut errors, "password", &form.password);

    errors.into_result(|| NewUser {
        email: form.email.clone(),
        name: form.name.clone(),
        password: form.password.clone(),
    })
}

// -- Login --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub fn validate_login(form: &LoginForm) -> Result<Credentials, FieldErrors> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "email", &form.email);
    require(&mut errors, "password", &form.password);

    errors.into_result(|| Credentials {
        email: form.email.clone(),
        password: form.password.clone(),
    })
}

// -- Comment --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub comment_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub text: String,
}

pub fn validate_comment(form: &CommentForm) -> Result<NewComment, FieldErrors> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "comment_text", &form.comment_text);

    errors.into_result(|| NewComment {
        text: form.comment_text.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cafe_form() -> AddCafeForm {
        AddCafeForm {
            name: "Cafe X".into(),
            map_url: "https://x".into(),
            img_url: "https://y".into(),
            location: "Town".into(),
            has_sockets: Some("y".into()),
            has_toilet: None,
            has_wifi: Some("on".into()),
            can_take_calls: None,
            seats: "5".into(),
            coffee_price: "2.50".into(),
        }
    }

    #[test]
    fn valid_cafe_keeps_values_and_maps_checkboxes() {
        let cafe = validate_cafe(&cafe_form()).unwrap();
        assert_eq!(cafe.name, "Cafe X");
        assert_eq!(cafe.map_url, "https://x");
        assert_eq!(cafe.coffee_price, "2.50");
        assert!(cafe.has_sockets);
        assert!(!cafe.has_toilet);
        assert!(cafe.has_wifi);
        assert!(!cafe.can_take_calls);
    }

    #[test]
    fn blank_fields_are_required() {
        let form = AddCafeForm {
            name: "   ".into(),
            seats: String::new(),
            ..cafe_form()
        };
        let errors = validate_cafe(&form).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("name"), Some(REQUIRED));
        assert_eq!(errors.get("seats"), Some(REQUIRED));
        assert_eq!(errors.get("location"), None);
    }

    #[test]
    fn malformed_urls_are_rejected() {
        let form = AddCafeForm {
            map_url: "not a url".into(),
            img_url: "ftp://files.example.com/a.png".into(),
            ..cafe_form()
        };
        let errors = validate_cafe(&form).unwrap_err();
        assert_eq!(errors.get("map_url"), Some(INVALID_URL));
        assert_eq!(errors.get("img_url"), Some(INVALID_URL));
    }

    #[test]
    fn web_url_needs_scheme_and_host() {
        assert!(is_web_url("https://x"));
        assert!(is_web_url("http://maps.example.com/place?id=3"));
        assert!(!is_web_url("example.com"));
        assert!(!is_web_url("mailto:someone@example.com"));
        assert!(!is_web_url("https://"));
    }

    #[test]
    fn registration_reports_every_missing_field() {
        let errors = validate_registration(&RegisterForm::default()).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.get("email").is_some());
        assert!(errors.get("name").is_some());
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn login_and_comment_validate() {
        let creds = validate_login(&LoginForm {
            email: "a@x.com".into(),
            password: "pw1".into(),
        })
        .unwrap();
        assert_eq!(creds.email, "a@x.com");

        assert!(validate_comment(&CommentForm::default()).is_err());
        let comment = validate_comment(&CommentForm {
            comment_text: "Great flat white".into(),
        })
        .unwrap();
        assert_eq!(comment.text, "Great flat white");
    }
}
