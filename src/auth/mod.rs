mod login;
mod logout;
pub mod password;
pub mod users;

use axum::{routing::get, Router};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::AppState;

pub const LOGIN_PATH: &str = "/auth/login/";

// `/` stays readable in `?next=/new/`
const NEXT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn router() -> Router<AppState> {
    Router::new()
        .route(LOGIN_PATH, get(login::login_page).post(login::login))
        .route("/auth/logout/", get(logout::logout))
}

/// Where anonymous visitors of `next` are sent.
pub fn login_url(next: &str) -> String {
    format!("{LOGIN_PATH}?next={}", utf8_percent_encode(next, NEXT))
}

/// Only local absolute paths are followed after login.
pub(crate) fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => {
            next
        }
        _ => "/",
    }
}
