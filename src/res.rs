use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::db::User;

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Substitutes `{key}` placeholders in one pass, so substituted values are
/// never scanned for placeholders themselves. Unknown keys stay as written.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];

        let value = tail.find('}').and_then(|end| {
            let key = &tail[..end];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, end))
        });

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn escape(text: &str) -> Cow<'_, str> {
    html_escape::encode_text(text)
}

pub fn attr(text: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(text)
}

/// Renders post bodies as markdown. Raw HTML in the source is shown as text.
pub fn markdown(source: &str) -> String {
    use pulldown_cmark::{Event, Options, Parser};

    let parser = Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        _ => event,
    });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output
}

pub fn nav(viewer: Option<&User>) -> String {
    match viewer {
        Some(user) => fill(
            include_res!(str, "/pages/nav_user.html"),
            &[
                ("username", &*escape(&user.username)),
                ("username_path", &*attr(&user.username)),
            ],
        ),
        None => include_res!(str, "/pages/nav_guest.html").to_owned(),
    }
}

/// Wraps `content` in the site layout.
pub fn page(title: &str, viewer: Option<&User>, content: &str) -> String {
    fill(
        include_res!(str, "/pages/base.html"),
        &[
            ("title", &*escape(title)),
            ("nav", nav(viewer).as_str()),
            ("content", content),
        ],
    )
}

pub fn not_found(path: &str) -> Response {
    let content = fill(include_res!(str, "/pages/404.html"), &[("path", &*escape(path))]);
    (StatusCode::NOT_FOUND, Html(page("Page not found", None, &content))).into_response()
}

pub fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Html(page("Forbidden", None, include_res!(str, "/pages/403.html"))),
    )
        .into_response()
}

pub fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(page("Server error", None, include_res!(str, "/pages/500.html"))),
    )
        .into_response()
}
