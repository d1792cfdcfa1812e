//! HTML fragments shared by the post pages.

use time::{macros::format_description, OffsetDateTime};
use uuid::Uuid;

use crate::{
    db::{Comment, Group, Post, User},
    forms::{FormErrors, NON_FIELD},
    include_res,
    media::MediaStore,
    paginator::Page,
    res, AppResult,
};

pub(crate) fn format_date(at: OffsetDateTime) -> AppResult<String> {
    Ok(at.format(format_description!("[day] [month repr:short] [year] [hour]:[minute]"))?)
}

/// One post card. The edit link shows only to its author.
pub(crate) fn post_item(post: &Post, viewer: Option<&User>) -> AppResult<String> {
    let group = match &post.group {
        Some(group) => format!(
            r#"<a class="group" href="/group/{}/">{}</a>"#,
            res::attr(&group.slug),
            res::escape(&group.title)
        ),
        None => String::new(),
    };
    let image = match &post.image {
        Some(image) => format!(r#"<img src="{}" alt="">"#, res::attr(&MediaStore::url(image))),
        None => String::new(),
    };
    let edit = match viewer {
        Some(viewer) if viewer.id == post.author.id => {
            format!(r#"<a href="{}edit/">Edit</a>"#, res::attr(&post.url()))
        }
        _ => String::new(),
    };

    Ok(res::fill(
        include_res!(str, "/pages/posts/post_item.html"),
        &[
            ("id", post.id.to_string().as_str()),
            ("author", &*res::escape(&post.author.username)),
            ("author_path", &*res::attr(&post.author.username)),
            ("pub_date", format_date(post.pub_date)?.as_str()),
            ("group", group.as_str()),
            ("image", image.as_str()),
            ("text", res::markdown(&post.text).as_str()),
            ("edit", edit.as_str()),
        ],
    ))
}

pub(crate) fn post_items(posts: &[Post], viewer: Option<&User>) -> AppResult<String> {
    if posts.is_empty() {
        return Ok("<p>No posts yet.</p>".to_owned());
    }
    posts.iter().map(|post| post_item(post, viewer)).collect()
}

/// Previous/next links around "Page n of m". Nothing for a single page.
pub(crate) fn paginator<T>(page: &Page<T>) -> String {
    if page.num_pages <= 1 {
        return String::new();
    }

    let mut out = String::from(r#"<nav class="pagination">"#);
    if page.has_previous() {
        out += &format!(
            r#"<a href="?page=1">First</a> <a href="?page={}">Previous</a> "#,
            page.number - 1
        );
    }
    out += &format!("<span>Page {} of {}</span>", page.number, page.num_pages);
    if page.has_next() {
        out += &format!(
            r#" <a href="?page={}">Next</a> <a href="?page={}">Last</a>"#,
            page.number + 1,
            page.num_pages
        );
    }
    out += "</nav>";
    out
}

/// A full listing page: heading, optional intro, cards, pagination.
pub(crate) fn listing(
    title: &str,
    intro: &str,
    page: &Page<Post>,
    viewer: Option<&User>,
) -> AppResult<String> {
    let content = res::fill(
        include_res!(str, "/pages/posts/list.html"),
        &[
            ("heading", &*res::escape(title)),
            ("intro", intro),
            ("posts", post_items(&page.items, viewer)?.as_str()),
            ("paginator", paginator(page).as_str()),
        ],
    );
    Ok(res::page(title, viewer, &content))
}

pub(crate) fn comment(comment: &Comment) -> AppResult<String> {
    Ok(res::fill(
        include_res!(str, "/pages/posts/comment.html"),
        &[
            ("author", &*res::escape(&comment.author.username)),
            ("author_path", &*res::attr(&comment.author.username)),
            ("created", format_date(comment.created)?.as_str()),
            ("text", &*res::escape(&comment.text)),
        ],
    ))
}

pub(crate) fn comment_form(post: &Post, text: &str, errors: &FormErrors) -> String {
    res::fill(
        include_res!(str, "/pages/posts/comment_form.html"),
        &[
            ("author_path", &*res::attr(&post.author.username)),
            ("id", post.id.to_string().as_str()),
            ("errors", errors.render("text").as_str()),
            ("text", &*res::escape(text)),
        ],
    )
}

/// What the create and edit forms show.
pub(crate) struct PostFormView<'a> {
    pub(crate) heading: &'a str,
    pub(crate) action: &'a str,
    pub(crate) submit: &'a str,
    pub(crate) text: &'a str,
    /// Raw submitted value of the group select.
    pub(crate) group: Option<&'a str>,
    pub(crate) groups: &'a [Group],
    pub(crate) image: Option<&'a str>,
    pub(crate) errors: &'a FormErrors,
}

pub(crate) fn post_form(view: &PostFormView) -> String {
    let group_options: String = view
        .groups
        .iter()
        .map(|group| {
            let id = group.id.to_string();
            let selected = if view.group == Some(id.as_str()) { " selected" } else { "" };
            format!(
                r#"<option value="{id}"{selected}>{}</option>"#,
                res::escape(&group.title)
            )
        })
        .collect();

    let current_image = match view.image {
        Some(image) => format!(
            concat!(
                r#"<p>Currently: <a href="{}">{}</a> "#,
                r#"<label><input type="checkbox" name="image-clear" value="on"> Clear</label></p>"#,
            ),
            res::attr(&MediaStore::url(image)),
            res::escape(image)
        ),
        None => String::new(),
    };

    res::fill(
        include_res!(str, "/pages/posts/form.html"),
        &[
            ("heading", &*res::escape(view.heading)),
            ("action", &*res::attr(view.action)),
            ("submit", &*res::escape(view.submit)),
            ("non_field_errors", view.errors.render(NON_FIELD).as_str()),
            ("text_errors", view.errors.render("text").as_str()),
            ("text", &*res::escape(view.text)),
            ("group_errors", view.errors.render("group").as_str()),
            ("group_options", group_options.as_str()),
            ("image_errors", view.errors.render("image").as_str()),
            ("current_image", current_image.as_str()),
        ],
    )
}

/// The select's value for a post's current group.
pub(crate) fn group_value(group: Option<Uuid>) -> Option<String> {
    group.map(|id| id.to_string())
}
