use axum::{
    debug_handler,
    extract::{Path, State},
    response::Html,
};

use crate::{
    db::{Post, User},
    forms::FormErrors,
    include_res, res,
    session::CurrentUser,
    AppResult, AppState,
};

use super::{listing, render};

/// The post with its comments; the comment form only for logged in viewers.
pub(super) async fn post_page(
    state: &AppState,
    post: &Post,
    viewer: Option<&User>,
    comment_text: &str,
    errors: &FormErrors,
) -> AppResult<String> {
    let comments = listing::post_comments(&state.db_pool, post.id)
        .await?
        .iter()
        .map(render::comment)
        .collect::<AppResult<String>>()?;
    let comment_form = match viewer {
        Some(_) => render::comment_form(post, comment_text, errors),
        None => format!(
            r#"<p><a href="{}">Log in</a> to comment.</p>"#,
            res::attr(&crate::auth::login_url(&post.url()))
        ),
    };

    let content = res::fill(
        include_res!(str, "/pages/posts/post.html"),
        &[
            ("post", render::post_item(post, viewer)?.as_str()),
            ("comments", comments.as_str()),
            ("comment_form", comment_form.as_str()),
        ],
    );
    Ok(res::page(&format!("Post by @{}", post.author.username), viewer, &content))
}

#[debug_handler(state = AppState)]
pub(crate) async fn post_view(
    CurrentUser(viewer): CurrentUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> AppResult<Html<String>> {
    let post = listing::get_post(&state.db_pool, &username, &post_id).await?;
    Ok(Html(post_page(&state, &post, viewer.as_ref(), "", &FormErrors::new()).await?))
}
