use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::Html,
};

use crate::{
    include_res,
    posts::{listing, render, PageQuery},
    res,
    session::CurrentUser,
    AppResult, AppState,
};

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    CurrentUser(viewer): CurrentUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let db_pool = &state.db_pool;
    let page_size = state.settings.page_size;
    let (author, posts) =
        listing::list_author_posts(db_pool, &username, page_size, page.as_deref()).await?;

    let posts_count = listing::author_post_count(db_pool, &author).await?;
    let followers = listing::follower_count(db_pool, &author).await?;
    let following = listing::following_count(db_pool, &author).await?;

    let follow_button = match &viewer {
        Some(viewer) if viewer.id == author.id => String::new(),
        Some(viewer) => {
            let (action, label) = if listing::is_following(db_pool, Some(viewer), &author).await? {
                ("unfollow", "Unfollow")
            } else {
                ("follow", "Follow")
            };
            format!(
                r#"<a class="button" href="/{}/{action}/">{label}</a>"#,
                res::attr(&author.username)
            )
        }
        None => String::new(),
    };

    let content = res::fill(
        include_res!(str, "/pages/profiles/profile.html"),
        &[
            ("username", &*res::escape(&author.username)),
            ("posts_count", posts_count.to_string().as_str()),
            ("followers", followers.to_string().as_str()),
            ("following", following.to_string().as_str()),
            ("follow_button", follow_button.as_str()),
            ("posts", render::post_items(&posts.items, viewer.as_ref())?.as_str()),
            ("paginator", render::paginator(&posts).as_str()),
        ],
    );
    Ok(Html(res::page(&format!("@{}", author.username), viewer.as_ref(), &content)))
}
