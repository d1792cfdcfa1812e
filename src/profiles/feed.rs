use axum::{
    debug_handler,
    extract::{Query, State},
    response::Html,
};

use crate::{
    posts::{listing, render, PageQuery},
    session::AuthUser,
    AppResult, AppState,
};

/// Posts by the authors the viewer follows.
#[debug_handler(state = AppState)]
pub(crate) async fn follow_index(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let page_size = state.settings.page_size;
    let posts =
        listing::list_followed_posts(&state.db_pool, &user, page_size, page.as_deref()).await?;
    let intro = if posts.count == 0 {
        "<p>Follow some authors to see their posts here.</p>"
    } else {
        ""
    };
    Ok(Html(render::listing("Following", intro, &posts, Some(&user))?))
}
