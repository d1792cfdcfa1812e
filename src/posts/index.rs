use axum::{
    debug_handler,
    extract::{Query, State},
    response::Html,
};

use crate::{AppResult, AppState};

use super::{listing, render, PageQuery};

/// Every visitor shares the cached copy of this page, so it renders the
/// same for all of them.
#[debug_handler(state = AppState)]
pub async fn index(
    State(state): State<AppState>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let page_size = state.settings.page_size;
    let posts = listing::list_posts(&state.db_pool, page_size, page.as_deref()).await?;
    Ok(Html(render::listing("Latest posts", "", &posts, None)?))
}
