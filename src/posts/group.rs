use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::Html,
};

use crate::{res, session::CurrentUser, AppResult, AppState};

use super::{listing, render, PageQuery};

#[debug_handler(state = AppState)]
pub(crate) async fn group_posts(
    CurrentUser(viewer): CurrentUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let page_size = state.settings.page_size;
    let (group, posts) =
        listing::list_group_posts(&state.db_pool, &slug, page_size, page.as_deref()).await?;

    let intro = if group.description.is_empty() {
        String::new()
    } else {
        format!("<p>{}</p>", res::escape(&group.description))
    };
    Ok(Html(render::listing(&group.title, &intro, &posts, viewer.as_ref())?))
}
