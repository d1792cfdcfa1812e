mod comment;
mod edit;
mod group;
mod index;
pub mod listing;
pub mod mutation;
mod new;
pub(crate) mod render;
mod view;

use axum::{routing::get, Router};
use serde::Deserialize;

use crate::AppState;

pub use index::index;

/// `?page=` as typed; garbage is resolved by the paginator, not rejected.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/group/{slug}/", get(group::group_posts))
        .route("/new/", get(new::new_post_page).post(new::new_post))
        .route("/{username}/{post_id}/", get(view::post_view))
        .route("/{username}/{post_id}/edit/", get(edit::edit_page).post(edit::edit))
        .route(
            "/{username}/{post_id}/comment/",
            get(comment::comment_page).post(comment::add_comment),
        )
}
