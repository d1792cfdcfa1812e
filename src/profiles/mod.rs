mod feed;
pub mod follow;
mod page;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(feed::follow_index))
        .route("/{username}/", get(page::profile))
        .route("/{username}/follow/", get(follow::profile_follow))
        .route("/{username}/unfollow/", get(follow::profile_unfollow))
}
