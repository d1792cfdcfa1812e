use axum::{
    debug_handler,
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
    Form,
};

use crate::{forms::CommentForm, found, session::AuthUser, AppError, AppResult, AppState};

use super::{listing, mutation, view};

/// Comments are only ever posted; a plain visit goes back to the post.
#[debug_handler(state = AppState)]
pub(crate) async fn comment_page(
    _user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let post = listing::get_post(&state.db_pool, &username, &post_id).await?;
    Ok(found(&post.url()))
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let post = listing::get_post(&state.db_pool, &username, &post_id).await?;
    let text = form.text.clone();

    match mutation::add_comment(&state.db_pool, &user, post.id, form).await {
        Ok(_) => Ok(found(&post.url())),
        Err(AppError::Validation(errors)) => {
            let page = view::post_page(&state, &post, Some(&user), &text, &errors).await?;
            Ok(Html(page).into_response())
        }
        Err(err) => Err(err),
    }
}
