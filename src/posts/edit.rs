use axum::{
    debug_handler,
    extract::{Multipart, Path, State},
    response::{Html, IntoResponse, Response},
};

use crate::{
    db::Post,
    forms::{FormErrors, PostForm},
    found, groups, res,
    session::AuthUser,
    AppError, AppResult, AppState,
};

use super::{
    listing, mutation,
    render::{self, PostFormView},
};

async fn form_page(
    state: &AppState,
    user: &AuthUser,
    post: &Post,
    text: &str,
    group: Option<&str>,
    errors: &FormErrors,
) -> AppResult<String> {
    let groups = groups::list_groups(&state.db_pool).await?;
    let action = format!("{}edit/", post.url());
    let content = render::post_form(&PostFormView {
        heading: "Edit post",
        action: &action,
        submit: "Save",
        text,
        group,
        groups: &groups,
        image: post.image.as_deref(),
        errors,
    });
    Ok(res::page("Edit post", Some(&user.0), &content))
}

#[debug_handler(state = AppState)]
pub(crate) async fn edit_page(
    user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let post = listing::get_post(&state.db_pool, &username, &post_id).await?;
    if post.author.id != user.0.id {
        return Ok(found(&post.url()));
    }

    let group = render::group_value(post.group.as_ref().map(|group| group.id));
    let errors = FormErrors::new();
    let page = form_page(&state, &user, &post, &post.text, group.as_deref(), &errors).await?;
    Ok(Html(page).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn edit(
    user: AuthUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
    multipart: Multipart,
) -> AppResult<Response> {
    let post = listing::get_post(&state.db_pool, &username, &post_id).await?;
    let form = PostForm::from_multipart(multipart).await?;
    let (text, group) = (form.text.clone(), form.group.clone());

    match mutation::edit_post(&state.db_pool, &state.media, &user.0, post.id, form).await {
        Ok(post) => Ok(found(&post.url())),
        Err(AppError::PermissionDenied) => Ok(found(&post.url())),
        Err(AppError::Validation(errors)) => {
            let page = form_page(&state, &user, &post, &text, group.as_deref(), &errors).await?;
            Ok(Html(page).into_response())
        }
        Err(err) => Err(err),
    }
}
