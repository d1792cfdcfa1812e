use axum::{
    debug_handler,
    extract::{Multipart, State},
    response::{Html, IntoResponse, Response},
};

use crate::{
    forms::{FormErrors, PostForm},
    found, groups, res,
    session::AuthUser,
    AppError, AppResult, AppState,
};

use super::{
    mutation,
    render::{self, PostFormView},
};

async fn form_page(
    state: &AppState,
    user: &AuthUser,
    form: &PostForm,
    errors: &FormErrors,
) -> AppResult<String> {
    let groups = groups::list_groups(&state.db_pool).await?;
    let content = render::post_form(&PostFormView {
        heading: "New post",
        action: "/new/",
        submit: "Publish",
        text: &form.text,
        group: form.group.as_deref(),
        groups: &groups,
        image: None,
        errors,
    });
    Ok(res::page("New post", Some(&user.0), &content))
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_post_page(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Html<String>> {
    Ok(Html(form_page(&state, &user, &PostForm::default(), &FormErrors::new()).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_post(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = PostForm::from_multipart(multipart).await?;
    let submitted = PostForm {
        image: None,
        ..form.clone()
    };

    match mutation::create_post(&state.db_pool, &state.media, &user.0, form).await {
        Ok(_) => Ok(found("/")),
        Err(AppError::Validation(errors)) => {
            Ok(Html(form_page(&state, &user, &submitted, &errors).await?).into_response())
        }
        Err(err) => Err(err),
    }
}
