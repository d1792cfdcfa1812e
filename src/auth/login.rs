use axum::{
    debug_handler,
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    forms::{FormErrors, NON_FIELD},
    found, include_res, res,
    session::{CurrentUser, USER_ID},
    AppResult, AppState,
};

use super::{safe_next, users};

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) next: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    next: Option<String>,
}

fn login_form(next: &str, username: &str, errors: &FormErrors) -> String {
    res::page(
        "Log in",
        None,
        &res::fill(
            include_res!(str, "/pages/auth/login.html"),
            &[
                ("errors", errors.render(NON_FIELD).as_str()),
                ("next", &*res::attr(next)),
                ("username", &*res::attr(username)),
            ],
        ),
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn login_page(
    CurrentUser(user): CurrentUser,
    Query(LoginQuery { next }): Query<LoginQuery>,
) -> Response {
    let next = safe_next(next.as_deref());
    if user.is_some() {
        return found(next);
    }
    Html(login_form(next, "", &FormErrors::new())).into_response()
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(LoginForm { username, password, next }): Form<LoginForm>,
) -> AppResult<Response> {
    let next = safe_next(next.as_deref());

    let Some(user) = users::authenticate(&db_pool, username.trim(), &password).await? else {
        tracing::info!(%username, "failed login");
        let errors = FormErrors::single(NON_FIELD, "Please enter a correct username and password.");
        return Ok(Html(login_form(next, &username, &errors)).into_response());
    };

    session.cycle_id().await?;
    session.insert(USER_ID, user.id.to_string()).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "logged in");
    Ok(found(next))
}
