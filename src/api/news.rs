use axum::{
    Form,
    extract::State,
    response::{Html, Redirect},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{AdminUser, CurrentUser};
use super::notices::{self, Notice};
use super::render::{self, Layout};
use super::{ApiError, AppState};
use crate::services::NewsError;

pub const PUBLISHED_NOTICE: &str = "News published";

#[derive(Debug, Default, Deserialize)]
pub struct PublishForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// GET /news
pub async fn news_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, ApiError> {
    let items = state.news.list_news().await?;
    let pending = notices::take(&session).await?;

    let mut body = String::from("<h1>News</h1>\n");
    body.push_str(&render::news_list(&items));

    Ok(Layout {
        title: "News",
        user: user.as_ref(),
        notices: &pending,
    }
    .render(&body))
}

/// GET /admin
pub async fn admin_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    AdminUser(admin): AdminUser,
) -> Result<Html<String>, ApiError> {
    let items = state.news.list_news().await?;
    let pending = notices::take(&session).await?;

    let mut body = render::publish_form();
    body.push_str("<h2>Published</h2>\n");
    body.push_str(&render::news_list(&items));

    Ok(Layout {
        title: "Admin",
        user: Some(&admin),
        notices: &pending,
    }
    .render(&body))
}

/// POST /admin
/// Always redirects back to the admin page with the outcome as a notice.
pub async fn publish(
    State(state): State<Arc<AppState>>,
    session: Session,
    AdminUser(admin): AdminUser,
    Form(form): Form<PublishForm>,
) -> Result<Redirect, ApiError> {
    let notice = match state.news.publish(&form.title, &form.text, &admin).await {
        Ok(_) => Notice::success(PUBLISHED_NOTICE),
        Err(NewsError::Validation(msg)) => Notice::error(msg),
        Err(err) => return Err(err.into()),
    };

    notices::push(&session, notice).await?;
    Ok(Redirect::to("/admin"))
}
