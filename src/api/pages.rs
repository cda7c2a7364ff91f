//! Informational pages whose bodies are embedded at build time.

use axum::{
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use rust_embed::RustEmbed;
use tower_sessions::Session;

use super::ApiError;
use super::auth::CurrentUser;
use super::notices;
use super::render::{self, Layout};
use crate::db::User;

#[derive(RustEmbed)]
#[folder = "pages/"]
struct PageFragment;

async fn render_page(
    slug: &str,
    title: &str,
    session: &Session,
    user: Option<&User>,
) -> Result<Html<String>, ApiError> {
    let fragment = PageFragment::get(&format!("{slug}.html"))
        .ok_or_else(|| ApiError::internal(format!("Embedded page missing: {slug}")))?;
    let body = std::str::from_utf8(&fragment.data)
        .map_err(|e| ApiError::internal(format!("Embedded page {slug} is not UTF-8: {e}")))?;

    let pending = notices::take(session).await?;

    Ok(Layout {
        title,
        user,
        notices: &pending,
    }
    .render(body))
}

/// GET /
pub async fn index(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, ApiError> {
    render_page("index", "Home", &session, user.as_ref()).await
}

/// GET /charter
pub async fn charter(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, ApiError> {
    render_page("charter", "Charter", &session, user.as_ref()).await
}

/// GET /rules
pub async fn rules(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, ApiError> {
    render_page("rules", "Rules", &session, user.as_ref()).await
}

/// GET /hierarchy
pub async fn hierarchy(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, ApiError> {
    render_page("hierarchy", "Hierarchy", &session, user.as_ref()).await
}

/// GET /creators
pub async fn creators(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, ApiError> {
    render_page("creators", "Creators", &session, user.as_ref()).await
}

/// Fallback for unknown paths. Pending notices are left for a real page.
pub async fn not_found(uri: Uri, CurrentUser(user): CurrentUser) -> Response {
    let body = format!(
        "<h1>Page not found</h1>\n<p>Nothing lives at <code>{}</code>.</p>\n<p><a href=\"/\">Back to the home page</a></p>\n",
        render::escape(uri.path())
    );

    let page = Layout {
        title: "Page not found",
        user: user.as_ref(),
        notices: &[],
    }
    .render(&body);

    (StatusCode::NOT_FOUND, page).into_response()
}
