use axum::{
    Form,
    extract::{FromRequestParts, State},
    http::request::Parts,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::notices::{self, Notice};
use super::render::{self, Layout};
use super::{ApiError, AppState};
use crate::db::User;
use crate::services::AuthError;

/// Session key holding the authenticated user's id.
pub const SESSION_USER_KEY: &str = "user_id";

pub const LOGIN_REQUIRED_NOTICE: &str = "Please log in to access this page.";
pub const ACCESS_DENIED_NOTICE: &str = "Access denied";
pub const REGISTERED_NOTICE: &str = "Registration successful. Please log in.";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

// ============================================================================
// Identity extractors
// ============================================================================

/// The visitor's identity, resolved once per request from the session.
#[derive(Clone)]
struct ResolvedUser(Option<User>);

async fn resolve_identity(
    parts: &mut Parts,
    state: &Arc<AppState>,
) -> Result<(Session, Option<User>), ApiError> {
    let session = Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| ApiError::SessionError(msg.to_string()))?;

    if let Some(ResolvedUser(user)) = parts.extensions.get::<ResolvedUser>() {
        return Ok((session, user.clone()));
    }

    let user = match session.get::<i32>(SESSION_USER_KEY).await? {
        Some(user_id) => {
            let user = state.auth.resolve(user_id).await?;
            if user.is_none() {
                // The account behind this session is gone; drop the stale id.
                session.remove::<i32>(SESSION_USER_KEY).await?;
            }
            user
        }
        None => None,
    };

    if let Some(user) = &user {
        tracing::Span::current().record("user_id", user.id);
    }

    parts.extensions.insert(ResolvedUser(user.clone()));
    Ok((session, user))
}

/// Who is asking, if anyone. Never rejects.
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (_, user) = resolve_identity(parts, state).await?;
        Ok(Self(user))
    }
}

/// A logged-in user. Anonymous visitors are sent to the login page.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (session, user) = resolve_identity(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match user {
            Some(user) => Ok(Self(user)),
            None => {
                let notice = Notice::info(LOGIN_REQUIRED_NOTICE);
                Err(redirect_with_notice(&session, "/login", notice).await)
            }
        }
    }
}

/// A logged-in administrator.
///
/// Other users get an "access denied" notice and land on the home page. The
/// check runs before any request body is read.
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if user.is_admin {
            return Ok(Self(user));
        }

        tracing::warn!(user_id = user.id, path = %parts.uri.path(), "Non-admin denied");
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, msg)| (status, msg).into_response())?;
        Err(redirect_with_notice(&session, "/", Notice::error(ACCESS_DENIED_NOTICE)).await)
    }
}

/// Queues `notice` and redirects, or renders the session failure.
pub async fn redirect_with_notice(session: &Session, to: &str, notice: Notice) -> Response {
    match notices::push(session, notice).await {
        Ok(()) => Redirect::to(to).into_response(),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
pub async fn login_page(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, ApiError> {
    let pending = notices::take(&session).await?;
    Ok(login_form(user.as_ref(), &pending, ""))
}

/// POST /login
/// A successful login always lands on the admin page.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(current): CurrentUser,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, ApiError> {
    match state.auth.login(&form.username, &form.password).await {
        Ok(user) => {
            // New id on privilege change so a planted cookie can't ride along.
            session.cycle_id().await?;
            session.insert(SESSION_USER_KEY, user.id).await?;

            tracing::info!(user_id = user.id, username = %user.username, "Login succeeded");
            metrics::counter!("auth_logins_total", "outcome" => "success").increment(1);

            Ok(Redirect::to("/admin").into_response())
        }
        Err(err @ AuthError::InvalidCredentials) => {
            tracing::info!(username = %form.username.trim(), "Login failed");
            metrics::counter!("auth_logins_total", "outcome" => "failure").increment(1);

            let mut pending = notices::take(&session).await?;
            pending.push(Notice::error(err.to_string()));
            Ok(login_form(current.as_ref(), &pending, form.username.trim()).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

/// GET /register
pub async fn register_page(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, ApiError> {
    let pending = notices::take(&session).await?;
    Ok(register_form(user.as_ref(), &pending, ""))
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(current): CurrentUser,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, ApiError> {
    match state.auth.register(&form.username, &form.password).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "User registered");
            metrics::counter!("users_registered_total").increment(1);

            let notice = Notice::success(REGISTERED_NOTICE);
            Ok(redirect_with_notice(&session, "/login", notice).await)
        }
        Err(err) if err.is_user_facing() => {
            let mut pending = notices::take(&session).await?;
            pending.push(Notice::error(err.to_string()));
            Ok(register_form(current.as_ref(), &pending, form.username.trim()).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

/// GET /logout
pub async fn logout(session: Session, AuthUser(user): AuthUser) -> Result<Redirect, ApiError> {
    session.flush().await?;
    tracing::info!(user_id = user.id, "Logged out");
    Ok(Redirect::to("/"))
}

// ============================================================================
// Helpers
// ============================================================================

fn login_form(user: Option<&User>, pending: &[Notice], username: &str) -> Html<String> {
    let mut body = render::credentials_form("/login", "Log in", "Log in", username);
    body.push_str("<p>No account yet? <a href=\"/register\">Register</a></p>\n");

    Layout {
        title: "Log in",
        user,
        notices: pending,
    }
    .render(&body)
}

fn register_form(user: Option<&User>, pending: &[Notice], username: &str) -> Html<String> {
    let mut body =
        render::credentials_form("/register", "Register", "Create account", username);
    body.push_str("<p>Already registered? <a href=\"/login\">Log in</a></p>\n");

    Layout {
        title: "Register",
        user,
        notices: pending,
    }
    .render(&body)
}
