use anyhow::Context;
use axum::{Router, middleware, routing::get};
use sha2::{Digest, Sha512};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::session_store::{ExpiredDeletion, SessionStore};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, NewsService, SeaOrmAuthService, SeaOrmNewsService};

mod assets;
pub mod auth;
mod error;
pub mod news;
pub mod notices;
mod observability;
mod pages;
pub mod render;

pub use error::ApiError;

use metrics_exporter_prometheus::PrometheusHandle;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "varsite.sid";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub news: Arc<dyn NewsService>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, store: Store, prometheus_handle: Option<PrometheusHandle>) -> Self {
        let auth = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
        ));
        let news = Arc::new(SeaOrmNewsService::new(store.clone()));

        Self {
            config: Arc::new(config),
            store,
            auth,
            news,
            prometheus_handle,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// Opens the database (running migrations) and wires the services.
/// Bootstrapping the admin account is a separate step, see [`Store::bootstrap_admin`].
pub async fn create_app_state(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_url,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    Ok(Arc::new(AppState::new(config, store, prometheus_handle)))
}

pub async fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let routes = create_site_router();

    let app = if state.config.server.persistent_sessions {
        let session_store = SqliteStore::new(state.store.sqlite_pool().clone());
        session_store
            .migrate()
            .await
            .context("Failed to create the session table")?;
        session_store
            .delete_expired()
            .await
            .context("Failed to prune expired sessions")?;

        with_sessions(routes, session_store, &state.config)?
    } else {
        with_sessions(routes, MemoryStore::default(), &state.config)?
    };

    Ok(app
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn create_site_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(pages::index))
        .route("/charter", get(pages::charter))
        .route("/rules", get(pages::rules))
        .route("/hierarchy", get(pages::hierarchy))
        .route("/creators", get(pages::creators))
        .route("/news", get(news::news_page))
        .route("/admin", get(news::admin_page).post(news::publish))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout))
        .route("/static/{*path}", get(assets::serve_asset))
        .route("/health", get(observability::health))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(observability::logging_middleware))
        .fallback(pages::not_found)
}

/// Wraps the routes in a signed-cookie session layer backed by `store`.
fn with_sessions<S: SessionStore + Clone>(
    routes: Router<Arc<AppState>>,
    store: S,
    config: &Config,
) -> anyhow::Result<Router<Arc<AppState>>> {
    let layer = SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(config.server.secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.server.session_inactivity_minutes,
        )))
        .with_signed(session_key(&config.server.session_secret)?);

    Ok(routes.layer(layer))
}

/// Stretches the configured secret to the 64 bytes a signing key needs.
fn session_key(secret: &str) -> anyhow::Result<Key> {
    let digest = Sha512::digest(secret.as_bytes());
    Key::try_from(digest.as_slice()).map_err(|e| anyhow::anyhow!("Invalid session key: {e}"))
}
