//! End-to-end flows through the full router: accounts, sessions, notices and publishing.

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use varsite::api::AppState;
use varsite::config::Config;

const ADMIN_PASSWORD: &str = "admin-pass";

async fn spawn_app_with(persistent_sessions: bool) -> (Arc<AppState>, Router) {
    let db_path =
        std::env::temp_dir().join(format!("varsite-site-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_url = format!("sqlite:{}", db_path.display());
    config.server.persistent_sessions = persistent_sessions;
    config.bootstrap.admin_password = ADMIN_PASSWORD.to_string();
    // Cheap hashing keeps the suite fast.
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = varsite::api::create_app_state(config, None)
        .await
        .expect("failed to create app state");

    state
        .store()
        .bootstrap_admin(&state.config.bootstrap, &state.config.security)
        .await
        .expect("failed to bootstrap admin");

    let router = varsite::api::router(state.clone())
        .await
        .expect("failed to build router");
    (state, router)
}

async fn spawn_app() -> (Arc<AppState>, Router) {
    spawn_app_with(true).await
}

/// Minimal cookie jar for the single session cookie.
#[derive(Default)]
struct Client {
    cookie: Option<String>,
}

impl Client {
    async fn get(&mut self, app: &Router, uri: &str) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        self.remember(&response);
        response
    }

    async fn post_form(&mut self, app: &Router, uri: &str, form: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap();
        self.remember(&response);
        response
    }

    async fn login(&mut self, app: &Router, username: &str, password: &str) -> Response<Body> {
        self.post_form(
            app,
            "/login",
            &format!("username={username}&password={password}"),
        )
        .await
    }

    fn remember(&mut self, response: &Response<Body>) {
        let Some(set_cookie) = response.headers().get(header::SET_COOKIE) else {
            return;
        };
        let pair = set_cookie
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let value = pair.split_once('=').map_or("", |(_, value)| value);
        self.cookie = if value.is_empty() { None } else { Some(pair) };
    }
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing location header")
        .to_str()
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_static_pages_render() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    for path in ["/", "/charter", "/rules", "/hierarchy", "/creators", "/news"] {
        let response = client.get(&app, path).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");

        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"), "{path}: {content_type}");

        let body = body_text(response).await;
        assert!(body.contains("href=\"/login\""), "{path} nav should offer login");
    }
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    let response = client.get(&app, "/no-such-page").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page not found"));
}

#[tokio::test]
async fn test_health_and_stylesheet() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    let response = client.get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");

    let response = client.get(&app, "/static/style.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/css"));

    let response = client.get(&app, "/static/missing.css").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_login_logout_flow() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    let response = client
        .post_form(&app, "/register", "username=alice&password=pw1")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = client.get(&app, "/login").await;
    let body = body_text(response).await;
    assert!(body.contains("Registration successful. Please log in."));

    let response = client.login(&app, "alice", "pw1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin");

    // Logged in, but not an administrator.
    let response = client.get(&app, "/").await;
    let body = body_text(response).await;
    assert!(body.contains("alice"));
    assert!(body.contains("href=\"/logout\""));
    assert!(!body.contains("href=\"/admin\""));

    let response = client.get(&app, "/logout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = client.get(&app, "/admin").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = client.get(&app, "/login").await;
    assert!(
        body_text(response)
            .await
            .contains("Please log in to access this page.")
    );
}

#[tokio::test]
async fn test_failed_login_is_generic() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    client
        .post_form(&app, "/register", "username=alice&password=pw1")
        .await;

    let response = client.login(&app, "alice", "wrong").await;
    assert_eq!(response.status(), StatusCode::OK);
    let wrong_password = body_text(response).await;
    assert!(wrong_password.contains("Invalid username or password"));

    let response = client.login(&app, "nobody", "pw1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let unknown_user = body_text(response).await;
    assert!(unknown_user.contains("Invalid username or password"));

    // Still anonymous.
    let response = client.get(&app, "/logout").await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_duplicate_and_blank_registration() {
    let (state, app) = spawn_app().await;
    let mut client = Client::default();

    client
        .post_form(&app, "/register", "username=alice&password=pw1")
        .await;

    let response = client
        .post_form(&app, "/register", "username=alice&password=other")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Username is already taken"));

    let response = client
        .post_form(&app, "/register", "username=&password=pw")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Please fill in all fields"));

    // Admin plus alice.
    assert_eq!(state.store().count_users().await.unwrap(), 2);

    // The first password still works.
    let response = client.login(&app, "alice", "pw1").await;
    assert_eq!(location(&response), "/admin");
}

#[tokio::test]
async fn test_non_admin_cannot_publish() {
    let (state, app) = spawn_app().await;
    let mut client = Client::default();

    client
        .post_form(&app, "/register", "username=bob&password=pw")
        .await;
    client.login(&app, "bob", "pw").await;

    let response = client
        .post_form(&app, "/admin", "title=Hi&text=Body")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert_eq!(state.store().count_news().await.unwrap(), 0);

    let response = client.get(&app, "/").await;
    assert!(body_text(response).await.contains("Access denied"));

    // Shown exactly once.
    let response = client.get(&app, "/").await;
    assert!(!body_text(response).await.contains("Access denied"));
}

#[tokio::test]
async fn test_anonymous_publish_redirects_to_login() {
    let (state, app) = spawn_app().await;
    let mut client = Client::default();

    let response = client
        .post_form(&app, "/admin", "title=Hi&text=Body")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(state.store().count_news().await.unwrap(), 0);
}

#[tokio::test]
async fn test_admin_publishes_news() {
    let (state, app) = spawn_app().await;
    let mut client = Client::default();

    let response = client.login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(location(&response), "/admin");

    let response = client.get(&app, "/admin").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Publish news"));

    let response = client
        .post_form(&app, "/admin", "title=First&text=Hello+there")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin");

    let response = client.get(&app, "/admin").await;
    assert!(body_text(response).await.contains("News published"));

    client
        .post_form(&app, "/admin", "title=Second&text=Newer")
        .await;
    assert_eq!(state.store().count_news().await.unwrap(), 2);

    // Anonymous readers see the feed newest first.
    let response = Client::default().get(&app, "/news").await;
    let body = body_text(response).await;
    let first = body.find("First").expect("first item missing");
    let second = body.find("Second").expect("second item missing");
    assert!(second < first);
    assert!(body.contains("Hello there"));
}

#[tokio::test]
async fn test_blank_publish_is_rejected() {
    let (state, app) = spawn_app().await;
    let mut client = Client::default();

    client.login(&app, "admin", ADMIN_PASSWORD).await;

    let response = client
        .post_form(&app, "/admin", "title=+++&text=Body")
        .await;
    assert_eq!(location(&response), "/admin");
    assert_eq!(state.store().count_news().await.unwrap(), 0);

    let response = client.get(&app, "/admin").await;
    assert!(
        body_text(response)
            .await
            .contains("Please fill in both the title and the text")
    );
}

#[tokio::test]
async fn test_news_content_is_escaped() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    client.login(&app, "admin", ADMIN_PASSWORD).await;
    client
        .post_form(&app, "/admin", "title=%3Cscript%3Ex%3C%2Fscript%3E&text=ok")
        .await;

    let response = client.get(&app, "/news").await;
    let body = body_text(response).await;
    assert!(!body.contains("<script>x</script>"));
    assert!(body.contains("&lt;script&gt;"));
}

#[tokio::test]
async fn test_in_memory_sessions() {
    let (_state, app) = spawn_app_with(false).await;
    let mut client = Client::default();

    let response = client.login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(location(&response), "/admin");

    let response = client.get(&app, "/admin").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_tampered_cookie_is_anonymous() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    client.login(&app, "admin", ADMIN_PASSWORD).await;
    let cookie = client.cookie.clone().expect("login should set a cookie");
    client.cookie = Some(format!("{cookie}x"));

    let response = client.get(&app, "/admin").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_metrics_require_admin() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    let response = client.get(&app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    client.login(&app, "admin", ADMIN_PASSWORD).await;

    // No recorder installed in tests.
    let response = client.get(&app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_security_headers_present() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    let response = client.get(&app, "/").await;
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_login_issues_a_new_session_id() {
    let (_state, app) = spawn_app().await;
    let mut client = Client::default();

    // The registration notice gives the anonymous visitor a session.
    client
        .post_form(&app, "/register", "username=alice&password=pw1")
        .await;
    let anonymous_cookie = client.cookie.clone().expect("register should set a cookie");

    let response = client.login(&app, "alice", "pw1").await;
    assert_eq!(location(&response), "/admin");
    let authenticated_cookie = client.cookie.clone().expect("login should set a cookie");
    assert_ne!(anonymous_cookie, authenticated_cookie);

    // The pre-login cookie does not carry the login.
    let mut stale = Client {
        cookie: Some(anonymous_cookie),
    };
    let response = stale.get(&app, "/logout").await;
    assert_eq!(location(&response), "/login");

    let response = client.get(&app, "/").await;
    assert!(body_text(response).await.contains("href=\"/logout\""));
}

#[tokio::test]
async fn test_session_for_deleted_user_is_anonymous() {
    use sea_orm::EntityTrait;

    let (state, app) = spawn_app().await;
    let mut client = Client::default();

    client.login(&app, "admin", ADMIN_PASSWORD).await;
    let response = client.get(&app, "/admin").await;
    assert_eq!(response.status(), StatusCode::OK);

    varsite::entities::users::Entity::delete_many()
        .exec(&state.store().conn)
        .await
        .unwrap();

    let response = client.get(&app, "/admin").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = client.get(&app, "/login").await;
    let body = body_text(response).await;
    assert!(body.contains("Please log in to access this page."));
    assert!(!body.contains("href=\"/logout\""));
}
