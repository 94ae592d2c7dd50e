//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::http::auth::{
    check_username_handler, login_handler, logout_handler, me_handler, password_handler,
    signup_handler,
};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let api_routes = Router::new()
        .route("/api/signup", post(signup_handler))
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/password", post(password_handler))
        .route("/api/me", get(me_handler))
        .route("/api/check-username", get(check_username_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .merge(api_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    queue_size: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_size = state.matchmaking.queue_size().await;

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.matchmaking.active_match_count(),
        queue_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn build_test_app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            client_origin: "http://localhost:3000".to_string(),
            data_dir: dir.path().to_path_buf(),
            arena_width: 1200.0,
            arena_height: 800.0,
        };
        let state = AppState::new(config);
        state.users.ensure_dir().await.unwrap();
        (build_router(state), dir)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .expect("expected request to build")
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("expected request to build")
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("expected response body");
        serde_json::from_slice(&body).expect("expected json body")
    }

    fn session_cookie(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .expect("expected session cookie")
            .to_string()
    }

    #[tokio::test]
    async fn signup_sets_a_session_and_me_returns_identity() {
        let (app, _dir) = build_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/signup",
                r#"{"username":"alice","password":"secret123"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = session_cookie(&response);
        assert!(cookie.starts_with("sid="));

        let payload = read_json(response).await;
        assert_eq!(payload["username"], "alice");
        assert_eq!(payload["wins"], 0);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/me")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload["username"], "alice");
        assert_eq!(payload["losses"], 0);
    }

    #[tokio::test]
    async fn signup_validation_rejects_bad_input() {
        let (app, _dir) = build_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/signup",
                r#"{"username":"ab","password":"secret123"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "invalid username");

        let response = app
            .oneshot(post_json(
                "/api/signup",
                r#"{"username":"alice","password":"short"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "invalid password");
    }

    #[tokio::test]
    async fn duplicate_signup_returns_conflict() {
        let (app, _dir) = build_test_app().await;
        let body = r#"{"username":"alice","password":"secret123"}"#;

        let response = app.clone().oneshot(post_json("/api/signup", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.oneshot(post_json("/api/signup", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(read_json(response).await["error"], "user exists");
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let (app, _dir) = build_test_app().await;
        app.clone()
            .oneshot(post_json(
                "/api/signup",
                r#"{"username":"alice","password":"secret123"}"#,
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/login",
                r#"{"username":"alice","password":"wrong-pass"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(response).await["error"], "invalid credentials");

        let response = app
            .oneshot(post_json(
                "/api/login",
                r#"{"username":"alice","password":"secret123"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).starts_with("sid="));
        assert_eq!(read_json(response).await["username"], "alice");
    }

    #[tokio::test]
    async fn me_without_a_session_is_unauthorized() {
        let (app, _dir) = build_test_app().await;

        let response = app.oneshot(get_req("/api/me")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(response).await["error"], "not logged in");
    }

    #[tokio::test]
    async fn logout_revokes_the_session() {
        let (app, _dir) = build_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/signup",
                r#"{"username":"alice","password":"secret123"}"#,
            ))
            .await
            .unwrap();
        let cookie = session_cookie(&response);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/logout")
                    .header("cookie", cookie.clone())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/me")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn password_change_requires_the_old_password() {
        let (app, _dir) = build_test_app().await;
        app.clone()
            .oneshot(post_json(
                "/api/signup",
                r#"{"username":"alice","password":"secret123"}"#,
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/password",
                r#"{"username":"alice","password":"wrong-pass","newPassword":"rotated-1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/password",
                r#"{"username":"alice","password":"secret123","newPassword":"rotated-1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json(
                "/api/login",
                r#"{"username":"alice","password":"rotated-1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn check_username_tracks_signups() {
        let (app, _dir) = build_test_app().await;

        let response = app
            .clone()
            .oneshot(get_req("/api/check-username?u=alice"))
            .await
            .unwrap();
        assert_eq!(read_json(response).await["available"], true);

        app.clone()
            .oneshot(post_json(
                "/api/signup",
                r#"{"username":"alice","password":"secret123"}"#,
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get_req("/api/check-username?u=alice"))
            .await
            .unwrap();
        assert_eq!(read_json(response).await["available"], false);

        let response = app
            .oneshot(get_req("/api/check-username?u=x"))
            .await
            .unwrap();
        assert_eq!(read_json(response).await["available"], false);
    }

    #[tokio::test]
    async fn health_reports_server_state() {
        let (app, _dir) = build_test_app().await;

        let response = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payload = read_json(response).await;
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["queue_size"], 0);
        assert_eq!(payload["active_matches"], 0);
    }
}
