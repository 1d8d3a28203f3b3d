use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;
use zeroize::Zeroizing;

use deskgate::{AppState, Config};

fn test_config() -> Config {
    Config {
        portal_password: Some(Zeroizing::new("hunter2".to_string())),
        session_secret: None,
        session_ttl_hours: 24.0,
        oauth_client_id: None,
        oauth_client_secret: None,
        oauth_refresh_token: None,
        accounts_base_url: "http://127.0.0.1:9".to_string(),
        desk_base_url: "http://127.0.0.1:9".to_string(),
        desk_org_id: None,
        portal_origin: "https://portal.example.com".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

fn router_with(config: Config) -> Router {
    let state = AppState::new(&config).expect("state builds");
    deskgate::router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or_else(|_| panic!("non-JSON body"))
}

fn login_request(payload: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/session")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn login_cookie(router: &Router, password: &str) -> String {
    let response = router
        .clone()
        .oneshot(login_request(&format!(r#"{{"password":"{}"}}"#, password)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a cookie")
        .to_str()
        .unwrap();
    let value = set_cookie
        .split(';')
        .next()
        .unwrap()
        .trim_start_matches("authToken=")
        .to_string();
    assert!(!value.is_empty());
    value
}

/// Collects everything the tracing stack writes so a test can inspect it.
#[derive(Clone, Default)]
struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn login_with_correct_password_sets_a_hardened_cookie() {
    let router = router_with(test_config());
    let response = router
        .oneshot(login_request(r#"{"password":"hunter2"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("authToken="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=86400"));

    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn cookie_max_age_follows_fractional_ttl() {
    let mut config = test_config();
    config.session_ttl_hours = 0.5;
    let router = router_with(config);

    let response = router
        .oneshot(login_request(r#"{"password":"hunter2"}"#))
        .await
        .unwrap();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("Max-Age=1800"));
}

#[tokio::test]
async fn wrong_and_empty_passwords_get_the_same_uninformative_401() {
    let router = router_with(test_config());

    for payload in [r#"{"password":"wrong"}"#, r#"{"password":""}"#] {
        let response = router.clone().oneshot(login_request(payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Authentication required");
    }
}

#[tokio::test]
async fn unparsable_or_incomplete_bodies_are_a_400() {
    let router = router_with(test_config());

    let response = router
        .clone()
        .oneshot(login_request("not json at all"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("JSON"));

    let response = router
        .clone()
        .oneshot(login_request(r#"{"user":"x"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn other_methods_on_the_session_route_are_405() {
    let router = router_with(test_config());
    let response = router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn session_status_round_trips_a_fresh_login() {
    let router = router_with(test_config());
    let token = login_cookie(&router, "hunter2").await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .header(header::COOKIE, format!("authToken={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn session_status_rejects_missing_garbage_and_tampered_cookies() {
    let router = router_with(test_config());
    let token = login_cookie(&router, "hunter2").await;

    // Flip the last signature character.
    let mut tampered = token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == '0' { '1' } else { '0' });

    let cases = [
        None,
        Some("authToken=garbage".to_string()),
        Some("authToken=123.abc".to_string()),
        Some(format!("authToken={}", tampered)),
    ];

    for cookie in cases {
        let mut builder = Request::builder().uri("/api/session");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let response = router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Authentication required");
    }
}

#[tokio::test]
async fn a_different_signing_secret_invalidates_old_sessions() {
    let mut config = test_config();
    config.session_secret = Some(Zeroizing::new("secret-v1".to_string()));
    let router_v1 = router_with(config);
    let token = login_cookie(&router_v1, "hunter2").await;

    let mut rotated = test_config();
    rotated.session_secret = Some(Zeroizing::new("secret-v2".to_string()));
    let router_v2 = router_with(rotated);

    let response = router_v2
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .header(header::COOKIE, format!("authToken={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_portal_password_is_a_generic_500_on_both_operations() {
    let mut config = test_config();
    config.portal_password = None;
    let router = router_with(config);

    let response = router
        .clone()
        .oneshot(login_request(r#"{"password":"anything"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Server configuration error");

    // Verification is equally impossible without a signing secret.
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .header(header::COOKIE, "authToken=123.abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Server configuration error");
}

#[tokio::test]
async fn health_answers_without_any_configuration() {
    let mut config = test_config();
    config.portal_password = None;
    let router = router_with(config);

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn debug_logs_never_contain_the_session_token() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_writer(capture.clone())
        .with_ansi(false)
        .finish();
    // Thread-local so parallel tests stay unaffected; the single-threaded
    // test runtime keeps every poll on this thread.
    let _guard = tracing::subscriber::set_default(subscriber);

    let router = router_with(test_config());
    let token = login_cookie(&router, "hunter2").await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .header(header::COOKIE, format!("authToken={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let logs = capture.contents();
    assert!(!logs.is_empty(), "expected request logs at debug level");
    assert!(!logs.contains(&token), "session token leaked into logs");
    assert!(!logs.contains("authToken"), "session cookie leaked into logs");
    assert!(!logs.contains("hunter2"), "password leaked into logs");
}

#[tokio::test]
async fn session_preflight_allows_the_portal_origin_with_credentials() {
    let router = router_with(test_config());
    let response = router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/session")
                .header(header::ORIGIN, "https://portal.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap()
            .to_str()
            .unwrap(),
        "https://portal.example.com"
    );
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap()
            .to_str()
            .unwrap(),
        "true"
    );
}
