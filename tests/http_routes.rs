/// End-to-end tests driving the axum router: sessions, login and status codes
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use roster::config::Config;
use roster::game::{GameStore, PlayerCharacter};
use roster::web::{build_router, AppState, SESSION_COOKIE};

mod common;

fn app(dir: &TempDir) -> (Router, Arc<GameStore>) {
    let store = Arc::new(common::open_store(dir));
    store
        .accounts()
        .register_user("alice", "correct horse")
        .expect("alice");
    let state = AppState {
        store: store.clone(),
        config: Arc::new(Config::default()),
    };
    (build_router(state), store)
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(SESSION_COOKIE))
        .and_then(|v| v.split(';').next())
        .map(|pair| pair.to_string())
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).expect("request"))
        .await
        .expect("response")
}

async fn post(app: &Router, uri: &str, cookie: Option<&str>, form: &str) -> Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::from(form.to_string())).expect("request"))
        .await
        .expect("response")
}

/// Log alice in and return her session cookie.
async fn login(app: &Router) -> String {
    let response = post(
        app,
        "/login",
        None,
        "username=alice&password=correct+horse",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    session_cookie(&response).expect("session cookie")
}

#[tokio::test]
async fn test_anonymous_request_redirects_to_login_with_next() {
    let dir = TempDir::new().expect("tempdir");
    let (app, _) = app(&dir);

    let response = get(&app, "/characters", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Fcharacters");
    assert!(session_cookie(&response).is_none(), "nothing to remember yet");
}

#[tokio::test]
async fn test_login_sets_hardened_cookie() {
    let dir = TempDir::new().expect("tempdir");
    let (app, _) = app(&dir);

    let response = post(&app, "/login", None, "username=alice&password=correct+horse").await;
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie")
        .to_string();
    assert!(set_cookie.starts_with("roster_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
}

#[tokio::test]
async fn test_cookieless_requests_do_not_pile_up_sessions() {
    let dir = TempDir::new().expect("tempdir");
    let (app, store) = app(&dir);

    for _ in 0..50 {
        let response = get(&app, "/characters", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
    let _ = get(&app, "/login", None).await;
    assert_eq!(store.accounts().count_sessions(), 0);

    let cookie = login(&app).await;
    assert_eq!(store.accounts().count_sessions(), 1);
    let _ = post(&app, "/logout", Some(&cookie), "").await;
    assert_eq!(store.accounts().count_sessions(), 0);
}

#[tokio::test]
async fn test_login_rotates_session_and_follows_next() {
    let dir = TempDir::new().expect("tempdir");
    let (app, _) = app(&dir);
    let before = login(&app).await;

    let response = post(
        &app,
        "/login",
        Some(&before),
        "username=alice&password=correct+horse&next=%2Finventory",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/inventory");
    let after = session_cookie(&response).expect("cookie");
    assert_ne!(before, after);

    let roster = get(&app, "/characters", Some(&after)).await;
    assert_eq!(roster.status(), StatusCode::OK);
    assert!(body_text(roster).await.contains("Your characters"));

    // The pre-login session no longer authenticates anyone.
    let stale = get(&app, "/characters", Some(&before)).await;
    assert_eq!(stale.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let dir = TempDir::new().expect("tempdir");
    let (app, _) = app(&dir);

    for next in [
        "%2F%09%2Fevil.example",
        "%2F%0A%2Fevil.example",
        "%2F%2Fevil.example",
        "%2F%5Cevil.example",
        "https%3A%2F%2Fevil.example",
    ] {
        let response = post(
            &app,
            "/login",
            None,
            &format!("username=alice&password=correct+horse&next={}", next),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/characters", "next={}", next);
    }
}

#[tokio::test]
async fn test_bad_credentials_rerender_login_with_error() {
    let dir = TempDir::new().expect("tempdir");
    let (app, _) = app(&dir);

    let response = post(&app, "/login", None, "username=alice&password=wrong+password").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Invalid username or password."));
    assert!(body.contains("alert-danger"));
}

#[tokio::test]
async fn test_error_statuses_for_missing_and_foreign_characters() {
    let dir = TempDir::new().expect("tempdir");
    let (app, store) = app(&dir);
    let cookie = login(&app).await;
    let theirs = store.put(PlayerCharacter::new("Zed", "bob")).expect("bob's");

    let response = get(&app, "/characters/999", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = get(&app, "/characters/not-a-number", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, &format!("/characters/{}", theirs.id), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post(
        &app,
        &format!("/characters/{}/select", theirs.id),
        Some(&cookie),
        "",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_flash_survives_redirect_once() {
    let dir = TempDir::new().expect("tempdir");
    let (app, _) = app(&dir);
    let cookie = login(&app).await;

    let response = post(&app, "/settings", Some(&cookie), "notes=hi&compact_inventory=on").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/settings");

    let page = body_text(get(&app, "/settings", Some(&cookie)).await).await;
    assert!(page.contains("Changes saved!"));
    assert!(page.contains("alert-success"));

    let again = body_text(get(&app, "/settings", Some(&cookie)).await).await;
    assert!(!again.contains("Changes saved!"));
}

#[tokio::test]
async fn test_create_then_select_through_http() {
    let dir = TempDir::new().expect("tempdir");
    let (app, store) = app(&dir);
    let cookie = login(&app).await;
    let human = common::human(&store);

    let response = post(
        &app,
        "/characters/new",
        Some(&cookie),
        &format!("name=Brak&species={}&gender=", human.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/characters");

    let brak = store.characters_for_user("alice").expect("list").remove(0);
    let response = post(
        &app,
        &format!("/characters/{}/select", brak.id),
        Some(&cookie),
        "",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let inventory = get(&app, "/inventory", Some(&cookie)).await;
    assert_eq!(inventory.status(), StatusCode::OK);
    assert!(body_text(inventory).await.contains("Brak"));
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let dir = TempDir::new().expect("tempdir");
    let (app, _) = app(&dir);
    let cookie = login(&app).await;

    let response = post(&app, "/logout", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = get(&app, "/characters", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/login"));
}
