use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use postdeck::config::Config;
use postdeck::db;
use postdeck::routes::build_router;
use postdeck::state::AppState;
use postdeck::store::Stores;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

// ── Test app builder ───────────────────────────────────────────

fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = Some(temp_dir.path().join("test.db"));
    config.storage.path = Some(temp_dir.path().join("uploads"));
    config.auth.jwt_secret = "test-secret-for-integration-tests".into();
    config.auth.bcrypt_cost = 4;
    config
}

fn build_test_app(temp_dir: &TempDir) -> Router {
    build_app(test_config(temp_dir))
}

fn build_app(config: Config) -> Router {
    let pool = db::create_pool(&config.db_path(), 4).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    build_router(AppState::new(Stores::sqlite(pool), config))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    read(app.clone().oneshot(request).await.unwrap()).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register_and_login(app: &Router, name: &str, email: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn create_post(app: &Router, token: &str, content: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/posts",
        Some(token),
        Some(json!({ "content": content, "platforms": ["twitter"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    body["post"].clone()
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                boundary, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

async fn send_multipart(app: &Router, uri: &str, token: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    read(app.clone().oneshot(request).await.unwrap()).await
}

// ── Auth ───────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_login_returns_token_and_user() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({ "name": "Alice", "email": "a@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "A@X.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["role"], "user");
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    register_and_login(&app, "Alice", "a@x.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({ "name": "Other", "email": "a@x.com", "password": "secret2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn invalid_registration_lists_fields() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({ "name": "", "email": "nope", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    register_and_login(&app, "Alice", "a@x.com").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "a@x.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "nobody@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);

    let (status, _) = send(&app, Method::GET, "/api/v1/posts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/v1/posts", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/posts",
        None,
        Some(json!({ "content": "hello", "platforms": ["twitter"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_can_be_read_and_renamed() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let (status, body) = send(&app, Method::GET, "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/users/me",
        Some(&token),
        Some(json!({ "name": "Alice Liddell" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice Liddell");
    assert_eq!(body["email"], "a@x.com");
}

// ── Posts ──────────────────────────────────────────────────────

#[tokio::test]
async fn alice_scenario_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let post = create_post(&app, &token, "hello").await;
    assert_eq!(post["status"], "draft");
    let id = post["id"].as_str().unwrap().to_string();

    let in_an_hour = (Utc::now() + Duration::hours(1)).to_rfc3339();
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/posts/{}", id),
        Some(&token),
        Some(json!({ "status": "scheduled", "scheduled_for": in_an_hour })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "schedule failed: {}", body);
    assert_eq!(body["status"], "scheduled");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/posts/{}/publish", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "published");
    assert!(body["published_at"].is_string());

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/posts/{}", id),
        Some(&token),
        Some(json!({ "status": "draft" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("published"));
}

#[tokio::test]
async fn scheduling_in_the_past_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;
    let post = create_post(&app, &token, "hello").await;
    let id = post["id"].as_str().unwrap();

    let an_hour_ago = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/posts/{}/schedule", id),
        Some(&token),
        Some(json!({ "scheduled_for": an_hour_ago })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/posts/{}", id), Some(&token), None).await;
    assert_eq!(body["status"], "draft");
}

#[tokio::test]
async fn missing_content_or_platforms_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(&token),
        Some(json!({ "title": "only a title" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(&token),
        Some(json!({ "content": "hello", "platforms": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = read(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "body");
}

#[tokio::test]
async fn listing_is_scoped_to_the_caller() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let alice = register_and_login(&app, "Alice", "a@x.com").await;
    let bob = register_and_login(&app, "Bob", "b@x.com").await;

    create_post(&app, &alice, "first").await;
    create_post(&app, &alice, "second").await;
    let bobs = create_post(&app, &bob, "bob's").await;

    let (status, body) = send(&app, Method::GET, "/api/v1/posts", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["content"], "second");
    assert_eq!(posts[1]["content"], "first");
    assert!(posts.iter().all(|p| p["id"] != bobs["id"]));

    // Someone else's post is indistinguishable from a missing one
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/posts/{}", bobs["id"].as_str().unwrap()),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn created_post_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(&token),
        Some(json!({
            "title": "Launch",
            "content": "We are live",
            "platforms": ["twitter", "linkedin"],
            "links": ["https://example.com/launch"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = &created["post"];
    assert!(!created["id"].as_str().unwrap().is_empty());
    assert!(created["created_at"].is_string());

    let (status, fetched) = send(
        &app,
        Method::GET,
        &format!("/api/v1/posts/{}", created["id"].as_str().unwrap()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&fetched, created);
    assert_eq!(fetched["platforms"], json!(["twitter", "linkedin"]));
    assert_eq!(fetched["links"], json!(["https://example.com/launch"]));
}

#[tokio::test]
async fn deleting_twice_reports_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;
    let post = create_post(&app, &token, "bye").await;
    let uri = format!("/api/v1/posts/{}", post["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/api/v1/posts/does-not-exist", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Media ──────────────────────────────────────────────────────

#[tokio::test]
async fn multipart_post_saves_and_attaches_files() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let body = multipart_body(
        "XBOUNDARY",
        &[
            ("content", "look at this"),
            ("platforms", "twitter"),
            ("platforms", "instagram"),
        ],
        Some(("cat.png", "image/png", b"fake png bytes")),
    );
    let (status, body) = send_multipart(&app, "/api/v1/posts", &token, body).await;
    assert_eq!(status, StatusCode::CREATED, "multipart create failed: {}", body);
    let post = &body["post"];
    assert_eq!(post["platforms"], json!(["twitter", "instagram"]));
    assert_eq!(post["media_ids"].as_array().unwrap().len(), 1);

    let (_, listed) = send(&app, Method::GET, "/api/v1/media", Some(&token), None).await;
    let media = &listed["media"][0];
    assert_eq!(media["post_id"], post["id"]);
    assert_eq!(media["kind"], "image");
    assert_eq!(media["file_name"], "cat.png");

    // The stored file is served back under its public URL
    let request = Request::builder()
        .uri(media["url"].as_str().unwrap())
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"fake png bytes");

    // Attached media cannot be deleted
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/media/{}", media["id"].as_str().unwrap()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uploaded_media_can_be_attached_by_id_once() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let alice = register_and_login(&app, "Alice", "a@x.com").await;
    let bob = register_and_login(&app, "Bob", "b@x.com").await;

    let body = multipart_body("XBOUNDARY", &[], Some(("clip.mp4", "video/mp4", b"\x00\x01")));
    let (status, media) = send_multipart(&app, "/api/v1/media/upload", &alice, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(media["kind"], "video");
    let media_id = media["id"].as_str().unwrap();

    // Bob cannot use Alice's media
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(&bob),
        Some(json!({ "content": "stolen", "platforms": ["twitter"], "media_ids": [media_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(&alice),
        Some(json!({ "content": "mine", "platforms": ["twitter"], "media_ids": [media_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(&alice),
        Some(json!({ "content": "again", "platforms": ["twitter"], "media_ids": [media_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unattached_media_can_be_deleted() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let body = multipart_body("XBOUNDARY", &[], Some(("a.jpg", "image/jpeg", b"jpeg")));
    let (_, media) = send_multipart(&app, "/api/v1/media/upload", &token, body).await;
    let uri = format!("/api/v1/media/{}", media["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = send(&app, Method::GET, "/api/v1/media", Some(&token), None).await;
    assert!(listed["media"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_post_frees_its_media() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let body = multipart_body("XBOUNDARY", &[], Some(("a.png", "image/png", b"png")));
    let (_, media) = send_multipart(&app, "/api/v1/media/upload", &token, body).await;
    let media_id = media["id"].as_str().unwrap();
    let media_uri = format!("/api/v1/media/{}", media_id);

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some(&token),
        Some(json!({ "content": "with pic", "platforms": ["twitter"], "media_ids": [media_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_uri = format!("/api/v1/posts/{}", created["post"]["id"].as_str().unwrap());

    // Still attached while the post lives
    let (status, _) = send(&app, Method::DELETE, &media_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::DELETE, &post_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::DELETE, &media_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "media delete failed: {}", body);
    assert_eq!(
        std::fs::read_dir(temp_dir.path().join("uploads")).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let body = multipart_body("XBOUNDARY", &[("note", "no file here")], None);
    let (status, body) = send_multipart(&app, "/api/v1/media/upload", &token, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "file");
}

// ── Social accounts & analytics ────────────────────────────────

#[tokio::test]
async fn social_accounts_connect_list_and_revoke() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;

    let (status, account) = send(
        &app,
        Method::POST,
        "/api/v1/social/accounts/Twitter/connect",
        Some(&token),
        Some(json!({ "account_name": "@alice", "access_token": "tok-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(account["platform"], "twitter");
    assert_eq!(account["status"], "active");
    assert!(account.get("access_token").is_none());

    // Reconnecting the same platform refreshes the existing account
    let (status, again) = send(
        &app,
        Method::POST,
        "/api/v1/social/accounts/twitter/connect",
        Some(&token),
        Some(json!({ "account_name": "@alice2", "access_token": "tok-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], account["id"]);
    assert_eq!(again["account_name"], "@alice2");

    let (_, listed) = send(&app, Method::GET, "/api/v1/social/accounts", Some(&token), None).await;
    assert_eq!(listed["accounts"].as_array().unwrap().len(), 1);

    let (status, revoked) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/social/accounts/{}", account["id"].as_str().unwrap()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revoked["account"]["status"], "revoked");
}

#[tokio::test]
async fn analytics_are_recorded_per_post() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let alice = register_and_login(&app, "Alice", "a@x.com").await;
    let bob = register_and_login(&app, "Bob", "b@x.com").await;
    let post = create_post(&app, &alice, "measured").await;
    let uri = format!("/api/v1/posts/{}/analytics", post["id"].as_str().unwrap());

    let (status, row) = send(
        &app,
        Method::POST,
        &uri,
        Some(&alice),
        Some(json!({ "platform": "twitter", "likes": 10, "comments": 5, "shares": 5, "reach": 200 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!((row["engagement"].as_f64().unwrap() - 0.1).abs() < 1e-9);

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&alice),
        Some(json!({ "platform": "twitter", "likes": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["analytics"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analytics_accept_counters_at_their_upper_bound() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_test_app(&temp_dir);
    let token = register_and_login(&app, "Alice", "a@x.com").await;
    let post = create_post(&app, &token, "viral").await;
    let uri = format!("/api/v1/posts/{}/analytics", post["id"].as_str().unwrap());

    let (status, row) = send(
        &app,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({
            "platform": "twitter",
            "likes": i64::MAX,
            "comments": i64::MAX,
            "shares": i64::MAX,
            "reach": 10
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "record failed: {}", row);
    let engagement = row["engagement"].as_f64().unwrap();
    assert!(engagement.is_finite() && engagement > 0.0);
    assert_eq!(row["likes"], i64::MAX);
}

// ── Admin ──────────────────────────────────────────────────────

fn admin_config(temp_dir: &TempDir) -> Config {
    let mut config = test_config(temp_dir);
    config.auth.admin_emails = vec!["root@x.com".into()];
    config
}

#[tokio::test]
async fn admin_routes_are_limited_to_admins() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_app(admin_config(&temp_dir));
    let alice = register_and_login(&app, "Alice", "a@x.com").await;
    let root = register_and_login(&app, "Root", "root@x.com").await;

    let (status, _) = send(&app, Method::GET, "/api/v1/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/api/v1/admin/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, body) = send(&app, Method::GET, "/api/v1/admin/users", Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["email"], "root@x.com");
    assert_eq!(users[0]["role"], "admin");
    assert_eq!(users[1]["role"], "user");
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn admin_can_manage_other_users_posts() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_app(admin_config(&temp_dir));
    let alice = register_and_login(&app, "Alice", "a@x.com").await;
    let root = register_and_login(&app, "Root", "root@x.com").await;
    let post = create_post(&app, &alice, "moderated").await;
    let uri = format!("/api/v1/posts/{}", post["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::GET, &uri, Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "moderated");

    // Listing stays scoped to the caller's own posts
    let (_, listed) = send(&app, Method::GET, "/api/v1/posts", Some(&root), None).await;
    assert!(listed["posts"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listed_admin_is_promoted_at_login() {
    let temp_dir = TempDir::new().unwrap();
    let plain = build_test_app(&temp_dir);
    register_and_login(&plain, "Root", "root@x.com").await;

    let app = build_app(admin_config(&temp_dir));
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "root@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");

    let token = body["token"].as_str().unwrap();
    let (status, _) = send(&app, Method::GET, "/api/v1/admin/users", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
}
