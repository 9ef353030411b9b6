//! Router tests driven with `tower::ServiceExt::oneshot`

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use annals_core::{AnnalsConfig, Database};
use annals_server::{create_router, AppState};

const BOUNDARY: &str = "annals-test-boundary";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AnnalsConfig::default();
        config.media.upload_dir = dir.path().join("uploads");

        let state = AppState::with_database(Database::in_memory().unwrap(), config);
        state.bootstrap().unwrap();
        let state = Arc::new(state);

        Self {
            router: create_router(Arc::clone(&state)),
            state,
            _dir: dir,
        }
    }

    async fn raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.raw(request).await;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn multipart(&self, uri: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    /// Create a plain event through the JSON endpoint and return its id
    async fn create(&self, title: &str, date: &str) -> i64 {
        let (status, body) = self
            .json(
                Method::POST,
                "/events",
                json!({"title": title, "content": "<p>intro</p>", "date": date, "created_by": 1}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["event"]["id"].as_i64().unwrap()
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

// === Users ===

#[tokio::test]
async fn test_login() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            Method::POST,
            "/login",
            json!({"username": "admin", "password": "admin123"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["username"], "admin");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .json(
            Method::POST,
            "/login",
            json!({"username": "admin", "password": "nope"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "unauthorized");
}

#[tokio::test]
async fn test_list_users() {
    let app = TestApp::new();
    let (status, body) = app.get("/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert!(body[0]["last_login"].is_null());
}

// === Events ===

#[tokio::test]
async fn test_create_list_get() {
    let app = TestApp::new();
    let later = app.create("Moro found", "1978-05-09").await;
    let earlier = app.create("Kidnapping", "1978-03-16").await;

    let (status, body) = app.get("/events").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![earlier, later]);
    assert!(body[0].get("content").is_none());

    let (status, body) = app.get(&format!("/events/{}", earlier)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Kidnapping");
    assert_eq!(body["content"], "<p>intro</p>");
    assert_eq!(body["date"], "1978-03-16");
    assert_eq!(body["tags"], json!([]));
    assert_eq!(body["created_by"], "admin");
}

#[tokio::test]
async fn test_create_with_unknown_creator() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/events",
            json!({"title": "x", "content": "", "date": "1978-03-16", "created_by": 42}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["message"], "invalid creator");
}

#[tokio::test]
async fn test_missing_event_is_404() {
    let app = TestApp::new();
    let (status, body) = app.get("/events/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/events/999")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update() {
    let app = TestApp::new();
    let id = app.create("Kidnapping", "1978-03-16").await;
    let uri = format!("/events/{}", id);

    let (status, body) = app
        .json(Method::PUT, &uri, json!({"title": "X", "tags": ["BR"]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["title"], "X");
    assert_eq!(body["event"]["tags"], json!(["BR"]));
    assert_eq!(body["event"]["content"], "<p>intro</p>");

    let (status, body) = app
        .json(Method::PUT, &uri, json!({"title": "Y", "created_by": 2}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = app
        .json(Method::PUT, &uri, json!({"title": "Y", "date": "09/05/1978"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get(&uri).await;
    assert_eq!(body["title"], "X");
    assert_eq!(body["date"], "1978-03-16");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
    assert_eq!(body["success"], false);
}

// === Uploads ===

#[tokio::test]
async fn test_create_with_images_and_serve_upload() {
    let app = TestApp::new();
    let (status, body) = app
        .multipart(
            "/api/events",
            &[
                Part::Text("title", "Via Fani"),
                Part::Text("content", r#"<img src="data:image/png;base64,AAA">"#),
                Part::Text("date", "1978-03-16"),
                Part::Text("created_by", "1"),
                Part::Text("tags", "Moro,BR"),
                Part::Text("is_important", "true"),
                Part::File("images", "photo.png", b"png-bytes"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let event = &body["event"];
    let path = event["images"][0].as_str().unwrap().to_string();
    assert!(path.starts_with("/static/uploads/"));
    assert_eq!(event["content"], format!(r#"<img src="{}">"#, path));
    assert_eq!(event["tags"], json!(["Moro", "BR"]));
    assert_eq!(event["is_important"], true);

    let request = Request::builder().uri(&path).body(Body::empty()).unwrap();
    let (status, bytes) = app.raw(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"png-bytes");

    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/events/{}", event["id"]))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], json!([path]));
    assert!(!app.state.media.root().join(&path["/static/uploads/".len()..]).exists());
}

#[tokio::test]
async fn test_create_with_disallowed_image() {
    let app = TestApp::new();
    let (status, body) = app
        .multipart(
            "/api/events",
            &[
                Part::Text("title", "Via Fani"),
                Part::Text("content", ""),
                Part::Text("date", "1978-03-16"),
                Part::Text("created_by", "1"),
                Part::File("images", "ok.png", b"a"),
                Part::File("images", "evil.svg", b"b"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let leftover = std::fs::read_dir(app.state.media.root())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
    assert_eq!(app.get("/events").await.1, json!([]));
}

#[tokio::test]
async fn test_upload_image() {
    let app = TestApp::new();

    let (status, body) = app
        .multipart("/upload-image", &[Part::File("image", "scan.JPG", b"jpg")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["imageUrl"].as_str().unwrap().ends_with("_scan.JPG"));

    let (status, _) = app
        .multipart("/upload-image", &[Part::File("image", "notes.txt", b"txt")])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .multipart("/upload-image", &[Part::Text("other", "x")])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing field: image");
}
