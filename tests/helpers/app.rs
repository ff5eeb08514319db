use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use zedconsole::settings::Settings;
use zedconsole::web::{self, AppState};

/// Router wired to a mock SpiceDB gateway
pub struct TestApp {
    router: Router,
    pub spicedb: MockServer,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("response body is not JSON")
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(|_| {}).await
    }

    /// Start a mock backend, point default settings at it, then let the
    /// caller adjust them before the router is built.
    pub async fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
        let spicedb = MockServer::start().await;
        let mut settings = Settings::default();
        settings.spicedb.endpoint = spicedb.uri();
        settings.spicedb.token = Some("testtoken".to_string());
        configure(&mut settings);

        let state = AppState::from_settings(&settings).expect("Failed to build app state");
        Self {
            router: web::router(state),
            spicedb,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::GET)
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> TestResponse {
        self.post_raw(path, "application/json", body.to_string()).await
    }

    pub async fn post_text(&self, path: &str, body: &str) -> TestResponse {
        self.post_raw(path, "text/plain", body.to_string()).await
    }

    pub async fn post_raw(&self, path: &str, content_type: &str, body: String) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(path)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Run one command line through `/api/terminal`.
    pub async fn command(&self, line: &str) -> TestResponse {
        self.post_json("/api/terminal", &serde_json::json!({ "command": line }))
            .await
    }
}
