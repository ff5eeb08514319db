//! HTTP surface: the command terminal, schema get/set and the schema
//! parse/highlight helpers.
use crate::errors::ConsoleError;
use crate::schema;
use crate::settings::Settings;
use crate::spicedb::SpiceDbClient;
use crate::terminal::dispatch::Dispatcher;
use crate::terminal::result::ExecutionResult;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use miette::IntoDiagnostic;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub client: SpiceDbClient,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConsoleError> {
        Ok(Self {
            dispatcher: crate::terminal::dispatcher_from_settings(settings)?,
            client: SpiceDbClient::new(&settings.spicedb)?,
        })
    }
}

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    // Highlighted markup is a fragment with no scripts of its own
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; style-src 'self' 'unsafe-inline'; frame-ancestors 'none'"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-store"),
    );

    response
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/terminal",
            post(run_command).fallback(terminal_method_not_allowed),
        )
        .route("/api/schema", get(read_schema).post(write_schema))
        .route("/api/schema/namespaces", get(schema_namespaces))
        .route("/api/schema/parse", post(parse_schema))
        .route("/api/schema/highlight", post(highlight_schema))
        .route("/healthz", get(health))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(settings: Settings) -> miette::Result<()> {
    let state = AppState::from_settings(&settings)?;
    let router = router(state);

    let addr: SocketAddr = settings
        .listen_addr()
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    tracing::info!(%addr, spicedb = %settings.spicedb.endpoint, "Console API listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct TerminalRequest {
    #[serde(default)]
    command: Option<String>,
}

async fn run_command(
    State(state): State<AppState>,
    payload: Result<Json<TerminalRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>, ConsoleError> {
    let Json(req) = payload.map_err(|e| ConsoleError::BadRequest(e.body_text()))?;
    let line = req.command.unwrap_or_default();
    let result = state.dispatcher.run(&line).await?;
    Ok(Json(result))
}

async fn terminal_method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({ "ok": false, "error": "Method not allowed" })),
    )
        .into_response()
}

async fn read_schema(State(state): State<AppState>) -> Result<String, ConsoleError> {
    Ok(state.client.read_schema().await?)
}

async fn write_schema(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<serde_json::Value>, ConsoleError> {
    if body.trim().is_empty() {
        return Err(ConsoleError::BadRequest("schema text is empty".to_string()));
    }
    let written_at = state.client.write_schema(&body).await?;
    tracing::info!(bytes = body.len(), "schema written");
    Ok(Json(json!({ "ok": true, "writtenAt": written_at })))
}

async fn schema_namespaces(
    State(state): State<AppState>,
) -> Result<Json<Vec<schema::NamespaceInfo>>, ConsoleError> {
    let text = state.client.read_schema().await?;
    Ok(Json(schema::parse_schema(&text)))
}

async fn parse_schema(body: String) -> Json<Vec<schema::NamespaceInfo>> {
    Json(schema::parse_schema(&body))
}

async fn highlight_schema(body: String) -> Html<String> {
    Html(schema::highlight(&body))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
