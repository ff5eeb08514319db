use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

use crate::spicedb::SpiceDbError;
use crate::terminal::CommandError;

#[derive(Debug, Error, Diagnostic)]
pub enum ConsoleError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] SpiceDbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Command(#[from] CommandError),

    #[error("Bad request: {0}")]
    #[diagnostic(code(zedconsole::bad_request))]
    BadRequest(String),
}

impl ConsoleError {
    pub fn status(&self) -> StatusCode {
        match self {
            ConsoleError::Command(_) | ConsoleError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ConsoleError::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        let body = json!({ "ok": false, "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
