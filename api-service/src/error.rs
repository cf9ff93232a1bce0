use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use schema::{PersistenceError, ValidationError};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{1}")]
    Server(StatusCode, String),
    // Froms
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Persistence(#[from] PersistenceError),
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                Error::Validation(ValidationError::Body(rejection.body_text()))
            }
            _ => Error::Server(rejection.status(), rejection.body_text()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let msg = self.to_string();
        let status: StatusCode = (&self).into();

        let body = match &self {
            Error::Validation(e) => json!({"ok": false, "error": msg, "fields": e.fields()}),
            Error::Persistence(e) => {
                tracing::error!(error = ?e, "persistence failure");
                json!({"ok": false, "error": msg})
            }
            Error::Server(..) => json!({"ok": false, "error": msg}),
        };

        (status, Json(body)).into_response()
    }
}

impl From<&Error> for StatusCode {
    fn from(error: &Error) -> Self {
        match error {
            Error::Server(c, _) => *c,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
