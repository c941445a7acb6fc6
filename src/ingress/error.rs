use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::Error;

/// An error rendered for an HTTP caller.
///
/// Webhook callers get `{"error": ...}`. Action callers are chat users, so
/// their rejections are sent as `ephemeral_text`, which the platform shows
/// to the clicking user only.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Webhook(Error),
    Action(Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Webhook(err) | Self::Action(err) => status_for(err),
        }
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        err if err.is_client_error() => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        err if err.is_external() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn action_text(err: &Error) -> String {
    match err {
        Error::Decode(_) | Error::InvalidPayload(_) => "We could not decode the action".to_string(),
        Error::NotFound { what: "alert", .. } => {
            "This alert is no longer active, nothing to update".to_string()
        }
        Error::NoMatchers => "This alert has no labels to build a silence from".to_string(),
        Error::Alertmanager(inner) => format!("Alertmanager request failed: {inner}"),
        Error::Messaging(inner) => format!("Chat platform request failed: {inner}"),
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Unauthorized => json!({ "error": "missing or unknown token" }),
            Self::Webhook(err) => json!({ "error": err.to_string() }),
            Self::Action(err) => json!({ "ephemeral_text": action_text(err) }),
        };
        (status, Json(body)).into_response()
    }
}
