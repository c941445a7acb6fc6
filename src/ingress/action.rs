use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde_json::{Value, json};
use tracing::warn;

use crate::action::ActionCommand;

use super::{ApiError, ApiState};

pub(super) async fn receive(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let command = ActionCommand::decode(&body).map_err(|err| {
        warn!(error = %err, "action rejected");
        ApiError::Action(err)
    })?;
    let fingerprint = command.fingerprint.clone();
    let settings = state.config.load();

    let outcome = state
        .engine
        .handle_action(&settings, command)
        .await
        .map_err(|err| {
            warn!(fingerprint = %fingerprint, error = %err, "action failed");
            ApiError::Action(err)
        })?;

    let response = match outcome.message {
        Some(message) => json!({
            "update": {
                "message": message.text,
                "props": message.props(),
            },
            "ephemeral_text": outcome.notice,
        }),
        None => json!({ "ephemeral_text": outcome.notice }),
    };
    Ok(Json(response))
}
