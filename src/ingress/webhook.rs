use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::engine::WebhookSummary;
use crate::webhook::WebhookMessage;

use super::{ApiError, ApiState};

#[derive(Debug, Deserialize)]
pub(super) struct TokenQuery {
    #[serde(default)]
    token: Option<String>,
}

pub(super) async fn receive(
    State(state): State<ApiState>,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Result<Json<WebhookSummary>, ApiError> {
    let settings = state.config.load();
    let token = query.token.unwrap_or_default();
    let Some(config) = settings.config_by_token(&token) else {
        warn!("webhook rejected: missing or unknown token");
        return Err(ApiError::Unauthorized);
    };

    let message = WebhookMessage::from_slice(&body).map_err(|err| {
        warn!(config_id = %config.id, error = %err, "webhook rejected: malformed body");
        ApiError::Webhook(err)
    })?;
    debug!(
        config_id = %config.id,
        alerts = message.alerts.len(),
        rejected = message.rejected,
        "webhook accepted"
    );

    let summary = state.engine.handle_webhook(&settings, config, &message).await;
    Ok(Json(summary))
}
