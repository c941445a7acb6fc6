//! Alertmanager webhook payload.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::Result;
use crate::error::Error;
use crate::types::{AlertStatus, Fingerprint};

#[derive(Clone, Debug)]
pub struct WebhookMessage {
    pub receiver: String,
    pub external_url: String,
    pub alerts: Vec<Alert>,
    /// Alerts of the delivery that could not be decoded and were skipped.
    pub rejected: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Alert {
    pub status: AlertStatus,
    pub fingerprint: Fingerprint,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub generator_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(default)]
    receiver: String,
    #[serde(default, rename = "externalURL")]
    external_url: String,
    #[serde(default)]
    alerts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAlert {
    status: AlertStatus,
    fingerprint: String,
    #[serde(default)]
    labels: BTreeMap<String, Value>,
    #[serde(default)]
    annotations: BTreeMap<String, Value>,
    starts_at: DateTime<Utc>,
    #[serde(default)]
    ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    generator_url: String,
}

impl WebhookMessage {
    /// Decode a webhook body. Alerts are decoded one by one; a malformed
    /// alert is logged and skipped so its siblings are still delivered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for a malformed envelope and for a message
    /// without a single usable alert.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let raw: RawMessage =
            serde_json::from_slice(body).map_err(|err| Error::Decode(err.to_string()))?;
        if raw.alerts.is_empty() {
            return Err(Error::Decode("webhook message carries no alerts".into()));
        }

        let total = raw.alerts.len();
        let mut alerts = Vec::with_capacity(total);
        let mut last_error = None;
        for (index, value) in raw.alerts.into_iter().enumerate() {
            match decode_alert(value) {
                Ok(alert) => alerts.push(alert),
                Err(err) => {
                    warn!(index, error = %err, "skipping malformed alert");
                    last_error = Some(err);
                }
            }
        }
        if alerts.is_empty() {
            return Err(last_error
                .unwrap_or_else(|| Error::Decode("webhook message carries no alerts".into())));
        }

        Ok(Self {
            receiver: raw.receiver,
            external_url: raw.external_url,
            rejected: total - alerts.len(),
            alerts,
        })
    }
}

fn decode_alert(value: Value) -> Result<Alert> {
    let raw: RawAlert =
        serde_json::from_value(value).map_err(|err| Error::Decode(err.to_string()))?;
    Alert::try_from(raw)
}

impl TryFrom<RawAlert> for Alert {
    type Error = Error;

    fn try_from(value: RawAlert) -> std::result::Result<Self, Error> {
        if value.fingerprint.trim().is_empty() {
            return Err(Error::Decode("alert without fingerprint".into()));
        }
        // Alertmanager reports "0001-01-01T00:00:00Z" for alerts that have
        // not ended yet.
        let ends_at = value.ends_at.filter(|ends| ends.timestamp() > 0);
        Ok(Self {
            status: value.status,
            fingerprint: Fingerprint::new(value.fingerprint),
            labels: string_values(value.labels),
            annotations: string_values(value.annotations),
            starts_at: value.starts_at,
            ends_at,
            generator_url: value.generator_url,
        })
    }
}

impl Alert {
    pub fn severity(&self) -> &str {
        self.labels.get("severity").map_or("", String::as_str)
    }
}

fn string_values(map: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            other => {
                debug!(key = %key, value = %other, "dropping non-string label value");
                None
            }
        })
        .collect()
}
