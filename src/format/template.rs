//! Custom notification templates rendered with minijinja.

use chrono::{DateTime, Utc};
use minijinja::{Environment, Error as RenderError, ErrorKind};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::webhook::Alert;

use super::RFC1123;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to render template: {0}")]
    Render(#[from] RenderError),
}

/// Renders operator-supplied templates against one alert.
///
/// Besides the builtin minijinja filters the environment exposes
/// `uppercase` and `format_timestamp` (RFC 3339 in, RFC 1123 out).
pub struct TemplateService {
    env: Environment<'static>,
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateService {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_filter("uppercase", uppercase);
        env.add_filter("format_timestamp", format_timestamp);
        Self { env }
    }

    /// # Errors
    ///
    /// Returns [`TemplateError::Render`] when the template does not parse or
    /// a filter fails while rendering.
    pub fn render(&self, template: &str, context: &Value) -> Result<String, TemplateError> {
        debug!(template, "rendering custom alert template");
        Ok(self.env.render_str(template, context)?)
    }
}

/// Template variables for one alert. Keys use the Alertmanager spelling so
/// existing templates keep working.
pub fn alert_context(alert: &Alert, receiver: &str, external_url: &str) -> Value {
    json!({
        "status": alert.status.as_str(),
        "fingerprint": alert.fingerprint.as_str(),
        "labels": alert.labels,
        "annotations": alert.annotations,
        "startsAt": alert.starts_at.to_rfc3339(),
        "endsAt": alert.ends_at.map(|ends| ends.to_rfc3339()),
        "generatorURL": alert.generator_url,
        "receiver": receiver,
        "externalURL": external_url,
    })
}

fn uppercase(value: String) -> String {
    value.to_uppercase()
}

fn format_timestamp(value: String) -> Result<String, RenderError> {
    let parsed = DateTime::parse_from_rfc3339(&value).map_err(|err| {
        RenderError::new(
            ErrorKind::InvalidOperation,
            format!("format_timestamp expects an RFC 3339 timestamp, got {value:?}: {err}"),
        )
    })?;
    Ok(parsed.with_timezone(&Utc).format(RFC1123).to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{TemplateError, TemplateService};

    #[test]
    fn renders_with_custom_filters() {
        let service = TemplateService::new();
        let context = json!({
            "labels": {"alertname": "DiskFull"},
            "startsAt": "2024-03-01T10:00:00+00:00",
        });
        let out = service
            .render(
                "{{ labels.alertname | uppercase }} since {{ startsAt | format_timestamp }}",
                &context,
            )
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(out, "DISKFULL since Fri, 01 Mar 2024 10:00:00 UTC");
    }

    #[test]
    fn syntax_and_filter_errors_are_reported() {
        let service = TemplateService::new();
        let context = json!({"startsAt": "yesterday"});
        assert!(matches!(
            service.render("{{ labels.alertname }", &context),
            Err(TemplateError::Render(_))
        ));
        assert!(service
            .render("{{ startsAt | format_timestamp }}", &context)
            .is_err());
    }

    #[test]
    fn missing_keys_render_empty() {
        let service = TemplateService::new();
        let out = service
            .render("[{{ annotations.summary }}]", &json!({"annotations": {}}))
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(out, "[]");
    }
}
