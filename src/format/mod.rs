//! Turns one alert into the chat message that represents it.
//!
//! Formatting never fails: a broken custom template is logged and the
//! default two-field layout is used instead.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;
use url::Url;

use crate::action::ActionContext;
use crate::color::resolve_color;
use crate::config::AlertConfig;
use crate::message::{ActionButton, Attachment, Field, RenderedMessage};
use crate::types::LifecycleState;
use crate::webhook::Alert;

mod template;

pub use template::{TemplateError, TemplateService, alert_context};

pub(crate) const RFC1123: &str = "%a, %d %b %Y %H:%M:%S UTC";

pub const TITLE_FIRING: &str = ":fire: FIRING :fire:";
pub const TITLE_ACKNOWLEDGED: &str = "👁️ ACKNOWLEDGED 👁️";
pub const TITLE_RESOLVED: &str = "✅ RESOLVED ✅";

/// Label injected into the labels field so readers can tell which profile
/// delivered the alert.
pub const CONFIG_ID_LABEL: &str = "AlertManager Config ID";

const SILENCE_DURATIONS: [&str; 2] = ["1h", "4h"];

/// Everything needed to render one alert in one lifecycle state.
pub struct FormatRequest<'a> {
    pub config: &'a AlertConfig,
    pub alert: &'a Alert,
    pub external_url: &'a str,
    pub receiver: &'a str,
    pub state: LifecycleState,
    /// Callback for action buttons; `None` when no site URL is configured.
    pub action_url: Option<&'a Url>,
    pub now: DateTime<Utc>,
}

#[derive(Default)]
pub struct Formatter {
    templates: TemplateService,
}

impl Formatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self, req: &FormatRequest<'_>) -> RenderedMessage {
        let resolved = req.state == LifecycleState::Resolved;
        let color = resolve_color(req.config, req.alert.severity(), req.state);

        let mut text = if resolved {
            String::new()
        } else {
            req.config
                .mention_for(req.alert.severity())
                .unwrap_or_default()
                .to_string()
        };

        let custom = if resolved {
            req.config.resolved_template.as_deref()
        } else {
            req.config.firing_template.as_deref()
        };
        let rendered = custom.and_then(|template| self.render_custom(template, req));

        let mut attachment = Attachment {
            color,
            ..Attachment::default()
        };
        match rendered {
            Some(custom) => {
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                text.push_str(&custom);
            }
            None => attachment.fields = default_fields(req),
        }

        if !resolved {
            attachment.actions = action_buttons(req);
        }

        RenderedMessage { text, attachment }
    }

    fn render_custom(&self, template: &str, req: &FormatRequest<'_>) -> Option<String> {
        let context = alert_context(req.alert, req.receiver, req.external_url);
        match self.templates.render(template, &context) {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(
                    fingerprint = %req.alert.fingerprint,
                    config_id = %req.config.id,
                    error = %err,
                    "custom template failed, using default layout"
                );
                None
            }
        }
    }
}

/// First field title for a lifecycle state.
pub const fn status_title(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::Firing => TITLE_FIRING,
        LifecycleState::Acked => TITLE_ACKNOWLEDGED,
        LifecycleState::Resolved => TITLE_RESOLVED,
    }
}

fn default_fields(req: &FormatRequest<'_>) -> Vec<Field> {
    let alert = req.alert;
    let mut summary = String::new();
    for (key, value) in &alert.annotations {
        let _ = writeln!(summary, "**{}:** {value}", title_case(key));
    }
    summary.push_str(" \n");

    if req.state == LifecycleState::Resolved {
        let ended = alert.ends_at.unwrap_or(req.now);
        let _ = writeln!(summary, "**Started at:** {}", format_time(alert.starts_at));
        let _ = writeln!(summary, "**Ended at:** {}", format_time(ended));
        let _ = writeln!(
            summary,
            "**Duration:** {}",
            short_duration(ended - alert.starts_at)
        );
    } else {
        let _ = writeln!(
            summary,
            "**Started at:** {} ({} ago)",
            format_time(alert.starts_at),
            short_duration(req.now - alert.starts_at)
        );
    }
    summary.push_str(" \n");
    let _ = write!(
        summary,
        "Generated by a [Prometheus Alert]({}) and sent to the [Alertmanager]({}) '{}' receiver.",
        alert.generator_url, req.external_url, req.receiver
    );

    let mut labels = alert.labels.clone();
    labels.insert(CONFIG_ID_LABEL.to_string(), req.config.id.clone());
    let mut label_lines = String::new();
    for (key, value) in &labels {
        let _ = writeln!(label_lines, "**{}:** {value}", title_case(key));
    }

    vec![
        Field::new(status_title(req.state), summary, true),
        Field::new("", label_lines, true),
    ]
}

fn action_buttons(req: &FormatRequest<'_>) -> Vec<ActionButton> {
    if !req.config.enable_actions {
        return Vec::new();
    }
    let Some(callback) = req.action_url else {
        warn!(
            config_id = %req.config.id,
            fingerprint = %req.alert.fingerprint,
            "actions are enabled but no site URL is configured, omitting buttons"
        );
        return Vec::new();
    };

    let fingerprint = &req.alert.fingerprint;
    let mut buttons: Vec<ActionButton> = SILENCE_DURATIONS
        .iter()
        .map(|duration| {
            ActionContext::silence(fingerprint, &req.config.id, duration).encode(callback)
        })
        .collect();
    let ack = if req.state == LifecycleState::Acked {
        ActionContext::unack(fingerprint)
    } else {
        ActionContext::ack(fingerprint)
    };
    buttons.push(ack.encode(callback));
    buttons
}

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format(RFC1123).to_string()
}

/// Human duration limited to its two most significant units, e.g. `2h 5m`.
pub fn short_duration(elapsed: chrono::TimeDelta) -> String {
    let secs = u64::try_from(elapsed.num_seconds()).unwrap_or(0);
    if secs == 0 {
        return "0s".to_string();
    }
    humantime::format_duration(Duration::from_secs(secs))
        .to_string()
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(key: &str) -> String {
    key.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeDelta, TimeZone, Utc};
    use url::Url;

    use super::*;
    use crate::color::{COLOR_CRITICAL, COLOR_RESOLVED};
    use crate::types::{AlertStatus, Fingerprint};

    fn alert(status: AlertStatus) -> Alert {
        Alert {
            status,
            fingerprint: Fingerprint::from("abc123"),
            labels: BTreeMap::from([
                ("alertname".to_string(), "DiskFull".to_string()),
                ("severity".to_string(), "critical".to_string()),
            ]),
            annotations: BTreeMap::from([
                ("summary".to_string(), "disk is full".to_string()),
                ("description".to_string(), "/var at 99%".to_string()),
            ]),
            starts_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            ends_at: None,
            generator_url: "http://prometheus:9090/graph".to_string(),
        }
    }

    fn callback() -> Url {
        Url::parse("https://bridge.example.com/api/action").unwrap()
    }

    fn request<'a>(
        config: &'a AlertConfig,
        alert: &'a Alert,
        state: LifecycleState,
        action_url: Option<&'a Url>,
    ) -> FormatRequest<'a> {
        FormatRequest {
            config,
            alert,
            external_url: "http://alertmanager:9093",
            receiver: "mattermost",
            state,
            action_url,
            now: alert.starts_at + TimeDelta::minutes(90),
        }
    }

    #[test]
    fn default_layout_has_two_sorted_fields() {
        let config = AlertConfig::for_tests("prod", "http://am:9093");
        let alert = alert(AlertStatus::Firing);
        let msg = Formatter::new().format(&request(&config, &alert, LifecycleState::Firing, None));

        assert_eq!(msg.attachment.color, COLOR_CRITICAL);
        assert_eq!(msg.attachment.fields.len(), 2);
        let first = &msg.attachment.fields[0];
        assert_eq!(first.title, TITLE_FIRING);
        let description = first.value.find("**Description:**").unwrap();
        let summary = first.value.find("**Summary:**").unwrap();
        assert!(description < summary);
        assert!(first
            .value
            .contains("**Started at:** Fri, 01 Mar 2024 10:00:00 UTC (1h 30m ago)"));
        assert!(first.value.ends_with(
            "Generated by a [Prometheus Alert](http://prometheus:9090/graph) and sent to the \
             [Alertmanager](http://alertmanager:9093) 'mattermost' receiver."
        ));
        assert_eq!(
            msg.attachment.fields[1].value,
            "**AlertManager Config ID:** prod\n**Alertname:** DiskFull\n**Severity:** critical\n"
        );
    }

    #[test]
    fn buttons_require_actions_and_site_url() {
        let mut config = AlertConfig::for_tests("prod", "http://am:9093");
        config.enable_actions = true;
        let alert = alert(AlertStatus::Firing);
        let url = callback();
        let formatter = Formatter::new();

        let with_url = formatter.format(&request(&config, &alert, LifecycleState::Firing, Some(&url)));
        let names: Vec<_> = with_url.attachment.actions.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["🔕 Silence 1h", "🔕 Silence 4h", "👁️ ACK"]);

        let without_url = formatter.format(&request(&config, &alert, LifecycleState::Firing, None));
        assert!(without_url.attachment.actions.is_empty());

        config.enable_actions = false;
        let disabled = formatter.format(&request(&config, &alert, LifecycleState::Firing, Some(&url)));
        assert!(disabled.attachment.actions.is_empty());
    }

    #[test]
    fn resolved_layout_reports_duration_without_buttons() {
        let mut config = AlertConfig::for_tests("prod", "http://am:9093");
        config.enable_actions = true;
        config
            .severity_mentions
            .insert("critical".into(), "@oncall".into());
        let mut alert = alert(AlertStatus::Resolved);
        alert.ends_at = Some(alert.starts_at + TimeDelta::seconds(2 * 3600 + 5 * 60 + 7));
        let url = callback();
        let msg = Formatter::new().format(&request(
            &config,
            &alert,
            LifecycleState::Resolved,
            Some(&url),
        ));

        assert!(msg.text.is_empty());
        assert_eq!(msg.attachment.color, COLOR_RESOLVED);
        assert!(msg.attachment.actions.is_empty());
        let first = &msg.attachment.fields[0];
        assert_eq!(first.title, TITLE_RESOLVED);
        assert!(first.value.contains("**Ended at:** Fri, 01 Mar 2024 12:05:07 UTC"));
        assert!(first.value.contains("**Duration:** 2h 5m"));
    }

    #[test]
    fn custom_template_follows_mention() {
        let mut config = AlertConfig::for_tests("prod", "http://am:9093");
        config
            .severity_mentions
            .insert("critical".into(), "@oncall".into());
        config.firing_template = Some("{{ labels.alertname | uppercase }} is {{ status }}".into());
        let alert = alert(AlertStatus::Firing);
        let msg = Formatter::new().format(&request(&config, &alert, LifecycleState::Firing, None));

        assert_eq!(msg.text, "@oncall\n\nDISKFULL is firing");
        assert!(msg.attachment.fields.is_empty());
        assert_eq!(msg.attachment.color, COLOR_CRITICAL);
    }

    #[test]
    fn broken_template_falls_back_to_default_layout() {
        let mut config = AlertConfig::for_tests("prod", "http://am:9093");
        config.firing_template = Some("{{ labels.alertname".into());
        let alert = alert(AlertStatus::Firing);
        let msg = Formatter::new().format(&request(&config, &alert, LifecycleState::Firing, None));
        assert!(msg.text.is_empty());
        assert_eq!(msg.attachment.fields.len(), 2);
    }

    #[test]
    fn short_duration_keeps_two_units() {
        assert_eq!(short_duration(TimeDelta::seconds(0)), "0s");
        assert_eq!(short_duration(TimeDelta::seconds(-30)), "0s");
        assert_eq!(short_duration(TimeDelta::seconds(45)), "45s");
        assert_eq!(short_duration(TimeDelta::seconds(26 * 3600 + 61)), "1day 2h");
    }

    #[test]
    fn title_case_capitalises_words() {
        assert_eq!(title_case("summary"), "Summary");
        assert_eq!(title_case("runbook url"), "Runbook Url");
        assert_eq!(title_case("AlertManager Config ID"), "AlertManager Config ID");
    }
}
