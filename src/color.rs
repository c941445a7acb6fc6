//! Display colour selection for alert messages.

use crate::config::AlertConfig;
use crate::types::LifecycleState;

pub const COLOR_FIRING: &str = "#FF0000";
pub const COLOR_ACKNOWLEDGED: &str = "#9013FE";
pub const COLOR_RESOLVED: &str = "#008000";
pub const COLOR_EXPIRED: &str = "#F0F8FF";

pub const COLOR_CRITICAL: &str = "#FF0000";
pub const COLOR_ERROR: &str = "#F5A623";
pub const COLOR_WARNING: &str = "#F8E71C";
pub const COLOR_INFO: &str = "#0080FF";
pub const COLOR_DEBUG: &str = "#87CEEB";

/// Pick the attachment colour for an alert.
///
/// Acknowledged and resolved alerts are coloured by state alone: a state
/// override if configured, else the fixed state colour. Firing alerts prefer
/// a severity override, then a firing-state override, then the built-in
/// severity palette, then plain red.
pub fn resolve_color(config: &AlertConfig, severity: &str, state: LifecycleState) -> String {
    match state {
        LifecycleState::Acked | LifecycleState::Resolved => state_override(config, state)
            .unwrap_or(match state {
                LifecycleState::Acked => COLOR_ACKNOWLEDGED,
                _ => COLOR_RESOLVED,
            })
            .to_string(),
        LifecycleState::Firing => severity_override(config, severity)
            .or_else(|| state_override(config, LifecycleState::Firing))
            .or_else(|| default_severity_color(severity))
            .unwrap_or(COLOR_FIRING)
            .to_string(),
    }
}

fn state_override(config: &AlertConfig, state: LifecycleState) -> Option<&str> {
    config
        .state_colors
        .get(state.as_str())
        .map(String::as_str)
        .filter(|color| !color.is_empty())
}

fn severity_override<'a>(config: &'a AlertConfig, severity: &str) -> Option<&'a str> {
    if severity.is_empty() {
        return None;
    }
    config
        .severity_colors
        .get(severity)
        .map(String::as_str)
        .filter(|color| !color.is_empty())
}

fn default_severity_color(severity: &str) -> Option<&'static str> {
    match severity {
        "critical" => Some(COLOR_CRITICAL),
        "error" => Some(COLOR_ERROR),
        "warning" => Some(COLOR_WARNING),
        "info" => Some(COLOR_INFO),
        "debug" => Some(COLOR_DEBUG),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertConfig;

    fn config() -> AlertConfig {
        AlertConfig::for_tests("prod", "http://am.local")
    }

    #[test]
    fn acked_state_override_ignores_severity() {
        let mut cfg = config();
        cfg.state_colors.insert("acked".into(), "#123456".into());
        cfg.severity_colors.insert("critical".into(), "#ABCDEF".into());
        assert_eq!(
            resolve_color(&cfg, "critical", LifecycleState::Acked),
            "#123456"
        );
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let cfg = config();
        assert_eq!(
            resolve_color(&cfg, "critical", LifecycleState::Firing),
            COLOR_CRITICAL
        );
        assert_eq!(resolve_color(&cfg, "", LifecycleState::Firing), COLOR_FIRING);
        assert_eq!(
            resolve_color(&cfg, "page", LifecycleState::Firing),
            COLOR_FIRING
        );
        assert_eq!(
            resolve_color(&cfg, "warning", LifecycleState::Resolved),
            COLOR_RESOLVED
        );
        assert_eq!(
            resolve_color(&cfg, "info", LifecycleState::Acked),
            COLOR_ACKNOWLEDGED
        );
    }

    #[test]
    fn firing_precedence_is_severity_then_state_then_palette() {
        let mut cfg = config();
        cfg.state_colors.insert("firing".into(), "#111111".into());
        assert_eq!(
            resolve_color(&cfg, "warning", LifecycleState::Firing),
            "#111111"
        );
        cfg.severity_colors.insert("warning".into(), "#222222".into());
        assert_eq!(
            resolve_color(&cfg, "warning", LifecycleState::Firing),
            "#222222"
        );
        cfg.severity_colors.insert("info".into(), String::new());
        assert_eq!(resolve_color(&cfg, "info", LifecycleState::Firing), "#111111");
    }
}
