use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use url::Url;

use crate::Result;

mod defaults;
mod env;
mod handle;
mod raw;
mod serde;

pub use handle::ConfigHandle;
pub(crate) use self::serde::HumantimeDuration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_ALERTMANAGER_TIMEOUT: Duration = Duration::from_secs(5);

/// Fully validated process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub mattermost: MattermostSettings,
    pub alertmanager: AlertmanagerSettings,
    pub store: StoreSettings,
    pub alert_configs: BTreeMap<String, AlertConfig>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen_addr: SocketAddr,
    /// Externally reachable base URL of this service. Action buttons are
    /// only rendered when it is set.
    pub site_url: Option<Url>,
    pub action_path: String,
}

#[derive(Debug, Clone)]
pub struct MattermostSettings {
    pub url: Url,
    pub token: SecretString,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub channel_cache_size: usize,
}

#[derive(Debug, Clone)]
pub struct AlertmanagerSettings {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub database_url: String,
}

/// A named destination and formatting profile.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub id: String,
    pub team: String,
    pub channel: String,
    pub token: SecretString,
    pub alertmanager_url: Url,
    pub enable_actions: bool,
    pub firing_template: Option<String>,
    pub resolved_template: Option<String>,
    pub severity_mentions: BTreeMap<String, String>,
    pub severity_colors: BTreeMap<String, String>,
    pub state_colors: BTreeMap<String, String>,
}

impl Settings {
    /// Load configuration from a file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration file cannot be parsed, when
    /// environment overrides are invalid, or when the resulting values fail
    /// validation.
    pub fn from_env_and_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut raw = raw::load(path)?;
        raw.apply_env_overrides()?;
        raw.validate_and_build()
    }

    /// Select the profile whose shared secret matches `token`.
    ///
    /// Every profile is compared in constant time so the response time does
    /// not reveal how much of a token matched.
    pub fn config_by_token(&self, token: &str) -> Option<&AlertConfig> {
        let mut found = None;
        for config in self.alert_configs.values() {
            let matches: bool = config
                .token
                .expose_secret()
                .as_bytes()
                .ct_eq(token.as_bytes())
                .into();
            if matches && found.is_none() {
                found = Some(config);
            }
        }
        found
    }

    pub fn config_by_id(&self, id: &str) -> Option<&AlertConfig> {
        self.alert_configs.get(id)
    }

    /// Callback URL carried by every action button, if buttons can work.
    pub fn action_url(&self) -> Option<Url> {
        let site = self.server.site_url.as_ref()?;
        let base = site.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{}", self.server.action_path)).ok()
    }
}

#[cfg(test)]
impl Settings {
    pub(crate) fn for_tests(configs: Vec<AlertConfig>) -> Self {
        Self {
            server: ServerSettings {
                listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
                site_url: None,
                action_path: defaults::default_action_path(),
            },
            mattermost: MattermostSettings {
                url: Url::parse("http://mattermost.local")
                    .unwrap_or_else(|err| panic!("test url: {err}")),
                token: SecretString::from("bot-token"),
                request_timeout: DEFAULT_HTTP_TIMEOUT,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                channel_cache_size: defaults::default_channel_cache_size(),
            },
            alertmanager: AlertmanagerSettings {
                request_timeout: DEFAULT_ALERTMANAGER_TIMEOUT,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            },
            store: StoreSettings {
                database_url: "sqlite::memory:".to_string(),
            },
            alert_configs: configs.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }
}

impl AlertConfig {
    /// Minimal profile with no overrides, templates or actions.
    pub fn new(
        id: impl Into<String>,
        team: impl Into<String>,
        channel: impl Into<String>,
        token: impl Into<String>,
        alertmanager_url: Url,
    ) -> Self {
        Self {
            id: id.into(),
            team: team.into(),
            channel: channel.into(),
            token: SecretString::from(token.into()),
            alertmanager_url,
            enable_actions: false,
            firing_template: None,
            resolved_template: None,
            severity_mentions: BTreeMap::new(),
            severity_colors: BTreeMap::new(),
            state_colors: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(id: &str, alertmanager_url: &str) -> Self {
        let url = Url::parse(alertmanager_url).unwrap_or_else(|err| panic!("test url: {err}"));
        Self::new(id, "ops", "alerts", format!("{id}-token"), url)
    }

    pub fn mention_for(&self, severity: &str) -> Option<&str> {
        self.severity_mentions
            .get(severity)
            .map(String::as_str)
            .filter(|mention| !mention.is_empty())
    }
}
