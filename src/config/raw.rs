use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_with::serde_as;
use url::Url;

use crate::Result;
use crate::error::ConfigError;

use super::defaults::{
    default_action_path, default_alertmanager_timeout, default_channel_cache_size,
    default_connect_timeout, default_database_url, default_enable_actions, default_listen_addr,
    default_mattermost_timeout,
};
use super::env::{env_duration, env_string};
use super::serde::LenientStringMap;
use super::{
    AlertConfig, AlertmanagerSettings, HumantimeDuration, MattermostSettings, ServerSettings,
    Settings, StoreSettings,
};

/// Routes the server mounts regardless of configuration.
const RESERVED_PATHS: [&str; 3] = ["/", "/health", "/api/webhook"];

pub(super) fn load(path: impl AsRef<Path>) -> std::result::Result<RawSettings, ConfigError> {
    let path = path.as_ref();
    ::config::Config::builder()
        .add_source(::config::File::from(path).required(false))
        .add_source(
            ::config::Environment::with_prefix("ALERTBRIDGE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|err| ConfigError::Other(err.to_string()))?
        .try_deserialize()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawSettings {
    #[serde(default)]
    pub(super) server: RawServer,
    #[serde(default)]
    pub(super) mattermost: RawMattermost,
    #[serde(default)]
    pub(super) alertmanager: RawAlertmanager,
    #[serde(default)]
    pub(super) store: RawStore,
    #[serde(default)]
    pub(super) alert_configs: BTreeMap<String, RawAlertConfig>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawServer {
    #[serde(default = "default_listen_addr")]
    pub(super) listen_addr: String,
    #[serde(default)]
    pub(super) site_url: Option<String>,
    #[serde(default = "default_action_path")]
    pub(super) action_path: String,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawMattermost {
    pub(super) url: Option<String>,
    pub(super) token: Option<String>,
    #[serde(default = "default_mattermost_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) request_timeout: Duration,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) connect_timeout: Duration,
    #[serde(default = "default_channel_cache_size")]
    pub(super) channel_cache_size: usize,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawAlertmanager {
    #[serde(default = "default_alertmanager_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) request_timeout: Duration,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) connect_timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawStore {
    #[serde(default = "default_database_url")]
    pub(super) database_url: String,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawAlertConfig {
    #[serde(default)]
    pub(super) team: String,
    #[serde(default)]
    pub(super) channel: String,
    #[serde(default)]
    pub(super) token: String,
    #[serde(default)]
    pub(super) alertmanager_url: String,
    #[serde(default = "default_enable_actions")]
    pub(super) enable_actions: bool,
    #[serde(default)]
    pub(super) firing_template: Option<String>,
    #[serde(default)]
    pub(super) resolved_template: Option<String>,
    #[serde(default)]
    #[serde_as(as = "LenientStringMap")]
    pub(super) severity_mentions: BTreeMap<String, String>,
    #[serde(default)]
    pub(super) severity_colors: BTreeMap<String, String>,
    #[serde(default)]
    pub(super) state_colors: BTreeMap<String, String>,
}

impl RawSettings {
    pub(super) fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        if let Some(url) = env_string("MATTERMOST_URL")? {
            self.mattermost.url = Some(url);
        }
        if let Some(token) = env_string("MATTERMOST_TOKEN")? {
            self.mattermost.token = Some(token);
        }
        if let Some(timeout) = env_duration("MATTERMOST_TIMEOUT")? {
            self.mattermost.request_timeout = timeout;
        }
        if let Some(timeout) = env_duration("ALERTMANAGER_TIMEOUT")? {
            self.alertmanager.request_timeout = timeout;
        }
        if let Some(site_url) = env_string("SITE_URL")? {
            self.server.site_url = Some(site_url);
        }
        if let Some(listen) = env_string("LISTEN_ADDR")? {
            self.server.listen_addr = listen;
        }
        if let Some(database_url) = env_string("DATABASE_URL")? {
            self.store.database_url = database_url;
        }
        Ok(())
    }

    pub(super) fn validate_and_build(self) -> Result<Settings> {
        let listen_addr: SocketAddr = self
            .server
            .listen_addr
            .parse()
            .map_err(|err: std::net::AddrParseError| {
                invalid("server.listen_addr", &err.to_string())
            })?;
        let site_url = self
            .server
            .site_url
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_url("server.site_url", &raw))
            .transpose()?;
        if !self.server.action_path.starts_with('/') {
            return Err(invalid("server.action_path", "path must start with '/'").into());
        }
        if RESERVED_PATHS.contains(&self.server.action_path.as_str()) {
            return Err(invalid("server.action_path", "path is already used by another route").into());
        }

        let mattermost_url = self.mattermost.url.ok_or_else(|| ConfigError::MissingField {
            field: "mattermost.url".to_string(),
        })?;
        let token = self.mattermost.token.ok_or_else(|| ConfigError::MissingField {
            field: "mattermost.token".to_string(),
        })?;
        if token.trim().is_empty() {
            return Err(invalid("mattermost.token", "token cannot be empty").into());
        }
        if self.mattermost.request_timeout.is_zero() {
            return Err(invalid(
                "mattermost.request_timeout",
                "timeout must be greater than zero",
            )
            .into());
        }
        if self.alertmanager.request_timeout.is_zero() {
            return Err(invalid(
                "alertmanager.request_timeout",
                "timeout must be greater than zero",
            )
            .into());
        }
        if self.mattermost.channel_cache_size == 0 {
            return Err(invalid(
                "mattermost.channel_cache_size",
                "cache size must be greater than zero",
            )
            .into());
        }

        let mut seen_tokens = HashSet::new();
        let mut alert_configs = BTreeMap::new();
        for (id, raw) in self.alert_configs {
            let config = raw.validate_and_build(&id)?;
            if !seen_tokens.insert(config.token.expose_secret().to_string()) {
                return Err(invalid(
                    &format!("alert_configs.{id}.token"),
                    "token is shared with another alert config",
                )
                .into());
            }
            alert_configs.insert(id, config);
        }

        Ok(Settings {
            server: ServerSettings {
                listen_addr,
                site_url,
                action_path: self.server.action_path,
            },
            mattermost: MattermostSettings {
                url: parse_url("mattermost.url", &mattermost_url)?,
                token: SecretString::from(token),
                request_timeout: self.mattermost.request_timeout,
                connect_timeout: self.mattermost.connect_timeout,
                channel_cache_size: self.mattermost.channel_cache_size,
            },
            alertmanager: AlertmanagerSettings {
                request_timeout: self.alertmanager.request_timeout,
                connect_timeout: self.alertmanager.connect_timeout,
            },
            store: StoreSettings {
                database_url: self.store.database_url,
            },
            alert_configs,
        })
    }
}

impl RawAlertConfig {
    fn validate_and_build(self, id: &str) -> std::result::Result<AlertConfig, ConfigError> {
        let require = |value: &str, name: &str| {
            if value.trim().is_empty() {
                Err(ConfigError::MissingField {
                    field: format!("alert_configs.{id}.{name}"),
                })
            } else {
                Ok(())
            }
        };
        require(&self.team, "team")?;
        require(&self.channel, "channel")?;
        require(&self.token, "token")?;
        require(&self.alertmanager_url, "alertmanager_url")?;

        let trimmed = self.alertmanager_url.trim_end_matches('/');
        let alertmanager_url = parse_url(&format!("alert_configs.{id}.alertmanager_url"), trimmed)?;

        Ok(AlertConfig {
            id: id.to_string(),
            team: self.team,
            channel: self.channel,
            token: SecretString::from(self.token),
            alertmanager_url,
            enable_actions: self.enable_actions,
            firing_template: self.firing_template.filter(|t| !t.trim().is_empty()),
            resolved_template: self.resolved_template.filter(|t| !t.trim().is_empty()),
            severity_mentions: self.severity_mentions,
            severity_colors: self.severity_colors,
            state_colors: self.state_colors,
        })
    }
}

fn parse_url(field: &str, raw: &str) -> std::result::Result<Url, ConfigError> {
    Url::parse(raw).map_err(|err| invalid(field, &err.to_string()))
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

impl Default for RawServer {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            site_url: None,
            action_path: default_action_path(),
        }
    }
}

impl Default for RawMattermost {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            request_timeout: default_mattermost_timeout(),
            connect_timeout: default_connect_timeout(),
            channel_cache_size: default_channel_cache_size(),
        }
    }
}

impl Default for RawAlertmanager {
    fn default() -> Self {
        Self {
            request_timeout: default_alertmanager_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for RawStore {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}
