use std::time::Duration;

pub(super) fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

pub(super) fn default_action_path() -> String {
    "/api/action".to_string()
}

pub(super) fn default_database_url() -> String {
    "sqlite://alertbridge.db".to_string()
}

pub(super) const fn default_mattermost_timeout() -> Duration {
    super::DEFAULT_HTTP_TIMEOUT
}

pub(super) const fn default_connect_timeout() -> Duration {
    super::DEFAULT_CONNECT_TIMEOUT
}

pub(super) const fn default_alertmanager_timeout() -> Duration {
    super::DEFAULT_ALERTMANAGER_TIMEOUT
}

pub(super) const fn default_channel_cache_size() -> usize {
    64
}

pub(super) const fn default_enable_actions() -> bool {
    true
}
