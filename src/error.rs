use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Alertmanager(#[from] AlertmanagerError),
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },
    #[error("invalid action payload: {0}")]
    InvalidPayload(String),
    #[error("no valid matchers found in alert labels")]
    NoMatchers,
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("HTTP server failed")]
    Server(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("missing required configuration field: {field}")]
    MissingField { field: String },
    #[error("invalid configuration for {field}: {message}")]
    InvalidField { field: String, message: String },
    #[error("configuration error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open state store: {0}")]
    Open(String),
    #[error("state store migration failed: {0}")]
    Migration(String),
    #[error("state store operation `{operation}` failed")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("corrupt value stored under {key}: {message}")]
    Corrupt { key: String, message: String },
}

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{resource} not found on the messaging platform")]
    NotFound { resource: String },
    #[error("invalid JSON payload: {message}")]
    Json { message: String },
}

#[derive(Debug, Error)]
pub enum AlertmanagerError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid Alertmanager URL {url}: {message}")]
    Url { url: String, message: String },
    #[error("request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("Alertmanager returned status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid JSON payload: {message}")]
    Json { message: String },
}

impl From<reqwest::Error> for MessagingError {
    fn from(source: reqwest::Error) -> Self {
        Self::Request { source }
    }
}

impl From<reqwest::Error> for AlertmanagerError {
    fn from(source: reqwest::Error) -> Self {
        Self::Request { source }
    }
}

impl Error {
    pub(crate) fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    /// Failures of the messaging platform or the Alertmanager.
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::Messaging(_) | Self::Alertmanager(_))
    }

    /// Client-side rejections that must not change any state.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::InvalidPayload(_) | Self::NoMatchers
        )
    }
}
