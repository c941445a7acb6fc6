#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod action;
pub mod alertmanager;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
mod http;
pub mod ingress;
pub mod mattermost;
pub mod message;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod webhook;

pub type Result<T> = std::result::Result<T, error::Error>;
