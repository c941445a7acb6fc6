//! Client for the Alertmanager v2 silence API.

mod client;
mod models;

pub use client::AlertmanagerClient;
pub use models::{Matcher, SilenceId, SilenceRequest};
