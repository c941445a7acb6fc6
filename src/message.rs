//! Typed representation of the chat message that mirrors one alert.
//!
//! The field names follow the Slack-compatible attachment layout Mattermost
//! stores under `props.attachments`, so the same structs are used to post a
//! message and to read one back.

use serde::{Deserialize, Serialize};

use crate::action::ActionContext;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RenderedMessage {
    /// Plain message text shown above the attachment.
    #[serde(default)]
    pub text: String,
    pub attachment: Attachment,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Attachment {
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionButton>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Field {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionButton {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "button_type")]
    pub kind: String,
    pub integration: Integration,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Integration {
    pub url: String,
    pub context: ActionContext,
}

fn button_type() -> String {
    "button".to_string()
}

impl Field {
    pub fn new(title: impl Into<String>, value: impl Into<String>, short: bool) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short,
        }
    }
}

impl Attachment {
    pub fn set_status_title(&mut self, title: &str) {
        if let Some(first) = self.fields.first_mut() {
            first.title = title.to_string();
        }
    }
}

impl RenderedMessage {
    /// Mattermost `props` object carrying the attachment.
    pub fn props(&self) -> serde_json::Value {
        serde_json::json!({ "attachments": [&self.attachment] })
    }
}
