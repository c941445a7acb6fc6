//! Action buttons: the context they carry and its validation on the way back.

use std::time::Duration;

use humantime::parse_duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::Result;
use crate::error::Error;
use crate::message::{ActionButton, Attachment, Integration};
use crate::types::Fingerprint;

/// Context stored inside a button and echoed back by the platform on click.
///
/// The `action` field is the discriminator. Extra keys such as a
/// client-supplied `user_id` are ignored on decode.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ActionContext {
    Silence {
        fingerprint: Fingerprint,
        #[serde(alias = "configID")]
        config_id: String,
        duration: String,
    },
    Ack {
        fingerprint: Fingerprint,
    },
    Unack {
        fingerprint: Fingerprint,
    },
    Expire {
        fingerprint: Fingerprint,
        #[serde(alias = "configID")]
        config_id: String,
        #[serde(alias = "silenceID")]
        silence_id: String,
    },
}

/// What a validated click asks the engine to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionKind {
    Silence { config_id: String, duration: Duration },
    Ack,
    Unack,
    ExpireSilence { config_id: String, silence_id: String },
}

/// A validated, typed instruction from a button click.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionCommand {
    pub kind: ActionKind,
    pub fingerprint: Fingerprint,
    /// Platform user who clicked, taken from the request envelope.
    pub user_id: String,
    /// Message the button belongs to.
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
struct RawActionRequest {
    context: Option<Value>,
    #[serde(default, alias = "userID")]
    user_id: String,
    #[serde(default, alias = "postID", alias = "messageID", alias = "message_id")]
    post_id: String,
}

impl ActionContext {
    pub fn silence(fingerprint: &Fingerprint, config_id: &str, duration: &str) -> Self {
        Self::Silence {
            fingerprint: fingerprint.clone(),
            config_id: config_id.to_string(),
            duration: duration.to_string(),
        }
    }

    pub fn ack(fingerprint: &Fingerprint) -> Self {
        Self::Ack {
            fingerprint: fingerprint.clone(),
        }
    }

    pub fn unack(fingerprint: &Fingerprint) -> Self {
        Self::Unack {
            fingerprint: fingerprint.clone(),
        }
    }

    pub fn expire(fingerprint: &Fingerprint, config_id: &str, silence_id: &str) -> Self {
        Self::Expire {
            fingerprint: fingerprint.clone(),
            config_id: config_id.to_string(),
            silence_id: silence_id.to_string(),
        }
    }

    pub const fn discriminator(&self) -> &'static str {
        match self {
            Self::Silence { .. } => "silence",
            Self::Ack { .. } => "ack",
            Self::Unack { .. } => "unack",
            Self::Expire { .. } => "expire",
        }
    }

    pub const fn fingerprint(&self) -> &Fingerprint {
        match self {
            Self::Silence { fingerprint, .. }
            | Self::Ack { fingerprint }
            | Self::Unack { fingerprint }
            | Self::Expire { fingerprint, .. } => fingerprint,
        }
    }

    fn button_id(&self) -> String {
        match self {
            Self::Silence { duration, .. } => format!("silence{duration}"),
            other => other.discriminator().to_string(),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Silence { duration, .. } => format!("🔕 Silence {duration}"),
            Self::Ack { .. } => "👁️ ACK".to_string(),
            Self::Unack { .. } => "🔄 UNACK".to_string(),
            Self::Expire { .. } => "⏹️ Expire silence".to_string(),
        }
    }

    /// Wrap the context into a button that posts back to `callback`.
    pub fn encode(self, callback: &Url) -> ActionButton {
        ActionButton {
            id: self.button_id(),
            name: self.label(),
            kind: "button".to_string(),
            integration: Integration {
                url: callback.to_string(),
                context: self,
            },
        }
    }

    fn validate(self) -> Result<(Fingerprint, ActionKind)> {
        let fingerprint = self.fingerprint().clone();
        if fingerprint.as_str().trim().is_empty() {
            return Err(Error::InvalidPayload("fingerprint is empty".into()));
        }
        let kind = match self {
            Self::Silence {
                config_id,
                duration,
                ..
            } => {
                if config_id.trim().is_empty() {
                    return Err(Error::InvalidPayload("config_id is empty".into()));
                }
                let duration = parse_duration(&duration)
                    .map_err(|err| Error::InvalidPayload(format!("duration {duration:?}: {err}")))?;
                if duration.is_zero() {
                    return Err(Error::InvalidPayload("duration must be positive".into()));
                }
                ActionKind::Silence {
                    config_id,
                    duration,
                }
            }
            Self::Ack { .. } => ActionKind::Ack,
            Self::Unack { .. } => ActionKind::Unack,
            Self::Expire {
                config_id,
                silence_id,
                ..
            } => {
                if silence_id.trim().is_empty() {
                    return Err(Error::InvalidPayload("silence ID cannot be empty".into()));
                }
                ActionKind::ExpireSilence {
                    config_id,
                    silence_id,
                }
            }
        };
        Ok((fingerprint, kind))
    }
}

impl ActionCommand {
    /// Decode and validate the body the platform posts when a button is
    /// clicked.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] when the body is not a valid envelope, and
    /// [`Error::InvalidPayload`] when the context has a missing or unknown
    /// discriminator, or lacks the fields that discriminator requires.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let raw: RawActionRequest =
            serde_json::from_slice(body).map_err(|err| Error::Decode(err.to_string()))?;
        let context = raw
            .context
            .ok_or_else(|| Error::InvalidPayload("action context is missing".into()))?;
        if raw.user_id.trim().is_empty() {
            return Err(Error::Decode("user_id is missing".into()));
        }
        let context: ActionContext = serde_json::from_value(context)
            .map_err(|err| Error::InvalidPayload(err.to_string()))?;
        let (fingerprint, kind) = context.validate()?;
        Ok(Self {
            kind,
            fingerprint,
            user_id: raw.user_id,
            message_id: raw.post_id,
        })
    }
}

/// Which way to flip the acknowledgement button.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AckSwap {
    AckToUnack,
    UnackToAck,
}

/// Replace the ACK button with UNACK (or back) in place.
///
/// Buttons are matched by their decoded context, never by position, so
/// silence and expire buttons keep their place. Returns whether a button was
/// replaced.
pub fn swap_ack_button(attachment: &mut Attachment, fingerprint: &Fingerprint, swap: AckSwap) -> bool {
    let mut swapped = false;
    for button in &mut attachment.actions {
        let replacement = match (&button.integration.context, swap) {
            (ActionContext::Ack { fingerprint: fp }, AckSwap::AckToUnack) if fp == fingerprint => {
                ActionContext::unack(fingerprint)
            }
            (ActionContext::Unack { fingerprint: fp }, AckSwap::UnackToAck) if fp == fingerprint => {
                ActionContext::ack(fingerprint)
            }
            _ => continue,
        };
        let callback = button.integration.url.clone();
        button.id = replacement.button_id();
        button.name = replacement.label();
        button.integration = Integration {
            url: callback,
            context: replacement,
        };
        swapped = true;
    }
    swapped
}

/// Drop the "Expire silence" button for `silence_id`, leaving every other
/// button in place. Returns whether one was removed.
pub fn remove_expire_button(attachment: &mut Attachment, silence_id: &str) -> bool {
    let before = attachment.actions.len();
    attachment.actions.retain(|button| {
        !matches!(
            &button.integration.context,
            ActionContext::Expire { silence_id: id, .. } if id == silence_id
        )
    });
    attachment.actions.len() != before
}
