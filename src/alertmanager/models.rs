use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::Error;

/// Identifier Alertmanager assigns to a created silence.
pub type SilenceId = String;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    pub name: String,
    pub value: String,
    pub is_regex: bool,
    pub is_equal: bool,
}

/// Body of `POST /api/v2/silences`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceRequest {
    pub matchers: Vec<Matcher>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_by: String,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct SilenceResponse {
    #[serde(rename = "silenceID")]
    pub(super) silence_id: SilenceId,
}

impl SilenceRequest {
    /// One equality matcher per label, ordered by label name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMatchers`] when `labels` is empty.
    pub fn from_labels(
        labels: &BTreeMap<String, String>,
        duration: Duration,
        created_by: impl Into<String>,
        comment: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let matchers: Vec<Matcher> = labels
            .iter()
            .map(|(name, value)| Matcher {
                name: name.clone(),
                value: value.clone(),
                is_regex: false,
                is_equal: true,
            })
            .collect();
        if matchers.is_empty() {
            return Err(Error::NoMatchers);
        }
        let length = chrono::Duration::from_std(duration)
            .map_err(|err| Error::InvalidPayload(format!("silence duration: {err}")))?;
        Ok(Self {
            matchers,
            starts_at: now,
            ends_at: now + length,
            created_by: created_by.into(),
            comment: comment.into(),
        })
    }
}
