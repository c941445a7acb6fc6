//! Durable per-alert state.
//!
//! Three namespaces share one key space: `handle:{fp}` maps an alert to its
//! message, `ack:{fp}` records who acknowledged it, and `alert:{fp}` keeps
//! the structured message the engine authored so later transitions can
//! rewrite it without reading the platform's copy back.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::message::RenderedMessage;
use crate::types::{AckRecord, Fingerprint, LifecycleState, MessageHandle};

mod sqlite;

pub use sqlite::SqliteStateStore;

const HANDLE_PREFIX: &str = "handle:";
const ACK_PREFIX: &str = "ack:";
const SNAPSHOT_PREFIX: &str = "alert:";

/// What the engine last rendered for a live alert.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub config_id: String,
    pub state: LifecycleState,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub rendered: RenderedMessage,
}

/// Key-value persistence for alert lifecycle state.
///
/// Every operation is atomic for its key. Deletes are idempotent and puts
/// overwrite.
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    async fn put_handle(&self, fp: &Fingerprint, handle: &MessageHandle) -> Result<()>;
    async fn get_handle(&self, fp: &Fingerprint) -> Result<Option<MessageHandle>>;
    async fn delete_handle(&self, fp: &Fingerprint) -> Result<()>;

    async fn put_ack(&self, fp: &Fingerprint, record: &AckRecord) -> Result<()>;
    async fn get_ack(&self, fp: &Fingerprint) -> Result<Option<AckRecord>>;
    async fn delete_ack(&self, fp: &Fingerprint) -> Result<()>;

    async fn put_snapshot(&self, fp: &Fingerprint, snapshot: &AlertSnapshot) -> Result<()>;
    async fn get_snapshot(&self, fp: &Fingerprint) -> Result<Option<AlertSnapshot>>;

    /// Drop everything recorded for a resolved alert.
    async fn forget(&self, fp: &Fingerprint) -> Result<()>;
}

pub(crate) fn handle_key(fp: &Fingerprint) -> String {
    format!("{HANDLE_PREFIX}{fp}")
}

pub(crate) fn ack_key(fp: &Fingerprint) -> String {
    format!("{ACK_PREFIX}{fp}")
}

pub(crate) fn snapshot_key(fp: &Fingerprint) -> String {
    format!("{SNAPSHOT_PREFIX}{fp}")
}
