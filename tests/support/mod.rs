#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alertbridge::Result;
use alertbridge::alertmanager::AlertmanagerClient;
use alertbridge::config::{
    AlertConfig, AlertmanagerSettings, MattermostSettings, ServerSettings, Settings,
    StoreSettings,
};
use alertbridge::engine::LifecycleEngine;
use alertbridge::error::MessagingError;
use alertbridge::mattermost::Messenger;
use alertbridge::message::RenderedMessage;
use alertbridge::store::SqliteStateStore;
use alertbridge::types::{ChatUser, MessageHandle};
use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Create { channel_id: String, message_id: String },
    Update { message_id: String },
    Reply { message_id: String, text: String },
}

/// In-memory chat platform that records every call.
#[derive(Default)]
pub struct FakeMessenger {
    next_id: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    /// Fingerprint whose message creation is rejected.
    pub fail_fingerprint: Mutex<Option<String>>,
    pub calls: Mutex<Vec<Call>>,
    pub messages: Mutex<BTreeMap<String, RenderedMessage>>,
}

impl FakeMessenger {
    pub fn creates(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Create { .. }))
            .count()
    }

    pub fn replies(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Reply { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn message(&self, id: &str) -> RenderedMessage {
        self.messages.lock().get(id).cloned().expect("message exists")
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn create_message(
        &self,
        channel_id: &str,
        message: &RenderedMessage,
    ) -> Result<MessageHandle> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(MessagingError::NotFound {
                resource: format!("channel {channel_id}"),
            }
            .into());
        }
        let rejected = self.fail_fingerprint.lock().clone();
        if let Some(fingerprint) = rejected {
            let targeted = message
                .attachment
                .actions
                .iter()
                .any(|button| button.integration.context.fingerprint().as_str() == fingerprint);
            if targeted {
                return Err(MessagingError::HttpStatus {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    body: "rejected".to_string(),
                }
                .into());
            }
        }
        // Yield so concurrent deliveries get a chance to interleave.
        tokio::task::yield_now().await;
        let message_id = format!("post-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.messages
            .lock()
            .insert(message_id.clone(), message.clone());
        self.calls.lock().push(Call::Create {
            channel_id: channel_id.to_string(),
            message_id: message_id.clone(),
        });
        Ok(MessageHandle {
            message_id,
            channel_id: channel_id.to_string(),
        })
    }

    async fn update_message(
        &self,
        handle: &MessageHandle,
        message: &RenderedMessage,
    ) -> Result<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(MessagingError::NotFound {
                resource: format!("post {}", handle.message_id),
            }
            .into());
        }
        self.messages
            .lock()
            .insert(handle.message_id.clone(), message.clone());
        self.calls.lock().push(Call::Update {
            message_id: handle.message_id.clone(),
        });
        Ok(())
    }

    async fn get_message(&self, handle: &MessageHandle) -> Result<RenderedMessage> {
        self.messages
            .lock()
            .get(&handle.message_id)
            .cloned()
            .ok_or_else(|| {
                MessagingError::NotFound {
                    resource: format!("post {}", handle.message_id),
                }
                .into()
            })
    }

    async fn create_reply(&self, handle: &MessageHandle, text: &str) -> Result<()> {
        self.calls.lock().push(Call::Reply {
            message_id: handle.message_id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<ChatUser> {
        let username = match user_id {
            "u1" => "alice",
            "u2" => "bob",
            other => {
                return Err(MessagingError::NotFound {
                    resource: format!("user {other}"),
                }
                .into());
            }
        };
        Ok(ChatUser {
            id: user_id.to_string(),
            username: username.to_string(),
        })
    }

    async fn find_channel(&self, team: &str, channel: &str) -> Result<String> {
        Ok(format!("{team}-{channel}"))
    }
}

pub fn alert_config(alertmanager_url: &str) -> AlertConfig {
    let mut config = AlertConfig::new(
        "prod",
        "ops",
        "alerts",
        "prod-token",
        Url::parse(alertmanager_url).unwrap(),
    );
    config.enable_actions = true;
    config
}

pub fn settings(config: AlertConfig, site_url: Option<&str>) -> Settings {
    Settings {
        server: ServerSettings {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            site_url: site_url.map(|url| Url::parse(url).unwrap()),
            action_path: "/api/action".to_string(),
        },
        mattermost: MattermostSettings {
            url: Url::parse("http://mattermost.invalid").unwrap(),
            token: SecretString::from("bot-token"),
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            channel_cache_size: 8,
        },
        alertmanager: AlertmanagerSettings {
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
        },
        store: StoreSettings {
            database_url: "sqlite::memory:".to_string(),
        },
        alert_configs: BTreeMap::from([(config.id.clone(), config)]),
    }
}

pub struct Harness {
    pub engine: LifecycleEngine,
    pub store: Arc<SqliteStateStore>,
    pub messenger: Arc<FakeMessenger>,
}

pub async fn harness() -> Harness {
    let store = Arc::new(SqliteStateStore::connect("sqlite::memory:").await.unwrap());
    let messenger = Arc::new(FakeMessenger::default());
    let alertmanager =
        AlertmanagerClient::new(Duration::from_secs(2), Duration::from_secs(1)).unwrap();
    let engine = LifecycleEngine::new(store.clone(), messenger.clone(), alertmanager);
    Harness {
        engine,
        store,
        messenger,
    }
}

pub fn alert_json(fingerprint: &str, status: &str) -> Value {
    json!({
        "status": status,
        "fingerprint": fingerprint,
        "labels": {"alertname": "DiskFull", "severity": "critical", "instance": "db-1"},
        "annotations": {"summary": "disk is full"},
        "startsAt": "2024-03-01T10:00:00Z",
        "endsAt": if status == "resolved" { "2024-03-01T11:30:00Z" } else { "0001-01-01T00:00:00Z" },
        "generatorURL": "http://prometheus:9090/graph"
    })
}

pub fn webhook_json(status: &str, alerts: Vec<Value>) -> Value {
    json!({
        "version": "4",
        "status": status,
        "receiver": "mattermost",
        "externalURL": "http://alertmanager:9093",
        "alerts": alerts
    })
}
