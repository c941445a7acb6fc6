//! Alert lifecycle state machine.
//!
//! Every transition for a fingerprint runs under that fingerprint's lock, so
//! "is there a handle" and the write that depends on it cannot interleave
//! with another delivery or click for the same alert. Different fingerprints
//! proceed in parallel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::Result;
use crate::action::{
    AckSwap, ActionCommand, ActionContext, ActionKind, remove_expire_button, swap_ack_button,
};
use crate::alertmanager::{AlertmanagerClient, SilenceRequest};
use crate::color::{COLOR_ACKNOWLEDGED, COLOR_EXPIRED, COLOR_FIRING, resolve_color};
use crate::config::{AlertConfig, Settings};
use crate::error::Error;
use crate::format::{FormatRequest, Formatter, format_time, short_duration, status_title};
use crate::message::{Field, RenderedMessage};
use crate::mattermost::Messenger;
use crate::store::{AlertSnapshot, AlertStateStore};
use crate::types::{AckRecord, AlertStatus, ChatUser, Fingerprint, LifecycleState, MessageHandle};
use crate::webhook::{Alert, WebhookMessage};

mod locks;

use locks::KeyedLocks;

/// What happened to one alert of a webhook delivery.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertOutcome {
    Created,
    Duplicate,
    Resolved,
    Failed,
}

/// Per-delivery tally returned to Alertmanager.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct WebhookSummary {
    pub created: usize,
    pub duplicate: usize,
    pub resolved: usize,
    pub failed: usize,
}

impl WebhookSummary {
    fn record(&mut self, outcome: AlertOutcome) {
        match outcome {
            AlertOutcome::Created => self.created += 1,
            AlertOutcome::Duplicate => self.duplicate += 1,
            AlertOutcome::Resolved => self.resolved += 1,
            AlertOutcome::Failed => self.failed += 1,
        }
    }
}

/// Result of an interactive action, shown back to the actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The alert's message after the transition, when it was rewritten.
    pub message: Option<RenderedMessage>,
    /// Short confirmation for the actor only.
    pub notice: String,
}

pub struct LifecycleEngine {
    store: Arc<dyn AlertStateStore>,
    messenger: Arc<dyn Messenger>,
    alertmanager: AlertmanagerClient,
    formatter: Formatter,
    locks: KeyedLocks,
}

/// Delivery-wide context shared by every alert of one webhook call.
struct Delivery<'a> {
    config: &'a AlertConfig,
    receiver: &'a str,
    external_url: &'a str,
    action_url: Option<&'a Url>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn AlertStateStore>,
        messenger: Arc<dyn Messenger>,
        alertmanager: AlertmanagerClient,
    ) -> Self {
        Self {
            store,
            messenger,
            alertmanager,
            formatter: Formatter::new(),
            locks: KeyedLocks::default(),
        }
    }

    /// Apply every alert of a delivery. Alerts are independent: one failing
    /// never affects its siblings.
    pub async fn handle_webhook(
        &self,
        settings: &Settings,
        config: &AlertConfig,
        message: &WebhookMessage,
    ) -> WebhookSummary {
        let action_url = settings.action_url();
        let delivery = Delivery {
            config,
            receiver: &message.receiver,
            external_url: &message.external_url,
            action_url: action_url.as_ref(),
        };

        let outcomes = join_all(
            message
                .alerts
                .iter()
                .map(|alert| self.process_alert(&delivery, alert)),
        )
        .await;

        let mut summary = WebhookSummary {
            failed: message.rejected,
            ..WebhookSummary::default()
        };
        for outcome in outcomes {
            summary.record(outcome);
        }
        info!(
            config_id = %config.id,
            receiver = %message.receiver,
            created = summary.created,
            duplicate = summary.duplicate,
            resolved = summary.resolved,
            failed = summary.failed,
            "webhook processed"
        );
        summary
    }

    async fn process_alert(&self, delivery: &Delivery<'_>, alert: &Alert) -> AlertOutcome {
        let fp = &alert.fingerprint;
        let _guard = self.locks.lock(fp.as_str()).await;

        let result = match self.store.get_handle(fp).await {
            Err(err) => Err(err),
            Ok(Some(_)) if alert.status == AlertStatus::Firing => {
                debug!(fingerprint = %fp, "alert already has a message, skipping");
                Ok(AlertOutcome::Duplicate)
            }
            Ok(Some(handle)) => self.resolve(delivery, alert, handle).await,
            Ok(None) => {
                if alert.status == AlertStatus::Resolved {
                    warn!(
                        fingerprint = %fp,
                        "resolved alert without a message, posting it as firing"
                    );
                }
                self.create(delivery, alert).await
            }
        };

        result.unwrap_or_else(|err| {
            warn!(
                fingerprint = %fp,
                config_id = %delivery.config.id,
                error = %err,
                external = err.is_external(),
                "alert processing failed"
            );
            AlertOutcome::Failed
        })
    }

    /// First sight of an alert. Nothing is recorded unless the message was
    /// created, so a redelivery after a failure starts over cleanly. A
    /// resolved event seen first is posted as firing; its next delivery
    /// resolves the message in place.
    async fn create(&self, delivery: &Delivery<'_>, alert: &Alert) -> Result<AlertOutcome> {
        let fp = &alert.fingerprint;
        let config = delivery.config;
        let state = LifecycleState::Firing;
        let channel_id = self
            .messenger
            .find_channel(&config.team, &config.channel)
            .await?;
        let rendered = self.formatter.format(&FormatRequest {
            config,
            alert,
            external_url: delivery.external_url,
            receiver: delivery.receiver,
            state,
            action_url: delivery.action_url,
            now: Utc::now(),
        });
        let handle = self.messenger.create_message(&channel_id, &rendered).await?;

        self.store.put_handle(fp, &handle).await?;
        let snapshot = AlertSnapshot {
            config_id: config.id.clone(),
            state,
            severity: alert.severity().to_string(),
            labels: alert.labels.clone(),
            rendered,
        };
        if let Err(err) = self.store.put_snapshot(fp, &snapshot).await {
            warn!(fingerprint = %fp, error = %err, "failed to store alert snapshot");
        }
        info!(
            fingerprint = %fp,
            config_id = %config.id,
            message_id = %handle.message_id,
            "created message for alert"
        );
        Ok(AlertOutcome::Created)
    }

    /// Rewrite the live message as resolved, post the timing summary and
    /// forget the alert. The mapping is removed even if the platform rejects
    /// the update, since the message may have been deleted by hand.
    async fn resolve(
        &self,
        delivery: &Delivery<'_>,
        alert: &Alert,
        handle: MessageHandle,
    ) -> Result<AlertOutcome> {
        let fp = &alert.fingerprint;
        let now = Utc::now();
        let rendered = self.formatter.format(&FormatRequest {
            config: delivery.config,
            alert,
            external_url: delivery.external_url,
            receiver: delivery.receiver,
            state: LifecycleState::Resolved,
            action_url: delivery.action_url,
            now,
        });

        if let Err(err) = self.messenger.update_message(&handle, &rendered).await {
            warn!(
                fingerprint = %fp,
                message_id = %handle.message_id,
                error = %err,
                "failed to update message for resolved alert"
            );
        } else {
            let ended = alert.ends_at.unwrap_or(now);
            let reply = resolved_reply(alert.starts_at, ended);
            self.reply(&handle, &reply).await;
        }

        self.store.forget(fp).await?;
        info!(fingerprint = %fp, message_id = %handle.message_id, "alert resolved");
        Ok(AlertOutcome::Resolved)
    }

    /// Apply a validated button click.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown profile, or an ack/unack on an
    /// alert without a live message; [`Error::NoMatchers`] when a silence
    /// has no labels to match; external failures from the chat platform or
    /// Alertmanager.
    pub async fn handle_action(
        &self,
        settings: &Settings,
        cmd: ActionCommand,
    ) -> Result<ActionOutcome> {
        let fp = cmd.fingerprint.clone();
        let _guard = self.locks.lock(fp.as_str()).await;
        debug!(fingerprint = %fp, message_id = %cmd.message_id, kind = ?cmd.kind, "action received");

        match cmd.kind {
            ActionKind::Ack => self.acknowledge(settings, &fp, &cmd.user_id).await,
            ActionKind::Unack => self.unacknowledge(settings, &fp, &cmd.user_id).await,
            ActionKind::Silence {
                config_id,
                duration,
            } => {
                self.silence(settings, &fp, &config_id, duration, &cmd.user_id)
                    .await
            }
            ActionKind::ExpireSilence {
                config_id,
                silence_id,
            } => {
                self.expire(settings, &fp, &config_id, &silence_id, &cmd.user_id)
                    .await
            }
        }
    }

    async fn acknowledge(
        &self,
        settings: &Settings,
        fp: &Fingerprint,
        user_id: &str,
    ) -> Result<ActionOutcome> {
        let handle = self.require_handle(fp).await?;
        let user = self.messenger.get_user(user_id).await?;
        let record = AckRecord {
            user_id: user.id.clone(),
            username: user.username.clone(),
            timestamp_millis: Utc::now().timestamp_millis(),
        };
        self.store.put_ack(fp, &record).await?;

        let message = self
            .restyle(settings, fp, &handle, LifecycleState::Acked)
            .await?;
        let now = Utc::now();
        self.reply(
            &handle,
            &format!(
                "👁️ **Alert Acknowledged**\n\nBy: @{}\nAt: {}",
                user.username,
                format_time(now)
            ),
        )
        .await;
        info!(fingerprint = %fp, user = %user.username, "alert acknowledged");
        Ok(ActionOutcome {
            message: Some(message),
            notice: format!("Alert acknowledged by @{}", user.username),
        })
    }

    async fn unacknowledge(
        &self,
        settings: &Settings,
        fp: &Fingerprint,
        user_id: &str,
    ) -> Result<ActionOutcome> {
        let handle = self.require_handle(fp).await?;
        let user = self.messenger.get_user(user_id).await?;
        self.store.delete_ack(fp).await?;

        let message = self
            .restyle(settings, fp, &handle, LifecycleState::Firing)
            .await?;
        self.reply(
            &handle,
            &format!(
                "🔄 **Alert Unacknowledged**\n\nBy: @{}\nAt: {}",
                user.username,
                format_time(Utc::now())
            ),
        )
        .await;
        info!(fingerprint = %fp, user = %user.username, "alert unacknowledged");
        Ok(ActionOutcome {
            message: Some(message),
            notice: format!("Alert unacknowledged by @{}", user.username),
        })
    }

    /// Swap the ACK/UNACK button, recolour and retitle the message for
    /// `state`, persist the new snapshot and push it to the platform.
    async fn restyle(
        &self,
        settings: &Settings,
        fp: &Fingerprint,
        handle: &MessageHandle,
        state: LifecycleState,
    ) -> Result<RenderedMessage> {
        let mut snapshot = self.current(fp, handle).await?;
        let swap = if state == LifecycleState::Acked {
            AckSwap::AckToUnack
        } else {
            AckSwap::UnackToAck
        };
        let color = state_color(settings, &snapshot, state);
        let attachment = &mut snapshot.rendered.attachment;
        if !swap_ack_button(attachment, fp, swap) {
            debug!(fingerprint = %fp, ?swap, "no matching button to swap");
        }
        attachment.color = color;
        attachment.set_status_title(status_title(state));
        snapshot.state = state;

        self.save_and_push(fp, handle, &snapshot).await?;
        Ok(snapshot.rendered)
    }

    async fn silence(
        &self,
        settings: &Settings,
        fp: &Fingerprint,
        config_id: &str,
        duration: Duration,
        user_id: &str,
    ) -> Result<ActionOutcome> {
        let config = settings
            .config_by_id(config_id)
            .ok_or_else(|| Error::not_found("alert config", config_id))?;
        let snapshot = self.store.get_snapshot(fp).await?;
        let labels = snapshot
            .as_ref()
            .map(|snapshot| snapshot.labels.clone())
            .unwrap_or_default();
        let user = self.messenger.get_user(user_id).await?;
        let label = humantime::format_duration(duration).to_string();
        let now = Utc::now();

        let request = SilenceRequest::from_labels(
            &labels,
            duration,
            user.username.clone(),
            format!("Silenced for {label} from chat by @{}", user.username),
            now,
        )?;
        let silence_id = self
            .alertmanager
            .create_silence(&config.alertmanager_url, &request)
            .await?;
        info!(fingerprint = %fp, %silence_id, user = %user.username, "alert silenced");

        let notice = format!("🔕 Silenced for {label} by @{}", user.username);
        let (Some(mut snapshot), Some(handle)) = (snapshot, self.store.get_handle(fp).await?)
        else {
            return Ok(ActionOutcome {
                message: None,
                notice,
            });
        };

        if let Some(callback) = settings.action_url() {
            snapshot
                .rendered
                .attachment
                .actions
                .push(ActionContext::expire(fp, config_id, &silence_id).encode(&callback));
        }
        if let Err(err) = self.save_and_push(fp, &handle, &snapshot).await {
            warn!(fingerprint = %fp, error = %err, "failed to add expire button");
        }
        self.reply(
            &handle,
            &format!(
                "🔕 **Silenced for {label}**\n\nBy: @{}\nUntil: {}",
                user.username,
                format_time(request.ends_at)
            ),
        )
        .await;
        Ok(ActionOutcome {
            message: Some(snapshot.rendered),
            notice,
        })
    }

    async fn expire(
        &self,
        settings: &Settings,
        fp: &Fingerprint,
        config_id: &str,
        silence_id: &str,
        user_id: &str,
    ) -> Result<ActionOutcome> {
        let config = settings
            .config_by_id(config_id)
            .ok_or_else(|| Error::not_found("alert config", config_id))?;
        self.alertmanager
            .expire_silence(&config.alertmanager_url, silence_id)
            .await?;
        let notice = format!("Silence {silence_id} expired.");

        let Some(handle) = self.store.get_handle(fp).await? else {
            return Ok(ActionOutcome {
                message: None,
                notice,
            });
        };
        let user = match self.messenger.get_user(user_id).await {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(user_id, error = %err, "could not resolve expiring user");
                None
            }
        };

        let mut snapshot = self.current(fp, &handle).await?;
        let attachment = &mut snapshot.rendered.attachment;
        remove_expire_button(attachment, silence_id);
        attachment.color = COLOR_EXPIRED.to_string();
        let expired_by = user.as_ref().map_or_else(
            || "Silence expired".to_string(),
            |user: &ChatUser| format!("Silence expired by {}", user.username),
        );
        attachment.fields.push(Field::new("Expired by", expired_by, false));
        self.save_and_push(fp, &handle, &snapshot).await?;

        let actor = user.map_or_else(|| "unknown".to_string(), |user| format!("@{}", user.username));
        self.reply(
            &handle,
            &format!(
                "⏹️ **Silence expired**\n\nSilence: {silence_id}\nBy: {actor}\nAt: {}",
                format_time(Utc::now())
            ),
        )
        .await;
        info!(fingerprint = %fp, silence_id, "silence expired");
        Ok(ActionOutcome {
            message: Some(snapshot.rendered),
            notice,
        })
    }

    async fn require_handle(&self, fp: &Fingerprint) -> Result<MessageHandle> {
        self.store
            .get_handle(fp)
            .await?
            .ok_or_else(|| Error::not_found("alert", fp.as_str()))
    }

    /// The structured message for a live alert: the stored snapshot, or the
    /// platform's copy for alerts recorded without one.
    async fn current(&self, fp: &Fingerprint, handle: &MessageHandle) -> Result<AlertSnapshot> {
        if let Some(snapshot) = self.store.get_snapshot(fp).await? {
            return Ok(snapshot);
        }
        debug!(fingerprint = %fp, message_id = %handle.message_id, "no snapshot, reading message back");
        let rendered = self.messenger.get_message(handle).await?;
        Ok(AlertSnapshot {
            config_id: String::new(),
            state: LifecycleState::Firing,
            severity: String::new(),
            labels: Default::default(),
            rendered,
        })
    }

    /// The store is written first; a platform failure leaves it in place.
    async fn save_and_push(
        &self,
        fp: &Fingerprint,
        handle: &MessageHandle,
        snapshot: &AlertSnapshot,
    ) -> Result<()> {
        self.store.put_snapshot(fp, snapshot).await?;
        self.messenger
            .update_message(handle, &snapshot.rendered)
            .await
            .inspect_err(|err| {
                warn!(
                    fingerprint = %fp,
                    message_id = %handle.message_id,
                    error = %err,
                    "failed to update message"
                );
            })
    }

    async fn reply(&self, handle: &MessageHandle, text: &str) {
        if let Err(err) = self.messenger.create_reply(handle, text).await {
            warn!(message_id = %handle.message_id, error = %err, "failed to post thread reply");
        }
    }
}

fn state_color(settings: &Settings, snapshot: &AlertSnapshot, state: LifecycleState) -> String {
    settings.config_by_id(&snapshot.config_id).map_or_else(
        || match state {
            LifecycleState::Acked => COLOR_ACKNOWLEDGED.to_string(),
            _ => COLOR_FIRING.to_string(),
        },
        |config| resolve_color(config, &snapshot.severity, state),
    )
}

fn resolved_reply(started: DateTime<Utc>, ended: DateTime<Utc>) -> String {
    format!(
        "✅ **Alert Resolved**\n\n**Fired at:** {}\n**Resolved at:** {}\n**Duration:** {}",
        format_time(started),
        format_time(ended),
        short_duration(ended - started)
    )
}
