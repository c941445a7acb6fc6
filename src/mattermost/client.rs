use std::num::NonZeroUsize;
use std::time::Instant;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::Result;
use crate::config::MattermostSettings;
use crate::error::{ConfigError, MessagingError};
use crate::http::{CORRELATION_HEADER, body_preview, correlation_id, json_client};
use crate::message::RenderedMessage;
use crate::types::{ChatUser, MessageHandle};

use super::Messenger;
use super::models::{Channel, NewPost, Post, PostPatch, User};

/// [`Messenger`] over the Mattermost REST API v4, authenticated as a bot.
pub struct MattermostClient {
    http: reqwest::Client,
    base: Url,
    channels: Mutex<LruCache<(String, String), String>>,
}

impl MattermostClient {
    /// # Errors
    ///
    /// Returns an error when the bot token is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(settings: &MattermostSettings) -> Result<Self> {
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", settings.token.expose_secret()))
                .map_err(|err| ConfigError::InvalidField {
                    field: "mattermost.token".to_string(),
                    message: err.to_string(),
                })?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let http = json_client(headers, settings.request_timeout, settings.connect_timeout)
            .map_err(|source| MessagingError::Client { source })?;
        let capacity = NonZeroUsize::new(settings.channel_cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            http,
            base: settings.url.clone(),
            channels: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ConfigError::InvalidField {
                field: "mattermost.url".to_string(),
                message: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(["api", "v4"])
            .extend(segments);
        Ok(url)
    }

    async fn send<B, T>(&self, method: Method, url: Url, body: Option<&B>, resource: &str) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let correlation_id = correlation_id();
        let started = Instant::now();
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(CORRELATION_HEADER, &correlation_id);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(MessagingError::from)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(MessagingError::from)?;

        if status == StatusCode::NOT_FOUND {
            return Err(MessagingError::NotFound {
                resource: resource.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            warn!(%method, resource, %correlation_id, %status, "mattermost request failed");
            return Err(MessagingError::HttpStatus {
                status,
                body: body_preview(&bytes),
            }
            .into());
        }

        debug!(
            %method,
            resource,
            %correlation_id,
            latency_ms = started.elapsed().as_millis(),
            "mattermost call succeeded"
        );
        serde_json::from_slice(&bytes).map_err(|err| {
            MessagingError::Json {
                message: format!("{err}; body preview: {}", body_preview(&bytes)),
            }
            .into()
        })
    }
}

#[async_trait]
impl Messenger for MattermostClient {
    async fn create_message(
        &self,
        channel_id: &str,
        message: &RenderedMessage,
    ) -> Result<MessageHandle> {
        let body = NewPost {
            channel_id,
            message: &message.text,
            root_id: "",
            props: message.props(),
        };
        let resource = format!("channel {channel_id}");
        let post: Post = self
            .send(Method::POST, self.url(&["posts"])?, Some(&body), &resource)
            .await?;
        let channel_id = if post.channel_id.is_empty() {
            channel_id.to_string()
        } else {
            post.channel_id
        };
        Ok(MessageHandle {
            message_id: post.id,
            channel_id,
        })
    }

    async fn update_message(
        &self,
        handle: &MessageHandle,
        message: &RenderedMessage,
    ) -> Result<()> {
        let body = PostPatch {
            id: &handle.message_id,
            message: &message.text,
            props: message.props(),
        };
        let resource = format!("post {}", handle.message_id);
        let url = self.url(&["posts", &handle.message_id])?;
        let _: Post = self.send(Method::PUT, url, Some(&body), &resource).await?;
        Ok(())
    }

    async fn get_message(&self, handle: &MessageHandle) -> Result<RenderedMessage> {
        let resource = format!("post {}", handle.message_id);
        let url = self.url(&["posts", &handle.message_id])?;
        let post: Post = self.send::<(), _>(Method::GET, url, None, &resource).await?;
        Ok(post.into())
    }

    async fn create_reply(&self, handle: &MessageHandle, text: &str) -> Result<()> {
        let body = NewPost {
            channel_id: &handle.channel_id,
            message: text,
            root_id: &handle.message_id,
            props: serde_json::Value::Null,
        };
        let resource = format!("post {}", handle.message_id);
        let _: Post = self
            .send(Method::POST, self.url(&["posts"])?, Some(&body), &resource)
            .await?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<ChatUser> {
        let resource = format!("user {user_id}");
        let url = self.url(&["users", user_id])?;
        let user: User = self.send::<(), _>(Method::GET, url, None, &resource).await?;
        Ok(ChatUser {
            id: user.id,
            username: user.username,
        })
    }

    async fn find_channel(&self, team: &str, channel: &str) -> Result<String> {
        let key = (team.to_string(), channel.to_string());
        let cached = self.channels.lock().get(&key).cloned();
        if let Some(id) = cached {
            return Ok(id);
        }

        let resource = format!("channel {team}/{channel}");
        let url = self.url(&["teams", "name", team, "channels", "name", channel])?;
        let found: Channel = self.send::<(), _>(Method::GET, url, None, &resource).await?;
        self.channels.lock().put(key, found.id.clone());
        Ok(found.id)
    }
}
