//! The messaging collaborator: trait seam plus the Mattermost REST client.

use async_trait::async_trait;

use crate::Result;
use crate::message::RenderedMessage;
use crate::types::{ChatUser, MessageHandle};

mod client;
mod models;

pub use client::MattermostClient;

/// Operations the lifecycle engine needs from the chat platform.
///
/// Implementations report a message deleted out from under us as
/// `MessagingError::NotFound`; callers never retry it.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn create_message(
        &self,
        channel_id: &str,
        message: &RenderedMessage,
    ) -> Result<MessageHandle>;

    async fn update_message(&self, handle: &MessageHandle, message: &RenderedMessage)
    -> Result<()>;

    async fn get_message(&self, handle: &MessageHandle) -> Result<RenderedMessage>;

    /// Post `text` as a thread reply under the alert's message.
    async fn create_reply(&self, handle: &MessageHandle, text: &str) -> Result<()>;

    async fn get_user(&self, user_id: &str) -> Result<ChatUser>;

    /// Resolve a channel id from team and channel names.
    async fn find_channel(&self, team: &str, channel: &str) -> Result<String>;
}
