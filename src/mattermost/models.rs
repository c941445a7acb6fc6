use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Attachment, RenderedMessage};

#[derive(Debug, Serialize)]
pub(super) struct NewPost<'a> {
    pub(super) channel_id: &'a str,
    pub(super) message: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub(super) root_id: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub(super) props: Value,
}

#[derive(Debug, Serialize)]
pub(super) struct PostPatch<'a> {
    pub(super) id: &'a str,
    pub(super) message: &'a str,
    pub(super) props: Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct Post {
    pub(super) id: String,
    #[serde(default)]
    pub(super) channel_id: String,
    #[serde(default)]
    pub(super) message: String,
    #[serde(default)]
    pub(super) props: PostProps,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct PostProps {
    #[serde(default)]
    pub(super) attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub(super) struct User {
    pub(super) id: String,
    pub(super) username: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Channel {
    pub(super) id: String,
}

impl From<Post> for RenderedMessage {
    fn from(post: Post) -> Self {
        Self {
            text: post.message,
            attachment: post.props.attachments.into_iter().next().unwrap_or_default(),
        }
    }
}
