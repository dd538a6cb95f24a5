use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::Timestamp;

/// Prefix of client-generated temporary message ids.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Delivery state of a message as seen by its sender.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Sent,
    Read,
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Read => write!(f, "read"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }
}

/// Media attached to a message. The upload itself happens elsewhere; only the
/// resulting URL travels with the message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaAttachment {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
}

/// One emoji and everyone who reacted with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// A direct message between two participants.
///
/// A message rendered optimistically carries only `temp_id`; the server's
/// confirmation carries both the permanent `id` and the `temp_id` it
/// supersedes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl ChatMessage {
    /// Server id when the message has been persisted, otherwise its temporary id.
    #[must_use]
    pub fn resolved_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.temp_id.as_deref())
    }

    /// Every identifier this message can be matched by.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.id.as_deref().into_iter().chain(self.temp_id.as_deref())
    }

    /// True when both records describe the same logical message.
    #[must_use]
    pub fn same_message(&self, other: &ChatMessage) -> bool {
        self.keys().any(|key| other.keys().any(|candidate| candidate == key))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }

    /// Timestamp of the most recent change, falling back to creation time.
    #[must_use]
    pub fn last_modified(&self) -> Timestamp {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Soft-delete: the entry keeps its place but loses its content.
    pub fn mark_deleted(&mut self, at: Timestamp) {
        self.is_deleted = true;
        self.text = None;
        self.media = None;
        self.reactions.clear();
        self.touch(at);
    }

    /// Moves `updated_at` forward to `at`; never backwards.
    pub fn touch(&mut self, at: Timestamp) {
        self.updated_at = Some(self.updated_at.map_or(at, |current| current.max(at)));
    }
}

/// Payload posted to the server when sending a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub temp_id: String,
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl OutgoingMessage {
    /// A text message with a freshly generated temporary id.
    pub fn text(receiver_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            temp_id: format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()),
            receiver_id: receiver_id.into(),
            text: Some(text.into()),
            media: None,
            reply_to: None,
        }
    }

    #[must_use]
    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media = Some(media);
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    /// The message as rendered before the server acknowledges it.
    #[must_use]
    pub fn optimistic(&self, sender_id: &str, now: Timestamp) -> ChatMessage {
        ChatMessage {
            id: None,
            temp_id: Some(self.temp_id.clone()),
            sender_id: sender_id.to_string(),
            receiver_id: self.receiver_id.clone(),
            text: self.text.clone(),
            media: self.media.clone(),
            reply_to: self.reply_to.clone(),
            created_at: now,
            updated_at: None,
            is_deleted: false,
            reactions: Vec::new(),
            status: DeliveryStatus::Sent,
        }
    }
}
