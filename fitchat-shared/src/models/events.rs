use serde::{Deserialize, Serialize};

use super::{ChatMessage, PresenceUpdate, Reaction, Timestamp};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedEvent {
    pub message_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub deleted_at: Timestamp,
}

/// Full reaction list of a message after a change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionEvent {
    pub message_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub reactions: Vec<Reaction>,
    pub updated_at: Timestamp,
}

/// `reader_id` has read everything `sender_id` sent them up to `read_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptEvent {
    pub reader_id: String,
    pub sender_id: String,
    pub read_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub user_id: String,
    pub receiver_id: String,
    pub is_typing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamErrorEvent {
    pub code: String,
    pub message: String,
}

/// Everything the live channel can push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum LiveEvent {
    #[serde(rename = "message.new")]
    MessageNew { payload: ChatMessage },
    /// Server acknowledgment of an optimistic send: carries the permanent id
    /// and the temporary id it supersedes.
    #[serde(rename = "message.confirmed")]
    MessageConfirmed { payload: ChatMessage },
    #[serde(rename = "message.updated")]
    MessageUpdated { payload: ChatMessage },
    #[serde(rename = "message.deleted")]
    MessageDeleted { payload: MessageDeletedEvent },
    #[serde(rename = "message.reaction")]
    MessageReaction { payload: ReactionEvent },
    #[serde(rename = "message.read")]
    MessageRead { payload: ReadReceiptEvent },
    #[serde(rename = "typing.update")]
    TypingUpdate { payload: TypingEvent },
    #[serde(rename = "presence.update")]
    PresenceUpdate { payload: PresenceUpdate },
    #[serde(rename = "error")]
    Error { payload: StreamErrorEvent },
}

impl LiveEvent {
    /// Event name as used on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MessageNew { .. } => "message.new",
            Self::MessageConfirmed { .. } => "message.confirmed",
            Self::MessageUpdated { .. } => "message.updated",
            Self::MessageDeleted { .. } => "message.deleted",
            Self::MessageReaction { .. } => "message.reaction",
            Self::MessageRead { .. } => "message.read",
            Self::TypingUpdate { .. } => "typing.update",
            Self::PresenceUpdate { .. } => "presence.update",
            Self::Error { .. } => "error",
        }
    }

    /// The two users a conversation-scoped event belongs to. Presence and
    /// error events are not scoped to a conversation.
    #[must_use]
    pub fn participants(&self) -> Option<(&str, &str)> {
        match self {
            Self::MessageNew { payload }
            | Self::MessageConfirmed { payload }
            | Self::MessageUpdated { payload } => {
                Some((payload.sender_id.as_str(), payload.receiver_id.as_str()))
            }
            Self::MessageDeleted { payload } => {
                Some((payload.sender_id.as_str(), payload.receiver_id.as_str()))
            }
            Self::MessageReaction { payload } => {
                Some((payload.sender_id.as_str(), payload.receiver_id.as_str()))
            }
            Self::MessageRead { payload } => {
                Some((payload.reader_id.as_str(), payload.sender_id.as_str()))
            }
            Self::TypingUpdate { payload } => {
                Some((payload.user_id.as_str(), payload.receiver_id.as_str()))
            }
            Self::PresenceUpdate { .. } | Self::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_confirmation() {
        let json = r#"{
            "type": "message.confirmed",
            "payload": {
                "_id": "42",
                "tempId": "temp-9",
                "senderId": "client-7",
                "receiverId": "trainer-1",
                "text": "done with set 3",
                "createdAt": "2025-03-08T14:00:00Z"
            }
        }"#;

        let event: LiveEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.name(), "message.confirmed");
        assert_eq!(event.participants(), Some(("client-7", "trainer-1")));
        let LiveEvent::MessageConfirmed { payload } = event else {
            panic!("expected confirmation");
        };
        assert_eq!(payload.id.as_deref(), Some("42"));
        assert_eq!(payload.temp_id.as_deref(), Some("temp-9"));
    }

    #[test]
    fn presence_is_not_conversation_scoped() {
        let json = r#"{"type":"presence.update","payload":{"userId":"trainer-1","status":"online"}}"#;
        let event: LiveEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.name(), "presence.update");
        assert!(event.participants().is_none());
    }

    #[test]
    fn read_receipt_scopes_to_reader_and_author() {
        let json = r#"{"type":"message.read","payload":{
            "readerId":"client-7","senderId":"trainer-1","readAt":"2025-03-08T15:00:00Z"}}"#;
        let event: LiveEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.participants(), Some(("client-7", "trainer-1")));
    }

    #[test]
    fn unknown_event_types_fail_to_decode() {
        let json = r#"{"type":"post.liked","payload":{}}"#;
        assert!(serde_json::from_str::<LiveEvent>(json).is_err());
    }
}
