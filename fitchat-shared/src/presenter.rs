//! Turns the merged view into what the conversation pane shows: calendar-day
//! sections, with the avatar shown once per run of same-sender messages.

use chrono::{Days, NaiveDate};

use crate::models::ChatMessage;

pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedMessage<'a> {
    pub message: &'a ChatMessage,
    pub body: String,
    pub is_own: bool,
    pub show_avatar: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup<'a> {
    pub date: NaiveDate,
    pub label: String,
    pub messages: Vec<PresentedMessage<'a>>,
}

/// Groups `messages` (already ordered by the reconciler) by calendar day.
#[must_use]
pub fn present<'a>(
    messages: &'a [ChatMessage],
    current_user: &str,
    today: NaiveDate,
) -> Vec<DayGroup<'a>> {
    let mut groups: Vec<DayGroup<'a>> = Vec::new();

    for message in messages {
        let date = message.created_at.date();
        let starts_day = groups.last().is_none_or(|group| group.date != date);
        if starts_day {
            groups.push(DayGroup {
                date,
                label: day_label(date, today),
                messages: Vec::new(),
            });
        }

        let Some(group) = groups.last_mut() else {
            continue;
        };
        let show_avatar = group
            .messages
            .last()
            .is_none_or(|previous| previous.message.sender_id != message.sender_id);
        group.messages.push(PresentedMessage {
            message,
            body: message_body(message),
            is_own: message.sender_id == current_user,
            show_avatar,
        });
    }

    groups
}

/// "Today", "Yesterday", or e.g. "Mar 08, 2025".
#[must_use]
pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.checked_sub_days(Days::new(1)) == Some(date) {
        "Yesterday".to_string()
    } else {
        date.format("%b %d, %Y").to_string()
    }
}

/// Text shown for a message bubble.
#[must_use]
pub fn message_body(message: &ChatMessage) -> String {
    if message.is_deleted {
        return DELETED_PLACEHOLDER.to_string();
    }
    match (&message.text, &message.media) {
        (Some(text), Some(media)) => format!("[{}] {text}", media.kind.as_str()),
        (Some(text), None) => text.clone(),
        (None, Some(media)) => format!("[{}] {}", media.kind.as_str(), media.url),
        (None, None) => String::new(),
    }
}
