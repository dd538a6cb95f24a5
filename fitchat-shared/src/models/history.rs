use serde::{Deserialize, Serialize};

use super::ChatMessage;

/// One page of persisted conversation history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub has_more: bool,
}

fn first_page() -> u32 {
    1
}

impl HistoryPage {
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            page: 1,
            has_more: false,
        }
    }
}
