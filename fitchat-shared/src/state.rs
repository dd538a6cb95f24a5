//! Everything the client knows about the open conversation, and the dispatch
//! of live events to the part that owns them.

use tracing::{debug, warn};

use crate::{
    models::{HistoryPage, LiveEvent, StreamErrorEvent, Timestamp},
    presence::PresenceBoard,
    reconcile::{ApplyOutcome, ConversationScope, Reconciler},
};

/// What changed after a live event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Messages(ApplyOutcome),
    Presence,
    Typing,
    StreamError(StreamErrorEvent),
    Unchanged,
}

#[derive(Debug)]
pub struct ConversationState {
    pub messages: Reconciler,
    pub presence: PresenceBoard,
}

impl ConversationState {
    #[must_use]
    pub fn new(scope: ConversationScope) -> Self {
        Self {
            messages: Reconciler::new(scope),
            presence: PresenceBoard::new(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &ConversationScope {
        self.messages.scope()
    }

    pub fn replace_history(&mut self, page: HistoryPage) {
        self.messages.replace_history(page);
    }

    /// Routes one live event.
    pub fn handle(&mut self, event: LiveEvent, now: Timestamp) -> StateChange {
        match event {
            LiveEvent::PresenceUpdate { payload } => {
                self.presence.apply_presence(payload);
                StateChange::Presence
            }
            LiveEvent::TypingUpdate { payload } => {
                let scope = self.messages.scope();
                if payload.user_id == scope.participant
                    && payload.receiver_id == scope.current_user
                {
                    self.presence.apply_typing(&payload, now);
                    StateChange::Typing
                } else {
                    StateChange::Unchanged
                }
            }
            LiveEvent::Error { payload } => {
                warn!(code = %payload.code, message = %payload.message, "live channel error");
                StateChange::StreamError(payload)
            }
            other => match self.messages.apply(other) {
                ApplyOutcome::Ignored => StateChange::Unchanged,
                outcome => {
                    debug!(?outcome, merged = self.messages.len(), "messages changed");
                    StateChange::Messages(outcome)
                }
            },
        }
    }
}
