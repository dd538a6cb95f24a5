//! # Message reconciliation
//!
//! Merges a page of persisted history with messages that arrived over the
//! live channel into one view for a single conversation.
//!
//! The merged view holds two invariants:
//! - no two entries describe the same logical message (a temporary id and the
//!   permanent id that confirms it collapse into one entry);
//! - entries are ordered by creation time, ties keeping arrival order.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::models::{ChatMessage, DeliveryStatus, HistoryPage, LiveEvent, Timestamp};

/// The two users whose direct conversation is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationScope {
    pub current_user: String,
    pub participant: String,
}

impl ConversationScope {
    pub fn new(current_user: impl Into<String>, participant: impl Into<String>) -> Self {
        Self {
            current_user: current_user.into(),
            participant: participant.into(),
        }
    }

    /// True when `a` and `b` are exactly this conversation's two users.
    #[must_use]
    pub fn contains(&self, a: &str, b: &str) -> bool {
        (a == self.current_user && b == self.participant)
            || (a == self.participant && b == self.current_user)
    }
}

/// What the viewport should do after a new message lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAction {
    None,
    ScrollToBottom,
    /// The reader is scrolled up; the unseen counter now holds this value.
    MarkUnseen(u32),
}

/// Result of applying one live event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Out of scope, not a message event, or carries no usable id.
    Ignored,
    Inserted { scroll: ScrollAction },
    Updated,
    /// A delete or reaction for a message this view has never seen.
    Missing,
}

/// Client-side merge of history and live messages for one conversation.
#[derive(Debug)]
pub struct Reconciler {
    scope: ConversationScope,
    history: Vec<ChatMessage>,
    live: Vec<ChatMessage>,
    /// Per author: everything they sent is read up to this instant.
    read_marks: HashMap<String, Timestamp>,
    merged: Vec<ChatMessage>,
    at_bottom: bool,
    unseen: u32,
}

impl Reconciler {
    #[must_use]
    pub fn new(scope: ConversationScope) -> Self {
        Self {
            scope,
            history: Vec::new(),
            live: Vec::new(),
            read_marks: HashMap::new(),
            merged: Vec::new(),
            at_bottom: true,
            unseen: 0,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &ConversationScope {
        &self.scope
    }

    /// The merged, ordered view.
    #[must_use]
    pub fn merged(&self) -> &[ChatMessage] {
        &self.merged
    }

    /// Looks an entry up by server id or temporary id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.merged
            .iter()
            .find(|message| message.keys().any(|key| key == id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    #[must_use]
    pub fn unseen(&self) -> u32 {
        self.unseen
    }

    #[must_use]
    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    /// Records where the reader is; reaching the bottom clears the unseen
    /// counter. Only views with a scrollable viewport call this; the terminal
    /// client stays at the bottom.
    pub fn set_at_bottom(&mut self, at_bottom: bool) {
        self.at_bottom = at_bottom;
        if at_bottom {
            self.unseen = 0;
        }
    }

    /// Installs a freshly fetched history page.
    ///
    /// Live entries the page already covers are dropped from the live buffer,
    /// unless the live copy is deleted and the persisted one is not.
    pub fn replace_history(&mut self, page: HistoryPage) {
        self.history = self.in_scope(page.messages);
        let history = &self.history;
        let before = self.live.len();
        self.live.retain(|live| {
            !history.iter().any(|persisted| {
                persisted.same_message(live) && !supersedes(live, persisted)
            })
        });
        debug!(
            history = self.history.len(),
            superseded = before - self.live.len(),
            "history replaced"
        );
        self.rebuild();
    }

    /// Adds an older history page to the history buffer.
    pub fn extend_history(&mut self, page: HistoryPage) {
        for message in self.in_scope(page.messages) {
            merge_into(&mut self.history, message);
        }
        self.rebuild();
    }

    /// Inserts a message composed locally, before the server has seen it.
    pub fn push_local(&mut self, message: ChatMessage) -> ApplyOutcome {
        self.apply(LiveEvent::MessageNew { payload: message })
    }

    /// Applies one live event to the view.
    pub fn apply(&mut self, event: LiveEvent) -> ApplyOutcome {
        let in_scope = event
            .participants()
            .is_some_and(|(a, b)| self.scope.contains(a, b));
        if !in_scope {
            trace!(event = event.name(), "ignoring out-of-scope event");
            return ApplyOutcome::Ignored;
        }

        match event {
            LiveEvent::MessageNew { payload } | LiveEvent::MessageConfirmed { payload } => {
                self.upsert(payload, true)
            }
            LiveEvent::MessageUpdated { payload } => self.upsert(payload, false),
            LiveEvent::MessageDeleted { payload } => {
                self.mutate(&payload.message_id, |message| {
                    message.mark_deleted(payload.deleted_at);
                })
            }
            LiveEvent::MessageReaction { payload } => {
                if self.get(&payload.message_id).is_some_and(|m| m.is_deleted) {
                    debug!(message_id = %payload.message_id, "reaction on deleted message");
                    return ApplyOutcome::Ignored;
                }
                self.mutate(&payload.message_id, |message| {
                    message.reactions = payload.reactions;
                    message.touch(payload.updated_at);
                })
            }
            LiveEvent::MessageRead { payload } => {
                let mark = self.read_marks.entry(payload.sender_id).or_insert(payload.read_at);
                if payload.read_at > *mark {
                    *mark = payload.read_at;
                }
                self.rebuild();
                ApplyOutcome::Updated
            }
            LiveEvent::TypingUpdate { .. }
            | LiveEvent::PresenceUpdate { .. }
            | LiveEvent::Error { .. } => ApplyOutcome::Ignored,
        }
    }

    fn in_scope(&self, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        messages
            .into_iter()
            .filter(|message| {
                message.resolved_id().is_some()
                    && self.scope.contains(&message.sender_id, &message.receiver_id)
            })
            .collect()
    }

    fn upsert(&mut self, message: ChatMessage, announce: bool) -> ApplyOutcome {
        if message.resolved_id().is_none() {
            debug!(sender = %message.sender_id, "dropping live message without an id");
            return ApplyOutcome::Ignored;
        }

        let known = self.merged.iter().any(|entry| entry.same_message(&message));
        let from_remote = message.sender_id == self.scope.participant;
        merge_into(&mut self.live, message);
        self.rebuild();

        if known {
            return ApplyOutcome::Updated;
        }
        let scroll = if !announce {
            ScrollAction::None
        } else if from_remote && !self.at_bottom {
            self.unseen += 1;
            ScrollAction::MarkUnseen(self.unseen)
        } else {
            ScrollAction::ScrollToBottom
        };
        ApplyOutcome::Inserted { scroll }
    }

    /// Edits the live copy of a message, pulling it from history first when
    /// the live buffer does not hold it yet.
    fn mutate(&mut self, id: &str, edit: impl FnOnce(&mut ChatMessage)) -> ApplyOutcome {
        let matches = |message: &ChatMessage| message.keys().any(|key| key == id);

        let index = match self.live.iter().position(|message| matches(message)) {
            Some(index) => index,
            None => {
                let Some(persisted) = self.history.iter().find(|message| matches(*message)) else {
                    debug!(message_id = id, "mutation for unknown message");
                    return ApplyOutcome::Missing;
                };
                self.live.push(persisted.clone());
                self.live.len() - 1
            }
        };

        edit(&mut self.live[index]);
        self.rebuild();
        ApplyOutcome::Updated
    }

    fn rebuild(&mut self) {
        let mut view = Vec::with_capacity(self.history.len() + self.live.len());
        for message in self.history.iter().chain(self.live.iter()) {
            merge_into(&mut view, message.clone());
        }

        for message in &mut view {
            if let Some(read_at) = self.read_marks.get(&message.sender_id)
                && message.created_at <= *read_at
            {
                message.status = DeliveryStatus::Read;
            }
        }

        // `sort_by` is stable: equal timestamps keep insertion order.
        view.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.merged = view;
    }
}

/// Whether `candidate` should replace `current`, two copies of one message.
///
/// A copy carrying the server id beats a pending one regardless of clocks. A
/// deleted copy beats a live one: deletion is final. Otherwise the strictly
/// newer revision wins.
fn supersedes(candidate: &ChatMessage, current: &ChatMessage) -> bool {
    match (candidate.id.is_some(), current.id.is_some()) {
        (true, false) => return true,
        (false, true) => return false,
        _ => {}
    }
    if candidate.is_deleted != current.is_deleted {
        return candidate.is_deleted;
    }
    candidate.last_modified() > current.last_modified()
}

/// Merges `incoming` into `entries`: the first matching entry is replaced in
/// place, any further matches collapse into it, and an unmatched message is
/// appended. An existing copy that [`supersedes`] `incoming` is kept.
fn merge_into(entries: &mut Vec<ChatMessage>, incoming: ChatMessage) {
    let matches: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.same_message(&incoming))
        .map(|(index, _)| index)
        .collect();

    let Some((&first, rest)) = matches.split_first() else {
        entries.push(incoming);
        return;
    };

    let mut winner = incoming;
    for &index in std::iter::once(&first).chain(rest) {
        let existing = &entries[index];
        let keep_existing = supersedes(existing, &winner);
        let id = winner.id.take().or_else(|| existing.id.clone());
        let temp_id = winner.temp_id.take().or_else(|| existing.temp_id.clone());
        if keep_existing {
            winner = existing.clone();
        }
        winner.id = id;
        winner.temp_id = temp_id;
    }

    entries[first] = winner;
    for &index in rest.iter().rev() {
        entries.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        MessageDeletedEvent, Reaction, ReactionEvent, ReadReceiptEvent, TypingEvent,
    };
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    const ME: &str = "trainer-1";
    const THEM: &str = "client-7";

    fn at(seconds: u32) -> Timestamp {
        Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 0, seconds).unwrap())
    }

    fn message(
        id: Option<&str>,
        temp_id: Option<&str>,
        from: &str,
        text: &str,
        created: u32,
    ) -> ChatMessage {
        let to = if from == ME { THEM } else { ME };
        ChatMessage {
            id: id.map(str::to_string),
            temp_id: temp_id.map(str::to_string),
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            text: Some(text.to_string()),
            media: None,
            reply_to: None,
            created_at: at(created),
            updated_at: None,
            is_deleted: false,
            reactions: Vec::new(),
            status: DeliveryStatus::Sent,
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(ConversationScope::new(ME, THEM))
    }

    fn assert_invariants(reconciler: &Reconciler) {
        let mut seen = HashSet::new();
        for entry in reconciler.merged() {
            let id = entry.resolved_id().expect("merged entries carry an id");
            assert!(seen.insert(id.to_string()), "duplicate entry for {id}");
        }
        for pair in reconciler.merged().windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at, "entries out of order");
        }
    }

    fn texts(reconciler: &Reconciler) -> Vec<&str> {
        reconciler
            .merged()
            .iter()
            .map(|entry| entry.text.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn live_update_replaces_history_entry() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![message(Some("1"), None, THEM, "old", 0)]));

        let mut edited = message(Some("1"), None, THEM, "new", 0);
        edited.updated_at = Some(at(30));
        let outcome = reconciler.apply(LiveEvent::MessageUpdated { payload: edited });

        assert_eq!(outcome, ApplyOutcome::Updated);
        assert_eq!(reconciler.len(), 1);
        assert_eq!(reconciler.get("1").and_then(|m| m.text.as_deref()), Some("new"));
        assert_invariants(&reconciler);
    }

    #[test]
    fn same_revision_from_live_wins_over_history() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![message(Some("1"), None, THEM, "old", 0)]));
        reconciler.apply(LiveEvent::MessageUpdated {
            payload: message(Some("1"), None, THEM, "new", 0),
        });

        assert_eq!(texts(&reconciler), vec!["new"]);
    }

    #[test]
    fn confirmation_collapses_temporary_entry() {
        let mut reconciler = reconciler();
        let outcome = reconciler.apply(LiveEvent::MessageNew {
            payload: message(None, Some("temp-9"), ME, "on my way", 5),
        });
        assert_eq!(
            outcome,
            ApplyOutcome::Inserted {
                scroll: ScrollAction::ScrollToBottom
            }
        );

        let outcome = reconciler.apply(LiveEvent::MessageConfirmed {
            payload: message(Some("42"), Some("temp-9"), ME, "on my way", 5),
        });

        assert_eq!(outcome, ApplyOutcome::Updated);
        assert_eq!(reconciler.len(), 1);
        let entry = &reconciler.merged()[0];
        assert_eq!(entry.resolved_id(), Some("42"));
        assert_eq!(entry.temp_id.as_deref(), Some("temp-9"));
        assert!(reconciler.get("temp-9").is_some());
        assert_invariants(&reconciler);
    }

    #[test]
    fn echo_before_confirmation_still_collapses() {
        let mut reconciler = reconciler();
        reconciler.push_local(message(None, Some("temp-9"), ME, "hi", 5));
        // Server broadcasts the stored copy before acknowledging the send.
        reconciler.apply(LiveEvent::MessageNew {
            payload: message(Some("42"), None, ME, "hi", 5),
        });
        assert_eq!(reconciler.len(), 2);

        reconciler.apply(LiveEvent::MessageConfirmed {
            payload: message(Some("42"), Some("temp-9"), ME, "hi", 5),
        });

        assert_eq!(reconciler.len(), 1);
        assert_eq!(reconciler.merged()[0].resolved_id(), Some("42"));
        assert_invariants(&reconciler);
    }

    #[test]
    fn refetched_history_supersedes_confirmed_live_entry() {
        let mut reconciler = reconciler();
        reconciler.push_local(message(None, Some("temp-9"), ME, "hi", 5));
        reconciler.apply(LiveEvent::MessageConfirmed {
            payload: message(Some("42"), Some("temp-9"), ME, "hi", 5),
        });

        reconciler.replace_history(HistoryPage::new(vec![
            message(Some("41"), None, THEM, "ready?", 1),
            message(Some("42"), None, ME, "hi", 5),
        ]));

        assert_eq!(texts(&reconciler), vec!["ready?", "hi"]);
        assert_invariants(&reconciler);
    }

    #[test]
    fn pending_messages_survive_history_refresh() {
        let mut reconciler = reconciler();
        reconciler.push_local(message(None, Some("temp-3"), ME, "still sending", 9));
        reconciler.replace_history(HistoryPage::new(vec![message(Some("1"), None, THEM, "yo", 1)]));

        assert_eq!(texts(&reconciler), vec!["yo", "still sending"]);
        assert!(reconciler.merged()[1].is_pending());
    }

    #[test]
    fn out_of_scope_events_are_ignored() {
        let mut reconciler = reconciler();
        let mut foreign = message(Some("7"), None, THEM, "wrong chat", 0);
        foreign.receiver_id = "trainer-2".into();

        assert_eq!(
            reconciler.apply(LiveEvent::MessageNew { payload: foreign }),
            ApplyOutcome::Ignored
        );
        assert!(reconciler.is_empty());
    }

    #[test]
    fn out_of_scope_history_is_filtered() {
        let mut reconciler = reconciler();
        let mut foreign = message(Some("7"), None, THEM, "wrong chat", 0);
        foreign.sender_id = "client-8".into();
        reconciler.replace_history(HistoryPage::new(vec![
            foreign,
            message(Some("8"), None, THEM, "right chat", 1),
        ]));

        assert_eq!(texts(&reconciler), vec!["right chat"]);
    }

    #[test]
    fn messages_without_ids_are_ignored() {
        let mut reconciler = reconciler();
        let outcome = reconciler.apply(LiveEvent::MessageNew {
            payload: message(None, None, THEM, "?", 0),
        });
        assert_eq!(outcome, ApplyOutcome::Ignored);
        assert!(reconciler.is_empty());
    }

    #[test]
    fn ties_keep_arrival_order() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![
            message(Some("b"), None, THEM, "second", 3),
            message(Some("a"), None, THEM, "first", 3),
        ]));
        reconciler.apply(LiveEvent::MessageNew {
            payload: message(Some("c"), None, THEM, "third", 3),
        });
        reconciler.apply(LiveEvent::MessageNew {
            payload: message(Some("z"), None, THEM, "earliest", 1),
        });

        assert_eq!(texts(&reconciler), vec!["earliest", "second", "first", "third"]);
        assert_invariants(&reconciler);
    }

    #[test]
    fn remote_messages_count_as_unseen_when_scrolled_up() {
        let mut reconciler = reconciler();
        reconciler.set_at_bottom(false);

        let first = reconciler.apply(LiveEvent::MessageNew {
            payload: message(Some("1"), None, THEM, "a", 0),
        });
        let second = reconciler.apply(LiveEvent::MessageNew {
            payload: message(Some("2"), None, THEM, "b", 1),
        });
        assert_eq!(first, ApplyOutcome::Inserted { scroll: ScrollAction::MarkUnseen(1) });
        assert_eq!(second, ApplyOutcome::Inserted { scroll: ScrollAction::MarkUnseen(2) });

        // Own messages never count.
        let own = reconciler.push_local(message(None, Some("temp-1"), ME, "c", 2));
        assert_eq!(own, ApplyOutcome::Inserted { scroll: ScrollAction::ScrollToBottom });
        assert_eq!(reconciler.unseen(), 2);

        reconciler.set_at_bottom(true);
        assert_eq!(reconciler.unseen(), 0);
        let next = reconciler.apply(LiveEvent::MessageNew {
            payload: message(Some("3"), None, THEM, "d", 3),
        });
        assert_eq!(next, ApplyOutcome::Inserted { scroll: ScrollAction::ScrollToBottom });
    }

    #[test]
    fn deletion_soft_deletes_history_entry() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![
            message(Some("1"), None, THEM, "keep", 0),
            message(Some("2"), None, THEM, "drop", 1),
        ]));

        let outcome = reconciler.apply(LiveEvent::MessageDeleted {
            payload: MessageDeletedEvent {
                message_id: "2".into(),
                sender_id: THEM.into(),
                receiver_id: ME.into(),
                deleted_at: at(20),
            },
        });

        assert_eq!(outcome, ApplyOutcome::Updated);
        assert_eq!(reconciler.len(), 2);
        let deleted = reconciler.get("2").unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.text.is_none());

        // A stale refetch does not resurrect the text.
        reconciler.replace_history(HistoryPage::new(vec![
            message(Some("1"), None, THEM, "keep", 0),
            message(Some("2"), None, THEM, "drop", 1),
        ]));
        assert!(reconciler.get("2").unwrap().is_deleted);
        assert_invariants(&reconciler);
    }

    #[test]
    fn deletion_of_unknown_message_is_reported() {
        let mut reconciler = reconciler();
        let outcome = reconciler.apply(LiveEvent::MessageDeleted {
            payload: MessageDeletedEvent {
                message_id: "404".into(),
                sender_id: THEM.into(),
                receiver_id: ME.into(),
                deleted_at: at(20),
            },
        });
        assert_eq!(outcome, ApplyOutcome::Missing);
    }

    #[test]
    fn reaction_replaces_reaction_list() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![message(Some("1"), None, ME, "PR!", 0)]));

        let reactions = vec![Reaction {
            emoji: "🔥".into(),
            user_ids: vec![THEM.into()],
        }];
        reconciler.apply(LiveEvent::MessageReaction {
            payload: ReactionEvent {
                message_id: "1".into(),
                sender_id: ME.into(),
                receiver_id: THEM.into(),
                reactions: reactions.clone(),
                updated_at: at(10),
            },
        });
        assert_eq!(reconciler.get("1").unwrap().reactions, reactions);

        reconciler.apply(LiveEvent::MessageReaction {
            payload: ReactionEvent {
                message_id: "1".into(),
                sender_id: ME.into(),
                receiver_id: THEM.into(),
                reactions: Vec::new(),
                updated_at: at(11),
            },
        });
        assert!(reconciler.get("1").unwrap().reactions.is_empty());
    }

    #[test]
    fn read_receipt_marks_own_messages_up_to_read_time() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![
            message(Some("1"), None, ME, "a", 0),
            message(Some("2"), None, THEM, "b", 1),
            message(Some("3"), None, ME, "c", 5),
        ]));

        reconciler.apply(LiveEvent::MessageRead {
            payload: ReadReceiptEvent {
                reader_id: THEM.into(),
                sender_id: ME.into(),
                read_at: at(2),
            },
        });

        let statuses: Vec<DeliveryStatus> =
            reconciler.merged().iter().map(|m| m.status).collect();
        assert_eq!(
            statuses,
            vec![DeliveryStatus::Read, DeliveryStatus::Sent, DeliveryStatus::Sent]
        );

        // An older receipt does not roll the watermark back.
        reconciler.apply(LiveEvent::MessageRead {
            payload: ReadReceiptEvent {
                reader_id: THEM.into(),
                sender_id: ME.into(),
                read_at: at(0),
            },
        });
        assert_eq!(reconciler.get("1").unwrap().status, DeliveryStatus::Read);
    }

    #[test]
    fn typing_events_do_not_touch_messages() {
        let mut reconciler = reconciler();
        let outcome = reconciler.apply(LiveEvent::TypingUpdate {
            payload: TypingEvent {
                user_id: THEM.into(),
                receiver_id: ME.into(),
                is_typing: true,
                expires_at: None,
            },
        });
        assert_eq!(outcome, ApplyOutcome::Ignored);
    }

    #[test]
    fn older_pages_extend_history() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![message(Some("5"), None, THEM, "new", 50)]));
        reconciler.extend_history(HistoryPage {
            messages: vec![
                message(Some("4"), None, ME, "older", 40),
                message(Some("5"), None, THEM, "new", 50),
            ],
            page: 2,
            has_more: false,
        });

        assert_eq!(texts(&reconciler), vec!["older", "new"]);
        assert_invariants(&reconciler);
    }

    #[test]
    fn interleaved_sources_keep_invariants() {
        let mut reconciler = reconciler();
        for round in 0..20u32 {
            let from = if round % 2 == 0 { ME } else { THEM };
            let temp = format!("temp-{round}");
            let id = format!("{}", 100 + round);
            let created = 59 - (round * 7) % 60;

            reconciler.push_local(message(None, Some(temp.as_str()), from, "draft", created));
            if round % 3 != 0 {
                reconciler.apply(LiveEvent::MessageConfirmed {
                    payload: message(Some(id.as_str()), Some(temp.as_str()), from, "sent", created),
                });
            }
            if round % 4 == 0 {
                let persisted: Vec<ChatMessage> = reconciler
                    .merged()
                    .iter()
                    .filter(|m| m.id.is_some())
                    .map(|m| {
                        let mut copy = m.clone();
                        copy.temp_id = None;
                        copy
                    })
                    .collect();
                reconciler.replace_history(HistoryPage::new(persisted));
            }
            assert_invariants(&reconciler);
        }
    }

    fn reaction(message_id: &str, emoji: &str, updated: u32) -> LiveEvent {
        LiveEvent::MessageReaction {
            payload: ReactionEvent {
                message_id: message_id.into(),
                sender_id: THEM.into(),
                receiver_id: ME.into(),
                reactions: vec![Reaction {
                    emoji: emoji.into(),
                    user_ids: vec![ME.into()],
                }],
                updated_at: at(updated),
            },
        }
    }

    fn deletion(message_id: &str, deleted: u32) -> LiveEvent {
        LiveEvent::MessageDeleted {
            payload: MessageDeletedEvent {
                message_id: message_id.into(),
                sender_id: THEM.into(),
                receiver_id: ME.into(),
                deleted_at: at(deleted),
            },
        }
    }

    fn ids(reconciler: &Reconciler) -> Vec<&str> {
        reconciler
            .merged()
            .iter()
            .filter_map(ChatMessage::resolved_id)
            .collect()
    }

    #[test]
    fn confirmation_wins_when_server_clock_is_behind() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![message(Some("41"), None, THEM, "ready?", 7)]));
        reconciler.push_local(message(None, Some("temp-9"), ME, "yes", 10));
        assert_eq!(ids(&reconciler), vec!["41", "temp-9"]);

        reconciler.apply(LiveEvent::MessageConfirmed {
            payload: message(Some("42"), Some("temp-9"), ME, "yes", 5),
        });
        assert_eq!(reconciler.get("42").unwrap().created_at, at(5));
        assert_eq!(ids(&reconciler), vec!["42", "41"]);

        reconciler.replace_history(HistoryPage::new(vec![
            message(Some("42"), None, ME, "yes", 5),
            message(Some("41"), None, THEM, "ready?", 7),
        ]));
        assert_eq!(reconciler.get("42").unwrap().created_at, at(5));
        assert_eq!(ids(&reconciler), vec!["42", "41"]);
        assert_invariants(&reconciler);
    }

    #[test]
    fn confirmation_wins_when_server_clock_is_ahead() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![message(Some("41"), None, THEM, "ready?", 7)]));
        reconciler.push_local(message(None, Some("temp-9"), ME, "yes", 5));
        assert_eq!(ids(&reconciler), vec!["temp-9", "41"]);

        reconciler.apply(LiveEvent::MessageConfirmed {
            payload: message(Some("42"), Some("temp-9"), ME, "yes", 10),
        });
        assert_eq!(ids(&reconciler), vec!["41", "42"]);
        assert_eq!(reconciler.get("temp-9").unwrap().created_at, at(10));
        assert_invariants(&reconciler);
    }

    #[test]
    fn late_pending_copy_does_not_undo_confirmation() {
        let mut reconciler = reconciler();
        reconciler.push_local(message(None, Some("temp-9"), ME, "yes", 5));
        reconciler.apply(LiveEvent::MessageConfirmed {
            payload: message(Some("42"), Some("temp-9"), ME, "yes", 3),
        });

        let mut resent = message(None, Some("temp-9"), ME, "yes", 20);
        resent.updated_at = Some(at(25));
        reconciler.push_local(resent);

        assert_eq!(reconciler.len(), 1);
        let entry = &reconciler.merged()[0];
        assert_eq!(entry.id.as_deref(), Some("42"));
        assert_eq!(entry.created_at, at(3));
    }

    #[test]
    fn stale_reaction_after_delete_is_ignored() {
        let mut reconciler = reconciler();
        let mut edited = message(Some("1"), None, THEM, "secret", 0);
        edited.updated_at = Some(at(15));
        reconciler.replace_history(HistoryPage::new(vec![edited.clone()]));

        reconciler.apply(deletion("1", 20));
        assert_eq!(reconciler.apply(reaction("1", "👍", 10)), ApplyOutcome::Ignored);

        let entry = reconciler.get("1").unwrap();
        assert!(entry.is_deleted);
        assert!(entry.reactions.is_empty());
        assert_eq!(entry.updated_at, Some(at(20)));

        reconciler.replace_history(HistoryPage::new(vec![edited]));
        let entry = reconciler.get("1").unwrap();
        assert!(entry.is_deleted);
        assert!(entry.text.is_none());
    }

    #[test]
    fn deletion_stamped_before_last_edit_still_wins() {
        let mut reconciler = reconciler();
        let mut edited = message(Some("1"), None, THEM, "secret", 0);
        edited.updated_at = Some(at(15));
        reconciler.replace_history(HistoryPage::new(vec![edited.clone()]));

        reconciler.apply(deletion("1", 10));
        let entry = reconciler.get("1").unwrap();
        assert!(entry.is_deleted);
        assert_eq!(entry.updated_at, Some(at(15)));

        reconciler.replace_history(HistoryPage::new(vec![edited]));
        assert!(reconciler.get("1").unwrap().is_deleted);
    }

    #[test]
    fn edit_after_delete_does_not_restore_text() {
        let mut reconciler = reconciler();
        reconciler.replace_history(HistoryPage::new(vec![message(Some("1"), None, THEM, "secret", 0)]));
        reconciler.apply(deletion("1", 20));

        let mut edit = message(Some("1"), None, THEM, "secret again", 0);
        edit.updated_at = Some(at(30));
        reconciler.apply(LiveEvent::MessageUpdated { payload: edit });

        let entry = reconciler.get("1").unwrap();
        assert!(entry.is_deleted);
        assert!(entry.text.is_none());
    }

    #[test]
    fn stale_reaction_keeps_newer_revision() {
        let mut reconciler = reconciler();
        let mut edited = message(Some("1"), None, THEM, "v2", 0);
        edited.updated_at = Some(at(15));
        reconciler.replace_history(HistoryPage::new(vec![edited]));

        assert_eq!(reconciler.apply(reaction("1", "💪", 10)), ApplyOutcome::Updated);

        let entry = reconciler.get("1").unwrap();
        assert_eq!(entry.text.as_deref(), Some("v2"));
        assert_eq!(entry.reactions.len(), 1);
        assert_eq!(entry.updated_at, Some(at(15)));
    }

    #[test]
    fn newer_reaction_advances_revision() {
        let mut reconciler = reconciler();
        let mut edited = message(Some("1"), None, THEM, "v2", 0);
        edited.updated_at = Some(at(15));
        reconciler.replace_history(HistoryPage::new(vec![edited]));

        reconciler.apply(reaction("1", "💪", 40));
        assert_eq!(reconciler.get("1").unwrap().updated_at, Some(at(40)));
    }

    #[test]
    fn skewed_confirmations_keep_invariants() {
        let mut reconciler = reconciler();
        for round in 0..12u32 {
            let temp = format!("temp-{round}");
            let id = format!("{}", 200 + round);
            let local = 25 + round;
            // Server clock alternates between behind and ahead of the client.
            let server = if round % 2 == 0 { local - 20 } else { local + 20 };

            reconciler.push_local(message(None, Some(temp.as_str()), ME, "draft", local));
            reconciler.apply(LiveEvent::MessageConfirmed {
                payload: message(Some(id.as_str()), Some(temp.as_str()), ME, "sent", server),
            });
            assert_eq!(reconciler.get(&id).unwrap().created_at, at(server));
            assert!(reconciler.merged().iter().all(|m| !m.is_pending()));
            assert_invariants(&reconciler);
        }
        assert_eq!(reconciler.len(), 12);
    }
}
