use std::{collections::HashMap, fmt::Write as _};

use chrono::NaiveDate;
use colored::Colorize;
use shared::{
    ConversationState, DayGroup, PresentedMessage,
    models::{ChatMessage, DeliveryStatus, Participant, Timestamp},
    present,
    state::StateChange,
    sync::SyncChange,
};

pub fn day_header(label: &str) -> String {
    format!("── {label} ──").bold().to_string()
}

fn status_marker(message: &ChatMessage) -> &'static str {
    if message.is_pending() {
        "…"
    } else {
        match message.status {
            DeliveryStatus::Sent => "✓",
            DeliveryStatus::Read => "✓✓",
        }
    }
}

/// One line per message; the sender's name only opens a run.
pub fn message_line(entry: &PresentedMessage<'_>, participant: &Participant) -> String {
    let message = entry.message;
    let time = message.created_at.0.format("%H:%M").to_string();

    let body = if message.is_deleted {
        entry.body.italic().dimmed().to_string()
    } else {
        entry.body.clone()
    };

    let mut line = if !entry.show_avatar {
        format!("{}   {body}", time.dimmed())
    } else if entry.is_own {
        format!("{} {}: {body}", time.dimmed(), "You".green().bold())
    } else {
        format!(
            "{} {}: {body}",
            time.dimmed(),
            participant.display_name().cyan().bold()
        )
    };

    if let Some(reply_to) = &message.reply_to {
        let _ = write!(line, " {}", format!("(re {reply_to})").dimmed());
    }
    for reaction in &message.reactions {
        let _ = write!(line, " [{} {}]", reaction.emoji, reaction.user_ids.len());
    }
    if entry.is_own && !message.is_deleted {
        let _ = write!(line, " {}", status_marker(message).dimmed());
    }
    line
}

pub fn conversation_lines(groups: &[DayGroup<'_>], participant: &Participant) -> Vec<String> {
    let mut lines = Vec::new();
    for group in groups {
        lines.push(day_header(&group.label));
        lines.extend(
            group
                .messages
                .iter()
                .map(|entry| message_line(entry, participant)),
        );
    }
    lines
}

/// Incremental printer for `follow`: emits only entries that are new or
/// whose rendering changed since the last update. Output is append-only, so
/// the view never scrolls away from the newest line and has no unseen count.
#[derive(Debug)]
pub struct TerminalView {
    participant: Participant,
    shown: HashMap<String, String>,
    last_day: Option<NaiveDate>,
}

impl TerminalView {
    pub fn new(participant: Participant) -> Self {
        Self {
            participant,
            shown: HashMap::new(),
            last_day: None,
        }
    }

    pub fn update(
        &mut self,
        state: &ConversationState,
        change: &SyncChange,
        today: NaiveDate,
    ) -> Vec<String> {
        let mut lines = Vec::new();

        match change {
            SyncChange::ChannelUp => lines.push("● live".green().to_string()),
            SyncChange::ChannelDown => {
                lines.push("○ offline, polling for new messages".yellow().to_string());
            }
            SyncChange::FetchFailed(reason) => {
                lines.push(format!("warning: {reason}").red().to_string());
            }
            SyncChange::Live(StateChange::Presence) => {
                let status = if state.presence.is_online(&self.participant.id) {
                    "online"
                } else {
                    "offline"
                };
                lines.push(
                    format!("{} is {status}", self.participant.display_name())
                        .dimmed()
                        .to_string(),
                );
            }
            SyncChange::Live(StateChange::Typing) => {
                if state.presence.is_typing(&self.participant.id, Timestamp::now()) {
                    lines.push(
                        format!("{} is typing…", self.participant.display_name())
                            .dimmed()
                            .to_string(),
                    );
                }
            }
            SyncChange::Live(StateChange::StreamError(error)) => {
                lines.push(
                    format!("server error {}: {}", error.code, error.message)
                        .red()
                        .to_string(),
                );
            }
            SyncChange::HistoryLoaded { .. }
            | SyncChange::Live(StateChange::Messages(_) | StateChange::Unchanged) => {}
        }

        lines.extend(self.changed_messages(state, today));
        lines
    }

    fn changed_messages(&mut self, state: &ConversationState, today: NaiveDate) -> Vec<String> {
        let mut lines = Vec::new();
        let groups = present(state.messages.merged(), &state.scope().current_user, today);

        for group in &groups {
            for entry in &group.messages {
                let rendered = message_line(entry, &self.participant);
                let previous = entry
                    .message
                    .keys()
                    .find_map(|key| self.shown.get(key).cloned());

                match previous {
                    Some(previous) if previous == rendered => {}
                    Some(_) => lines.push(format!("{} {rendered}", "~".dimmed())),
                    None => {
                        if self.last_day != Some(group.date) {
                            self.last_day = Some(group.date);
                            lines.push(day_header(&group.label));
                        }
                        lines.push(rendered.clone());
                    }
                }

                for key in entry.message.keys() {
                    self.shown.insert(key.to_string(), rendered.clone());
                }
            }
        }
        lines
    }
}
