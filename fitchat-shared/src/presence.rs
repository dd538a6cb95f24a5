//! Online status and typing indicators for the participants on screen.

use std::collections::HashMap;

use chrono::Duration;
use tracing::trace;

use crate::models::{Participant, PresenceStatus, PresenceUpdate, Timestamp, TypingEvent};

/// How long a typing indicator stays up when the event carries no expiry.
pub const DEFAULT_TYPING_TTL_SECS: i64 = 5;

#[derive(Debug, Default)]
pub struct PresenceBoard {
    participants: HashMap<String, Participant>,
    typing_until: HashMap<String, Timestamp>,
}

impl PresenceBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or refreshes a participant profile. Presence already
    /// learned from live events is kept when the profile says less.
    pub fn upsert(&mut self, mut participant: Participant) {
        if let Some(existing) = self.participants.get(&participant.id) {
            if participant.last_seen.is_none() {
                participant.last_seen = existing.last_seen;
            }
            if existing.is_online() {
                participant.status = PresenceStatus::Online;
            }
        }
        self.participants.insert(participant.id.clone(), participant);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn apply_presence(&mut self, update: PresenceUpdate) {
        trace!(user = %update.user_id, status = ?update.status, "presence update");
        let participant = self
            .participants
            .entry(update.user_id.clone())
            .or_insert_with(|| Participant::unknown(update.user_id.clone()));
        participant.status = update.status;
        if update.last_seen.is_some() {
            participant.last_seen = update.last_seen;
        }
        if update.status == PresenceStatus::Offline {
            self.typing_until.remove(&update.user_id);
        }
    }

    /// Starts or stops the typing indicator for `event.user_id`.
    pub fn apply_typing(&mut self, event: &TypingEvent, now: Timestamp) {
        if event.is_typing {
            let until = event.expires_at.unwrap_or(Timestamp(
                now.0 + Duration::seconds(DEFAULT_TYPING_TTL_SECS),
            ));
            self.typing_until.insert(event.user_id.clone(), until);
        } else {
            self.typing_until.remove(&event.user_id);
        }
    }

    #[must_use]
    pub fn is_online(&self, id: &str) -> bool {
        self.participants.get(id).is_some_and(Participant::is_online)
    }

    #[must_use]
    pub fn is_typing(&self, id: &str, now: Timestamp) -> bool {
        self.typing_until.get(id).is_some_and(|until| now < *until)
    }

    /// Drops typing indicators that expired before `now`.
    pub fn prune_typing(&mut self, now: Timestamp) {
        self.typing_until.retain(|_, until| now < *until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(seconds: u32) -> Timestamp {
        Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 0, seconds).unwrap())
    }

    fn typing(is_typing: bool, expires_at: Option<Timestamp>) -> TypingEvent {
        TypingEvent {
            user_id: "client-7".into(),
            receiver_id: "trainer-1".into(),
            is_typing,
            expires_at,
        }
    }

    #[test]
    fn presence_creates_unknown_participants() {
        let mut board = PresenceBoard::new();
        board.apply_presence(PresenceUpdate {
            user_id: "client-7".into(),
            status: PresenceStatus::Online,
            last_seen: None,
        });

        assert!(board.is_online("client-7"));
        assert_eq!(board.get("client-7").unwrap().display_name(), "client-7");
        assert!(!board.is_online("client-8"));
    }

    #[test]
    fn profile_refresh_keeps_live_presence() {
        let mut board = PresenceBoard::new();
        board.apply_presence(PresenceUpdate {
            user_id: "client-7".into(),
            status: PresenceStatus::Online,
            last_seen: Some(at(3)),
        });

        let mut profile = Participant::unknown("client-7");
        profile.first_name = "Sam".into();
        board.upsert(profile);

        let participant = board.get("client-7").unwrap();
        assert!(participant.is_online());
        assert_eq!(participant.last_seen, Some(at(3)));
        assert_eq!(participant.display_name(), "Sam");
    }

    #[test]
    fn typing_expires_at_deadline() {
        let mut board = PresenceBoard::new();
        board.apply_typing(&typing(true, Some(at(10))), at(0));

        assert!(board.is_typing("client-7", at(9)));
        assert!(!board.is_typing("client-7", at(10)));

        board.prune_typing(at(11));
        assert!(!board.is_typing("client-7", at(0)));
    }

    #[test]
    fn typing_defaults_to_short_ttl_and_stops_explicitly() {
        let mut board = PresenceBoard::new();
        board.apply_typing(&typing(true, None), at(0));
        assert!(board.is_typing("client-7", at(4)));
        assert!(!board.is_typing("client-7", at(5)));

        board.apply_typing(&typing(true, None), at(20));
        board.apply_typing(&typing(false, None), at(21));
        assert!(!board.is_typing("client-7", at(21)));
    }

    #[test]
    fn going_offline_clears_typing() {
        let mut board = PresenceBoard::new();
        board.apply_typing(&typing(true, Some(at(30))), at(0));
        board.apply_presence(PresenceUpdate {
            user_id: "client-7".into(),
            status: PresenceStatus::Offline,
            last_seen: Some(at(1)),
        });
        assert!(!board.is_typing("client-7", at(2)));
    }
}
