//! # Sync driver
//!
//! Owns the [`ConversationState`] and feeds it from two sources: live channel
//! signals, and history fetches. History is fetched once at start and then
//! every `poll_interval` for as long as the live channel is down. Polling is
//! best-effort: messages missed during an outage only reappear with the next
//! fetch, and the reconciler collapses any duplicates it brings.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    models::{HistoryPage, LiveEvent, Timestamp},
    reconcile::ConversationScope,
    state::{ConversationState, StateChange},
};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("history fetch failed: {0}")]
    Fetch(String),
}

/// Where persisted conversation history comes from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetches the most recent history page for the conversation.
    ///
    /// # Errors
    /// Returns [`SyncError::Fetch`] when the history cannot be retrieved.
    async fn fetch_history(&self, scope: &ConversationScope) -> Result<HistoryPage, SyncError>;
}

/// What the live-channel task reports to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    Connected,
    Disconnected,
    Event(LiveEvent),
}

/// Reported to the observer after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncChange {
    HistoryLoaded { messages: usize, polled: bool },
    FetchFailed(String),
    ChannelUp,
    ChannelDown,
    Live(StateChange),
}

#[derive(Debug)]
pub struct SyncDriver<S> {
    source: S,
    state: ConversationState,
    poll_interval: Duration,
}

impl<S: HistorySource> SyncDriver<S> {
    pub fn new(source: S, state: ConversationState, poll_interval: Duration) -> Self {
        Self {
            source,
            state,
            poll_interval,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Runs until `shutdown` resolves, then hands the state back.
    ///
    /// A closed `signals` channel is treated as a permanent disconnect:
    /// polling continues until shutdown.
    pub async fn run<F, O>(
        mut self,
        mut signals: mpsc::Receiver<ChannelSignal>,
        shutdown: F,
        mut observer: O,
    ) -> ConversationState
    where
        F: Future<Output = ()>,
        O: FnMut(&ConversationState, &SyncChange),
    {
        let mut connected = false;
        let mut channel_open = true;

        self.refresh(&mut observer, false).await;

        let mut poll = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("sync stopped");
                    break;
                }
                signal = signals.recv(), if channel_open => match signal {
                    Some(ChannelSignal::Connected) => {
                        if !connected {
                            connected = true;
                            info!("live channel connected; polling paused");
                            observer(&self.state, &SyncChange::ChannelUp);
                        }
                    }
                    Some(ChannelSignal::Disconnected) => {
                        if connected {
                            connected = false;
                            poll.reset();
                            warn!(
                                interval_secs = self.poll_interval.as_secs(),
                                "live channel lost; polling history"
                            );
                            observer(&self.state, &SyncChange::ChannelDown);
                        }
                    }
                    Some(ChannelSignal::Event(event)) => {
                        let change = self.state.handle(event, Timestamp::now());
                        if change != StateChange::Unchanged {
                            observer(&self.state, &SyncChange::Live(change));
                        }
                    }
                    None => {
                        channel_open = false;
                        if connected {
                            connected = false;
                            poll.reset();
                            observer(&self.state, &SyncChange::ChannelDown);
                        }
                        warn!("live channel closed; continuing with polling only");
                    }
                },
                _ = poll.tick(), if !connected => {
                    self.refresh(&mut observer, true).await;
                }
            }
        }

        self.state
    }

    async fn refresh<O>(&mut self, observer: &mut O, polled: bool)
    where
        O: FnMut(&ConversationState, &SyncChange),
    {
        match self.source.fetch_history(self.state.scope()).await {
            Ok(page) => {
                let messages = page.messages.len();
                self.state.replace_history(page);
                debug!(messages, polled, merged = self.state.messages.len(), "history loaded");
                observer(&self.state, &SyncChange::HistoryLoaded { messages, polled });
            }
            Err(err) => {
                warn!(error = %err, "history fetch failed");
                observer(&self.state, &SyncChange::FetchFailed(err.to_string()));
            }
        }
    }
}
