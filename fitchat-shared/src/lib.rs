#![cfg_attr(not(test), forbid(unsafe_code))]

//! Shared building blocks for the fitchat client: wire models, the message
//! reconciler, presence tracking, the day-grouping presenter, configuration,
//! and the polling-fallback sync driver.

pub mod config;
pub mod models;
pub mod presence;
pub mod presenter;
pub mod reconcile;
pub mod state;
#[cfg(feature = "tokio")]
pub mod sync;

pub use presence::PresenceBoard;
pub use presenter::{DayGroup, PresentedMessage, present};
pub use reconcile::{ApplyOutcome, ConversationScope, Reconciler, ScrollAction};
pub use state::ConversationState;
