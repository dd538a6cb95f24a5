pub mod errors;
pub mod events;
pub mod history;
pub mod message;
pub mod participant;
pub mod timestamp;

pub use errors::ErrorResponse;
pub use events::{
    LiveEvent, MessageDeletedEvent, ReactionEvent, ReadReceiptEvent, StreamErrorEvent,
    TypingEvent,
};
pub use history::HistoryPage;
pub use message::{
    ChatMessage, DeliveryStatus, MediaAttachment, MediaKind, OutgoingMessage, Reaction,
    TEMP_ID_PREFIX,
};
pub use participant::{Participant, PresenceStatus, PresenceUpdate};
pub use timestamp::Timestamp;
