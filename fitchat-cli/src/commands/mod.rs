use anyhow::{Result, anyhow};
use shared::{config::ClientConfig, reconcile::ConversationScope};

pub mod config;
pub mod follow;
pub mod history;
pub mod send;

/// The conversation between the configured user and `participant`.
fn scope_with(config: &ClientConfig, participant: &str) -> Result<ConversationScope> {
    let user = config
        .user_id
        .as_deref()
        .ok_or_else(|| anyhow!("no user id configured; pass --user or set FITCHAT_USER_ID"))?;
    Ok(ConversationScope::new(user, participant))
}
