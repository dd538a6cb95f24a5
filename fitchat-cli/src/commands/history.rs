use anyhow::Result;
use clap::Args;
use shared::{
    ConversationState,
    config::ClientConfig,
    models::{Participant, Timestamp},
    present,
};
use tracing::warn;

use super::scope_with;
use crate::{api::ChatApiClient, render};

#[derive(Args, Debug)]
#[command(about = "Show the message history with another participant")]
pub struct HistoryArgs {
    /// Id of the other participant in the conversation
    #[arg(long, alias = "participant")]
    pub with: String,

    /// History page to fetch, starting at 1 for the most recent messages
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}

pub async fn handle_history(args: HistoryArgs, config: &ClientConfig) -> Result<()> {
    let scope = scope_with(config, &args.with)?;
    let api = ChatApiClient::from_config(config)?;

    let page = api.history_page(&args.with, args.page).await?;
    let participant = match api.participant(&args.with).await {
        Ok(participant) => participant,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "falling back to participant id");
            Participant::unknown(&args.with)
        }
    };

    let has_more = page.has_more;
    let mut state = ConversationState::new(scope);
    state.replace_history(page);

    if state.messages.is_empty() {
        println!("No messages with {} yet.", participant.display_name());
        return Ok(());
    }

    let groups = present(
        state.messages.merged(),
        &state.scope().current_user,
        Timestamp::now().date(),
    );
    for line in render::conversation_lines(&groups, &participant) {
        println!("{line}");
    }

    if has_more {
        println!("(More messages on page {})", args.page + 1);
    }
    Ok(())
}
