use anyhow::Result;
use clap::Args;
use shared::{
    ConversationState,
    config::ClientConfig,
    models::{Participant, Timestamp},
    sync::{SyncChange, SyncDriver},
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::scope_with;
use crate::{api::ChatApiClient, render::TerminalView, stream::run_live_channel};

#[derive(Args, Debug)]
#[command(about = "Follow a conversation live, polling history while offline")]
pub struct FollowArgs {
    /// Id of the other participant in the conversation
    #[arg(long, alias = "participant")]
    pub with: String,
}

pub async fn handle_follow(args: FollowArgs, config: &ClientConfig) -> Result<()> {
    let scope = scope_with(config, &args.with)?;
    let api = ChatApiClient::from_config(config)?;

    let participant = match api.participant(&args.with).await {
        Ok(participant) => participant,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "falling back to participant id");
            Participant::unknown(&args.with)
        }
    };

    println!(
        "Following conversation with {}... (press Ctrl+C to stop)",
        participant.display_name()
    );

    let mut state = ConversationState::new(scope);
    state.presence.upsert(participant.clone());

    let (tx, rx) = mpsc::channel(64);
    let live = tokio::spawn(run_live_channel(api.clone(), tx, config.reconnect_delay()));

    let mut view = TerminalView::new(participant);
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let driver = SyncDriver::new(api, state, config.poll_interval());
    let state = driver
        .run(rx, shutdown, |state: &ConversationState, change: &SyncChange| {
            for line in view.update(state, change, Timestamp::now().date()) {
                println!("{line}");
            }
        })
        .await;

    live.abort();
    info!(messages = state.messages.len(), "stopped following");
    Ok(())
}
