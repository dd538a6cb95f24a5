use anyhow::Result;
use clap::Args;
use shared::{
    ConversationState,
    config::ClientConfig,
    models::{LiveEvent, OutgoingMessage, Participant, Timestamp},
    present,
};
use tracing::info;

use super::scope_with;
use crate::{api::ChatApiClient, render};

#[derive(Args, Debug)]
#[command(about = "Send a message to another participant")]
pub struct SendArgs {
    /// Id of the recipient
    #[arg(long)]
    pub to: String,

    /// Message text
    #[arg()]
    pub text: String,

    /// Id of the message being replied to
    #[arg(long)]
    pub reply_to: Option<String>,
}

pub async fn handle_send(args: SendArgs, config: &ClientConfig) -> Result<()> {
    let scope = scope_with(config, &args.to)?;
    let api = ChatApiClient::from_config(config)?;

    let mut outgoing = OutgoingMessage::text(&args.to, args.text);
    if let Some(reply_to) = args.reply_to {
        outgoing = outgoing.with_reply_to(reply_to);
    }

    let mut state = ConversationState::new(scope);
    state
        .messages
        .push_local(outgoing.optimistic(&state.scope().current_user, Timestamp::now()));

    let mut confirmed = api.send_message(&outgoing).await?;
    if confirmed.temp_id.is_none() {
        confirmed.temp_id = Some(outgoing.temp_id.clone());
    }
    state.handle(LiveEvent::MessageConfirmed { payload: confirmed }, Timestamp::now());

    let sent = state.messages.get(&outgoing.temp_id);
    info!(
        temp_id = %outgoing.temp_id,
        id = sent.and_then(|m| m.id.as_deref()).unwrap_or_default(),
        "message sent"
    );

    let groups = present(
        state.messages.merged(),
        &state.scope().current_user,
        Timestamp::now().date(),
    );
    for line in render::conversation_lines(&groups, &Participant::unknown(&args.to)) {
        println!("{line}");
    }
    Ok(())
}
