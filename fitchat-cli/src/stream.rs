//! Live channel over server-sent events.
//!
//! The channel task owns the HTTP connection and reports to the sync driver
//! through [`ChannelSignal`]s. It reconnects after a fixed delay for as long
//! as the driver is listening.

use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use serde_json::{Value, json};
use shared::{models::LiveEvent, sync::ChannelSignal};
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info, warn};

use crate::api::ChatApiClient;

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split lines (or UTF-8 sequences) anywhere, so bytes are
/// buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                "id" => self.id = Some(value.to_string()),
                _ => {}
            }
        }

        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseFrame { event, data, id })
    }
}

/// Decodes a frame into a live event.
///
/// Servers either send the tagged event itself as data, or name the event in
/// the `event:` field and send only the payload.
pub fn parse_event(frame: &SseFrame) -> Result<LiveEvent> {
    if let Ok(event) = serde_json::from_str::<LiveEvent>(&frame.data) {
        return Ok(event);
    }

    let payload: Value = serde_json::from_str(&frame.data)?;
    let name = frame.event.as_deref().unwrap_or("message.new");
    let event = serde_json::from_value(json!({ "type": name, "payload": payload }))?;
    Ok(event)
}

/// Keeps the live channel open until the receiving side goes away.
pub async fn run_live_channel(
    api: ChatApiClient,
    signals: mpsc::Sender<ChannelSignal>,
    reconnect_delay: Duration,
) {
    let mut last_event_id: Option<String> = None;

    loop {
        match api.open_stream(last_event_id.as_deref()).await {
            Ok(response) => {
                info!("live channel open");
                if signals.send(ChannelSignal::Connected).await.is_err() {
                    return;
                }

                let mut decoder = SseDecoder::new();
                let mut body = response.bytes_stream();
                while let Some(chunk) = body.next().await {
                    let bytes = match chunk {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            warn!(error = %err, "live channel read failed");
                            break;
                        }
                    };
                    for frame in decoder.push(&bytes) {
                        if let Some(id) = &frame.id {
                            last_event_id = Some(id.clone());
                        }
                        match parse_event(&frame) {
                            Ok(event) => {
                                debug!(event = event.name(), "live event");
                                if signals.send(ChannelSignal::Event(event)).await.is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, event = ?frame.event, "skipping undecodable event");
                            }
                        }
                    }
                }
                info!("live channel closed by server");
            }
            Err(err) => warn!(error = %format!("{err:#}"), "live channel unavailable"),
        }

        if signals.send(ChannelSignal::Disconnected).await.is_err() {
            return;
        }
        sleep(reconnect_delay).await;
    }
}
