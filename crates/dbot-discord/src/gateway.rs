//! Gateway websocket: identify, heartbeat, and event dispatch to an [`EventHandler`].
//!
//! Every dispatched event runs in its own task so a slow model call never blocks the
//! heartbeat. Sessions are not resumed; a dropped connection re-identifies.

use std::sync::Arc;
use std::time::Duration;

use dbot_core::{ChannelMessage, CommandContext, CommandInvocation, EventHandler};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::model::{WireInteraction, WireMessage};

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
pub const INTENTS: u64 = 33281;
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("gateway closed the connection")]
    Closed,

    #[error("gateway protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Deserialize)]
struct Payload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// A dispatch event the bot reacts to.
#[derive(Debug)]
pub enum GatewayEvent {
    Ready { user_name: String },
    Command(CommandContext, CommandInvocation),
    Message(ChannelMessage),
}

/// Decodes a dispatch event; `None` for event types the bot ignores.
pub fn parse_event(event_type: &str, data: Value) -> Result<Option<GatewayEvent>, serde_json::Error> {
    let event = match event_type {
        "READY" => {
            let user_name = data
                .pointer("/user/username")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(GatewayEvent::Ready { user_name })
        }
        "MESSAGE_CREATE" => {
            let message: WireMessage = serde_json::from_value(data)?;
            Some(GatewayEvent::Message(message.into()))
        }
        "INTERACTION_CREATE" => {
            let interaction: WireInteraction = serde_json::from_value(data)?;
            interaction
                .into_command()
                .map(|(ctx, invocation)| GatewayEvent::Command(ctx, invocation))
        }
        _ => None,
    };
    Ok(event)
}

pub struct Gateway {
    token: String,
    url: String,
    handler: Arc<dyn EventHandler>,
}

impl Gateway {
    pub fn new(token: &str, url: &str, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            token: token.to_string(),
            url: url.to_string(),
            handler,
        }
    }

    /// Runs sessions back to back; returns only if the token is rejected.
    pub async fn run(&self) -> Result<(), GatewayError> {
        loop {
            match self.session().await {
                Ok(()) => info!("Gateway session ended, reconnecting"),
                Err(GatewayError::Protocol(reason)) if reason.starts_with("4004") => {
                    error!(%reason, "Gateway rejected the token");
                    return Err(GatewayError::Protocol(reason));
                }
                Err(e) => warn!(error = %e, "Gateway session failed, reconnecting"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn session(&self) -> Result<(), GatewayError> {
        info!(url = %self.url, "Connecting to gateway");
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws.split();

        let hello = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => break decode(&text)?,
                Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(GatewayError::Closed),
            }
        };
        if hello.op != OP_HELLO {
            return Err(GatewayError::Protocol(format!("expected hello, got op {}", hello.op)));
        }
        let interval_ms = hello
            .d
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .unwrap_or(41_250);

        let identify = json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": INTENTS,
                "properties": { "os": std::env::consts::OS, "browser": "dbot", "device": "dbot" },
            }
        });
        write.send(Message::Text(identify.to_string())).await?;
        debug!(interval_ms, "Identified with gateway");

        let mut heartbeat = tokio::time::interval(Duration::from_millis(interval_ms));
        heartbeat.tick().await;
        let mut sequence: Option<u64> = None;
        let mut acked = true;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acked {
                        warn!("Heartbeat not acknowledged, reconnecting");
                        return Ok(());
                    }
                    acked = false;
                    write.send(Message::Text(heartbeat_payload(sequence))).await?;
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(GatewayError::Closed),
                    };
                    let payload = match decode(&text) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(error = %e, "Skipping undecodable gateway frame");
                            continue;
                        }
                    };
                    if payload.s.is_some() {
                        sequence = payload.s;
                    }
                    match payload.op {
                        OP_DISPATCH => self.dispatch(payload.t.as_deref().unwrap_or_default(), payload.d),
                        OP_HEARTBEAT => {
                            write.send(Message::Text(heartbeat_payload(sequence))).await?;
                        }
                        OP_HEARTBEAT_ACK => acked = true,
                        OP_RECONNECT | OP_INVALID_SESSION => {
                            info!(op = payload.op, "Gateway asked to reconnect");
                            return Ok(());
                        }
                        other => debug!(op = other, "Ignoring gateway opcode"),
                    }
                }
            }
        }
    }

    fn dispatch(&self, event_type: &str, data: Value) {
        let event = match parse_event(event_type, data) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(e) => {
                warn!(event_type, error = %e, "Failed to decode gateway event");
                return;
            }
        };
        let handler = Arc::clone(&self.handler);
        match event {
            GatewayEvent::Ready { user_name } => info!(%user_name, "Gateway ready"),
            GatewayEvent::Command(ctx, invocation) => {
                tokio::spawn(async move { handler.on_command(ctx, invocation).await });
            }
            GatewayEvent::Message(message) => {
                tokio::spawn(async move { handler.on_message(message).await });
            }
        }
    }
}

fn decode(text: &str) -> Result<Payload, GatewayError> {
    serde_json::from_str(text).map_err(|e| GatewayError::Protocol(format!("bad payload: {e}")))
}

fn heartbeat_payload(sequence: Option<u64>) -> String {
    json!({ "op": OP_HEARTBEAT, "d": sequence }).to_string()
}

fn close_error(frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'_>>) -> GatewayError {
    match frame {
        Some(frame) => GatewayError::Protocol(format!("{} {}", u16::from(frame.code), frame.reason)),
        None => GatewayError::Closed,
    }
}
