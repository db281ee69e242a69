//! Global application command registration.

use dbot_core::{CommandOptionKind, CommandSpec, PlatformResult};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;

use crate::model::{OPTION_TYPE_BOOLEAN, OPTION_TYPE_STRING};
use crate::rest::DiscordHttp;

/// Slash command (CHAT_INPUT)
const COMMAND_TYPE_CHAT_INPUT: u8 = 1;

/// Request body for one command.
pub fn command_payload(spec: &CommandSpec) -> Value {
    let options: Vec<Value> = spec
        .options
        .iter()
        .map(|o| {
            json!({
                "name": o.name,
                "description": o.description,
                "type": match o.kind {
                    CommandOptionKind::String => OPTION_TYPE_STRING,
                    CommandOptionKind::Boolean => OPTION_TYPE_BOOLEAN,
                },
                "required": o.required,
            })
        })
        .collect();
    json!({
        "name": spec.name,
        "description": spec.description,
        "type": COMMAND_TYPE_CHAT_INPUT,
        "options": options,
    })
}

impl DiscordHttp {
    /// Replaces the application's global commands with `specs`.
    pub async fn register_commands(&self, specs: &[CommandSpec]) -> PlatformResult<usize> {
        let body = Value::Array(specs.iter().map(command_payload).collect());
        let registered: Vec<Value> = self
            .send_json(
                Method::PUT,
                &format!("/applications/{}/commands", self.application_id()),
                Some(&body),
            )
            .await?;
        info!(count = registered.len(), "Registered application commands");
        Ok(registered.len())
    }
}
