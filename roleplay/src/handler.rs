//! [`EventHandler`] for roleplay: routes commands to [`Roleplay`] and every other message to
//! the relay. Errors end here: they are logged and reported, never returned to the transport.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{ChannelMessage, CommandContext, CommandInvocation, EventHandler, ReplyTarget};
use tracing::{debug, error, info, warn};

use crate::commands::RoleplayCommand;
use crate::error::RoleplayError;
use crate::orchestrator::{RelayOutcome, Roleplay};

pub struct RoleplayHandler {
    roleplay: Arc<Roleplay>,
}

impl RoleplayHandler {
    pub fn new(roleplay: Arc<Roleplay>) -> Self {
        Self { roleplay }
    }

    /// Runs one command and reports its failure to the invoker.
    pub async fn dispatch(&self, ctx: &CommandContext, command: RoleplayCommand) {
        info!(
            command = command.name(),
            user_id = %ctx.user.id,
            guild_id = ?ctx.guild_id,
            "Handling command"
        );
        let result = match &command {
            RoleplayCommand::Start {
                scenario,
                persona_name,
                image_url,
            } => self
                .roleplay
                .start(ctx, scenario, persona_name.as_deref(), image_url.as_deref())
                .await
                .map(|_| ()),
            RoleplayCommand::Stop { export } => self.roleplay.stop(ctx, *export).await,
            RoleplayCommand::Edit { new_reply } => self.roleplay.edit(ctx, new_reply).await,
        };

        if let Err(e) = result {
            let ephemeral = matches!(command, RoleplayCommand::Edit { .. })
                && matches!(e, RoleplayError::ChannelGone);
            self.report(ctx, command.name(), &e, ephemeral).await;
        }
    }

    async fn report(&self, ctx: &CommandContext, command: &str, err: &RoleplayError, ephemeral: bool) {
        if err.is_user_facing() {
            info!(command, user_id = %ctx.user.id, reason = %err, "Command rejected");
        } else {
            error!(command, user_id = %ctx.user.id, error = %err, "Command failed");
        }
        self.roleplay.reply(ctx, &err.user_message(), ephemeral).await;
    }
}

#[async_trait]
impl EventHandler for RoleplayHandler {
    async fn on_command(&self, ctx: CommandContext, invocation: CommandInvocation) {
        match RoleplayCommand::from_invocation(&invocation) {
            Ok(Some(command)) => {
                let ctx = self
                    .roleplay
                    .acknowledge(ctx, command.replies_ephemerally())
                    .await;
                self.dispatch(&ctx, command).await
            }
            Ok(None) => debug!(command = %invocation.name, "Ignoring unknown command"),
            Err(e) => self.report(&ctx, &invocation.name, &e, false).await,
        }
    }

    async fn on_message(&self, message: ChannelMessage) {
        if let Some(prefix) = self.roleplay.command_prefix() {
            if let Some(parsed) = RoleplayCommand::parse_prefixed(prefix, &message.content) {
                if message.author.bot {
                    return;
                }
                let ctx = CommandContext {
                    user: message.author.clone(),
                    guild_id: message.guild_id,
                    channel_id: message.channel_id,
                    reply: ReplyTarget::Channel(message.channel_id),
                };
                match parsed {
                    Ok(command) => self.dispatch(&ctx, command).await,
                    Err(e) => self.report(&ctx, "prefix", &e, false).await,
                }
                return;
            }
        }

        match self.roleplay.relay(&message).await {
            Ok(RelayOutcome::Published(id)) => {
                debug!(message_id = %id, "Relay finished")
            }
            Ok(outcome) => debug!(?outcome, "Message not relayed"),
            Err(RoleplayError::BackendCallFailure(reason)) => {
                warn!(channel_id = %message.channel_id, %reason, "Relay aborted by model failure")
            }
            Err(e) => error!(channel_id = %message.channel_id, error = %e, "Relay failed"),
        }
    }
}
