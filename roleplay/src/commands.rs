//! The three roleplay commands: registration specs, slash-invocation parsing, and the
//! prefix-text form.
//!
//! Prefix grammar (`!` stands for the configured prefix):
//!
//! - `!roleplay-start <persona_name> | <scenario> [| <image_url>]`
//! - `!roleplay-stop [export]`
//! - `!roleplay-edit <new_reply>`

use dbot_core::{CommandInvocation, CommandOptionKind, CommandSpec};

use crate::error::RoleplayError;

pub const START: &str = "roleplay-start";
pub const STOP: &str = "roleplay-stop";
pub const EDIT: &str = "roleplay-edit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleplayCommand {
    Start {
        scenario: String,
        persona_name: Option<String>,
        image_url: Option<String>,
    },
    Stop {
        export: bool,
    },
    Edit {
        new_reply: String,
    },
}

/// Specs for registering the commands with the platform.
pub fn command_specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new(START, "Start a roleplay session")
            .option(
                "scenario",
                "The scenario you want to roleplay",
                CommandOptionKind::String,
                true,
            )
            .option(
                "persona_name",
                "Name of the persona you want the bot to take on",
                CommandOptionKind::String,
                true,
            )
            .option(
                "image_url",
                "URL of the image you want the bot to use as its pfp",
                CommandOptionKind::String,
                false,
            ),
        CommandSpec::new(STOP, "Stop a roleplay session").option(
            "export",
            "Would you like to export the chat history?",
            CommandOptionKind::Boolean,
            false,
        ),
        CommandSpec::new(EDIT, "Edit the AI's most recent reply in a roleplay session").option(
            "new_reply",
            "Replacement text for the last reply",
            CommandOptionKind::String,
            true,
        ),
    ]
}

impl RoleplayCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RoleplayCommand::Start { .. } => START,
            RoleplayCommand::Stop { .. } => STOP,
            RoleplayCommand::Edit { .. } => EDIT,
        }
    }

    /// Whether the success reply is shown to the invoker only.
    pub fn replies_ephemerally(&self) -> bool {
        matches!(self, RoleplayCommand::Edit { .. })
    }

    /// Parses a slash invocation. `Ok(None)` means the command is not a roleplay command.
    pub fn from_invocation(invocation: &CommandInvocation) -> Result<Option<Self>, RoleplayError> {
        let command = match invocation.name.as_str() {
            START => RoleplayCommand::Start {
                scenario: required(invocation.get_str("scenario"), "scenario")?,
                persona_name: optional(invocation.get_str("persona_name")),
                image_url: optional(invocation.get_str("image_url")),
            },
            STOP => RoleplayCommand::Stop {
                export: invocation.get_bool("export").unwrap_or(false),
            },
            EDIT => RoleplayCommand::Edit {
                new_reply: required(invocation.get_str("new_reply"), "new_reply")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    /// Parses `text` as a prefix command. `None` means the text is not a roleplay command.
    pub fn parse_prefixed(prefix: &str, text: &str) -> Option<Result<Self, RoleplayError>> {
        if prefix.is_empty() {
            return None;
        }
        let body = text.trim_start().strip_prefix(prefix)?;
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body.trim_end(), ""),
        };
        let parsed = match name {
            START => parse_start(rest),
            STOP => parse_stop(rest),
            EDIT => required(Some(rest), "new_reply")
                .map(|new_reply| RoleplayCommand::Edit { new_reply }),
            _ => return None,
        };
        Some(parsed)
    }

    /// Whether `text` is addressed to the bot as a prefix command, well-formed or not.
    pub fn is_prefixed(prefix: &str, text: &str) -> bool {
        Self::parse_prefixed(prefix, text).is_some()
    }
}

fn parse_start(rest: &str) -> Result<RoleplayCommand, RoleplayError> {
    let mut parts = rest.splitn(3, '|').map(str::trim);
    let persona_name = required(parts.next(), "persona_name")?;
    let scenario = required(parts.next(), "scenario")?;
    Ok(RoleplayCommand::Start {
        scenario,
        persona_name: Some(persona_name),
        image_url: optional(parts.next()),
    })
}

fn parse_stop(rest: &str) -> Result<RoleplayCommand, RoleplayError> {
    let export = match rest.to_ascii_lowercase().as_str() {
        "" | "false" | "no" => false,
        "export" | "true" | "yes" => true,
        other => {
            return Err(RoleplayError::InvalidCommand(format!(
                "unknown {STOP} argument '{other}', expected 'export'"
            )))
        }
    };
    Ok(RoleplayCommand::Stop { export })
}

fn required(value: Option<&str>, name: &str) -> Result<String, RoleplayError> {
    optional(value).ok_or_else(|| RoleplayError::InvalidCommand(format!("missing {name}")))
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
