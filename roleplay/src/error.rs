//! Roleplay errors and the text shown to the user for each.

use dbot_core::PlatformError;
use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoleplayError {
    #[error("an active session already exists")]
    DuplicateSession,

    /// Carries the verb of the command that needed a session ("stop", "edit").
    #[error("no active session to {0}")]
    SessionNotFound(&'static str),

    #[error("session channel no longer exists")]
    ChannelGone,

    #[error("direct message with the transcript was refused")]
    DeliveryRefused,

    #[error("no bot message found in the scanned history")]
    BotMessageNotFound,

    #[error("command used outside a server")]
    GuildOnly,

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("language model call failed: {0}")]
    BackendCallFailure(String),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RoleplayError {
    /// Reply shown to the user who triggered the failing command or message.
    pub fn user_message(&self) -> String {
        match self {
            RoleplayError::DuplicateSession => "You already have an active roleplay session in this server. \
                 Please end your previous session with /roleplay-stop before starting a new one."
                .to_string(),
            RoleplayError::SessionNotFound(action) => {
                format!("You don't have an active roleplay session to {action}.")
            }
            RoleplayError::ChannelGone => {
                "The roleplay channel for your session no longer exists.".to_string()
            }
            RoleplayError::DeliveryRefused => {
                "I couldn't send you a DM. Please make sure your DMs are open and try again."
                    .to_string()
            }
            RoleplayError::BotMessageNotFound => {
                "I couldn't find my last message in this roleplay channel.".to_string()
            }
            RoleplayError::GuildOnly => "Roleplay commands can only be used in a server.".to_string(),
            RoleplayError::InvalidCommand(reason) => format!("Invalid command: {reason}"),
            RoleplayError::BackendCallFailure(_) => {
                "I couldn't get a reply from the language model. Please try again in a moment."
                    .to_string()
            }
            RoleplayError::Platform(_)
            | RoleplayError::Storage(_)
            | RoleplayError::Io(_)
            | RoleplayError::Serialize(_) => {
                "Something went wrong on my side. Please try again later.".to_string()
            }
        }
    }

    /// Whether the failure is the user's to fix rather than an internal fault.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            RoleplayError::Platform(_)
                | RoleplayError::Storage(_)
                | RoleplayError::Io(_)
                | RoleplayError::Serialize(_)
                | RoleplayError::BackendCallFailure(_)
        )
    }
}
