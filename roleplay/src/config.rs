//! Roleplay settings. Loaded from `ROLEPLAY_*` environment variables; every field has a default.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_CATEGORY_NAME: &str = "Roleplay";
pub const DEFAULT_IMAGE_URL: &str = "YOUR_IMAGE_URL";

#[derive(Debug, Clone)]
pub struct RoleplayConfig {
    /// Category that holds every session channel; created on first use.
    pub category_name: String,
    pub slowmode_secs: u32,
    /// Messages read to rebuild the conversation window on each relay.
    pub relay_history_limit: usize,
    /// Messages scanned by `roleplay-edit` for the bot's last reply.
    pub edit_scan_limit: usize,
    pub export_history_limit: usize,
    /// Persona replies are cut to this many characters.
    pub reply_max_chars: usize,
    /// Avatar used when `roleplay-start` gets no image URL.
    pub default_image_url: String,
    /// Where transcripts are written before being sent; each file is removed right after.
    pub export_dir: PathBuf,
    /// Opaque blob stored with a guild on enrollment.
    pub guild_credential: Option<String>,
    /// Delete a session record whose channel has vanished when `stop`/`edit` notices it.
    pub reconcile_vanished_channels: bool,
    /// Text-command prefix; `None` disables prefix commands. Not read from `ROLEPLAY_*`: the
    /// bot sets it from `COMMAND_PREFIX`.
    pub command_prefix: Option<String>,
}

impl Default for RoleplayConfig {
    fn default() -> Self {
        Self {
            category_name: DEFAULT_CATEGORY_NAME.to_string(),
            slowmode_secs: 60,
            relay_history_limit: 200,
            edit_scan_limit: 100,
            export_history_limit: 200,
            reply_max_chars: 1900,
            default_image_url: DEFAULT_IMAGE_URL.to_string(),
            export_dir: env::temp_dir(),
            guild_credential: None,
            reconcile_vanished_channels: true,
            command_prefix: Some("!".to_string()),
        }
    }
}

impl RoleplayConfig {
    /// Load from environment variables; unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            category_name: var("ROLEPLAY_CATEGORY_NAME").unwrap_or(defaults.category_name),
            slowmode_secs: parsed("ROLEPLAY_SLOWMODE_SECS").unwrap_or(defaults.slowmode_secs),
            relay_history_limit: parsed("ROLEPLAY_HISTORY_LIMIT")
                .unwrap_or(defaults.relay_history_limit),
            edit_scan_limit: parsed("ROLEPLAY_EDIT_SCAN_LIMIT").unwrap_or(defaults.edit_scan_limit),
            export_history_limit: parsed("ROLEPLAY_EXPORT_LIMIT")
                .unwrap_or(defaults.export_history_limit),
            reply_max_chars: parsed("ROLEPLAY_REPLY_MAX_CHARS").unwrap_or(defaults.reply_max_chars),
            default_image_url: var("ROLEPLAY_DEFAULT_IMAGE_URL")
                .unwrap_or(defaults.default_image_url),
            export_dir: var("ROLEPLAY_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
            guild_credential: var("ROLEPLAY_GUILD_CREDENTIAL"),
            reconcile_vanished_channels: parsed("ROLEPLAY_RECONCILE_VANISHED")
                .unwrap_or(defaults.reconcile_vanished_channels),
            command_prefix: defaults.command_prefix,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    var(key).and_then(|s| s.trim().parse().ok())
}
