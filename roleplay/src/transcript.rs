//! Transcript export: channel history as a JSON array of `{role, content}` in chronological
//! order, written to a temporary file that is removed when its [`ExportFile`] guard drops.
//! Each export gets its own directory, so overlapping exports for one user never share a path.

use std::io;
use std::path::{Path, PathBuf};

use dbot_core::{ChannelMessage, UserId};
use prompt::ChatMessage;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::RoleplayError;
use crate::window::classify;

/// `<user_id>_roleplay_history.json`
pub fn export_file_name(user_id: UserId) -> String {
    format!("{user_id}_roleplay_history.json")
}

/// Chronological entries from `newest_first` history; `user` exactly when the owner wrote it.
pub fn transcript_entries(
    newest_first: &[ChannelMessage],
    owner: UserId,
    command_prefix: Option<&str>,
) -> Vec<ChatMessage> {
    let mut entries: Vec<ChatMessage> = classify(newest_first, owner, command_prefix).collect();
    entries.reverse();
    entries
}

/// Pretty JSON with 4-space indentation.
pub fn render(entries: &[ChatMessage]) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    entries.serialize(&mut serializer)?;
    // serde_json only emits valid UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// A transcript on disk. The file and its directory are deleted on drop, whatever happened
/// in between.
#[derive(Debug)]
pub struct ExportFile {
    path: PathBuf,
    // Dropped after `Drop::drop` has removed the file.
    _scratch: TempDir,
}

impl ExportFile {
    /// Writes `entries` to `<dir>/<unique>/<user_id>_roleplay_history.json`.
    pub async fn write(
        dir: &Path,
        user_id: UserId,
        entries: &[ChatMessage],
    ) -> Result<Self, RoleplayError> {
        let json = render(entries)?;
        tokio::fs::create_dir_all(dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("export-{user_id}-"))
            .tempdir_in(dir)?;
        // Guard first so a partial write is cleaned up too.
        let file = Self {
            path: scratch.path().join(export_file_name(user_id)),
            _scratch: scratch,
        };
        tokio::fs::write(&file.path, json).await?;
        debug!(path = %file.path.display(), entries = entries.len(), "Wrote transcript");
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExportFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed transcript"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove transcript"),
        }
    }
}
