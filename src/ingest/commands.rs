//! Chat commands and their reply texts.

use crate::cache::StatsSnapshot;

/// Commands understood by the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/help`
    Help,
    /// `/stats`
    Stats,
    /// `/upload`
    Upload,
    /// Any other `/...` text
    Unknown(String),
}

impl Command {
    /// Parse a command from message text.
    ///
    /// Returns `None` for text that is not a command. Arguments and a
    /// trailing `@botname` are ignored.
    ///
    /// ```
    /// use chat_archiver::ingest::Command;
    ///
    /// assert_eq!(Command::parse("/stats@archive_bot"), Some(Command::Stats));
    /// assert_eq!(Command::parse("hello"), None);
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.trim_start().split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(name, _)| name);

        Some(match name.to_ascii_lowercase().as_str() {
            "help" => Self::Help,
            "stats" => Self::Stats,
            "upload" => Self::Upload,
            _ => Self::Unknown(token.to_string()),
        })
    }
}

/// `/help` reply
pub const HELP_TEXT: &str = "📸 Chat Archiver Bot
This bot automatically saves photos and files shared in this chat to cloud storage for easy access and backup.

Available commands:
/help - Show this help message
/stats - Show last 5 uploads and statistics
/upload - Show upload instructions";

/// `/upload` reply
pub const UPLOAD_TEXT: &str = "📤 How to upload files:

1. Simply share any photo, video, or file in this chat
2. The bot will automatically save it to cloud storage
3. Files are organized by group/chat

Supported file types:
• Photos (JPG)
• Videos (MP4)
• Voice notes (OGG)
• Documents (PDF, etc.)";

/// Reply to an unrecognised command
pub const UNKNOWN_COMMAND_TEXT: &str = "Unknown command. Type /help for available commands.";

/// Reply to a sender the access policy rejects
pub const PERMISSION_DENIED_TEXT: &str = "Sorry, you don't have permission to use this bot.";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a `/stats` reply; `in_group` selects the title.
#[must_use]
pub fn render_stats(snapshot: &StatsSnapshot, in_group: bool) -> String {
    let title = if in_group {
        "📊 Group Statistics"
    } else {
        "📊 Upload Statistics"
    };
    let last_upload = snapshot.last_upload.map_or_else(
        || "never".to_string(),
        |at| at.format(TIMESTAMP_FORMAT).to_string(),
    );

    let mut text = format!(
        "{title}\nTotal uploads: {}\nLast upload: {last_upload}",
        snapshot.total_uploads
    );

    if snapshot.recent_files.is_empty() {
        text.push_str("\n\nNo recent uploads found.");
    } else {
        text.push_str("\n\nRecent uploads:");
        for file in &snapshot.recent_files {
            text.push_str(&format!(
                "\n{} - {}",
                file.uploaded_at.format(TIMESTAMP_FORMAT),
                file.name
            ));
        }
    }
    text
}
