//! Transport-neutral inbound events.

use crate::config::DIRECT_SCOPE;
use chrono::{DateTime, Utc};

/// Where a message was sent from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// One-to-one chat with the bot
    User {
        /// Sender id
        user_id: i64,
    },
    /// Group chat; statistics and uploads are kept per group
    Group {
        /// Group chat id
        group_id: i64,
        /// Sender id
        user_id: i64,
    },
    /// Multi-user chat that is not tracked as a group (e.g. a channel)
    Room {
        /// Room chat id
        room_id: i64,
        /// Sender id, 0 when the sender is anonymous
        user_id: i64,
    },
}

impl EventSource {
    /// Sender user id
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        match self {
            Self::User { user_id } | Self::Group { user_id, .. } | Self::Room { user_id, .. } => {
                *user_id
            }
        }
    }

    /// Group id when the message came from a group chat
    #[must_use]
    pub const fn group_id(&self) -> Option<i64> {
        match self {
            Self::Group { group_id, .. } => Some(*group_id),
            Self::User { .. } | Self::Room { .. } => None,
        }
    }

    /// Statistics scope: the group id, or the direct scope for everything else
    #[must_use]
    pub fn scope_key(&self) -> String {
        self.group_id()
            .map_or_else(|| DIRECT_SCOPE.to_string(), |id| id.to_string())
    }
}

/// Reference to a downloadable attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Transport file id used to download the content
    pub file_id: String,
    /// Size in bytes as reported by the transport, 0 when unknown
    pub size: u32,
}

/// Message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain text, possibly a command
    Text(String),
    /// Photo
    Image(MediaRef),
    /// Video clip
    Video(MediaRef),
    /// Voice note or other unnamed audio
    Audio(MediaRef),
    /// Document with its original file name
    File {
        /// Attachment
        media: MediaRef,
        /// Original file name
        file_name: String,
    },
    /// Anything else (stickers, locations, polls...)
    Other(&'static str),
}

impl MessageContent {
    /// Short kind name for logs and generated file names
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::Audio(_) => "audio",
            Self::File { .. } => "file",
            Self::Other(kind) => *kind,
        }
    }

    /// Attachment to archive, `None` for text and unsupported kinds
    #[must_use]
    pub const fn media(&self) -> Option<&MediaRef> {
        match self {
            Self::Image(media) | Self::Video(media) | Self::Audio(media) => Some(media),
            Self::File { media, .. } => Some(media),
            Self::Text(_) | Self::Other(_) => None,
        }
    }

    /// Extension used when the transport gives no file name
    #[must_use]
    pub const fn default_extension(&self) -> &'static str {
        match self {
            Self::Image(_) => ".jpg",
            Self::Video(_) => ".mp4",
            Self::Audio(_) => ".ogg",
            Self::File { .. } | Self::Text(_) | Self::Other(_) => "",
        }
    }

    /// Name the file is archived and listed under.
    ///
    /// Documents keep their own name; other media get
    /// `<kind>-<YYYYmmdd-HHMMSS>-<message_id><ext>`.
    #[must_use]
    pub fn display_name(&self, message_id: &str, received_at: DateTime<Utc>) -> String {
        if let Self::File { file_name, .. } = self {
            if !file_name.is_empty() {
                return file_name.clone();
            }
        }
        let id = message_id.replace(':', "-");
        format!(
            "{}-{}-{}{}",
            self.kind(),
            received_at.format("%Y%m%d-%H%M%S"),
            id,
            self.default_extension()
        )
    }
}

/// One inbound message, already decoded from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Upstream-unique message identifier
    pub message_id: String,
    /// Chat and sender
    pub source: EventSource,
    /// Chat id replies are sent to
    pub reply_to: i64,
    /// Payload
    pub content: MessageContent,
}
