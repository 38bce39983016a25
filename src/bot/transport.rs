//! Telegram side of the dispatcher collaborators
//!
//! Converts teloxide messages into [`InboundEvent`]s and implements content
//! download and replies on top of the Bot API, with retries.

use crate::ingest::{
    ContentSource, EventSource, FetchError, InboundEvent, MediaRef, MessageContent, ReplySender,
};
use crate::utils::retry_telegram_operation;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, FileMeta};

/// Downloads attachments through `getFile`
#[derive(Clone)]
pub struct TelegramContentSource {
    bot: Bot,
}

impl TelegramContentSource {
    /// Wrap a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ContentSource for TelegramContentSource {
    async fn fetch(&self, media: &MediaRef) -> Result<Bytes, FetchError> {
        let buffer = retry_telegram_operation(|| async {
            let file = self.bot.get_file(FileId(media.file_id.clone())).await?;
            let mut buf = Vec::new();
            self.bot.download_file(&file.path, &mut buf).await?;
            Ok(buf)
        })
        .await
        .map_err(|e| FetchError::Download(e.to_string()))?;

        Ok(Bytes::from(buffer))
    }
}

/// Sends plain-text replies with `sendMessage`
#[derive(Clone)]
pub struct TelegramReplySender {
    bot: Bot,
}

impl TelegramReplySender {
    /// Wrap a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ReplySender for TelegramReplySender {
    async fn send_reply(&self, chat_id: i64, text: &str) -> Result<()> {
        retry_telegram_operation(|| async {
            self.bot
                .send_message(ChatId(chat_id), text.to_string())
                .await
                .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))?;
            Ok(())
        })
        .await
    }
}

/// Safe extraction of the sender id; 0 when the sender is hidden
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Decode a Telegram message into a transport-neutral event.
///
/// Message ids are only unique within a chat, so the event id is
/// `"<chat_id>:<message_id>"`.
#[must_use]
pub fn event_from_message(msg: &Message) -> InboundEvent {
    let chat_id = msg.chat.id.0;
    let user_id = get_user_id_safe(msg);

    let source = if msg.chat.is_group() || msg.chat.is_supergroup() {
        EventSource::Group {
            group_id: chat_id,
            user_id,
        }
    } else if msg.chat.is_private() {
        EventSource::User { user_id }
    } else {
        EventSource::Room {
            room_id: chat_id,
            user_id,
        }
    };

    InboundEvent {
        message_id: format!("{chat_id}:{}", msg.id.0),
        source,
        reply_to: chat_id,
        content: content_from_message(msg),
    }
}

fn media_ref(file: &FileMeta) -> MediaRef {
    MediaRef {
        file_id: file.id.0.clone(),
        size: file.size,
    }
}

fn content_from_message(msg: &Message) -> MessageContent {
    // Telegram sends several sizes; the last one is the largest
    if let Some(photo) = msg.photo().and_then(<[_]>::last) {
        return MessageContent::Image(media_ref(&photo.file));
    }
    if let Some(video) = msg.video() {
        return MessageContent::Video(media_ref(&video.file));
    }
    if let Some(voice) = msg.voice() {
        return MessageContent::Audio(media_ref(&voice.file));
    }
    if let Some(audio) = msg.audio() {
        return match &audio.file_name {
            Some(name) => MessageContent::File {
                media: media_ref(&audio.file),
                file_name: name.clone(),
            },
            None => MessageContent::Audio(media_ref(&audio.file)),
        };
    }
    if let Some(doc) = msg.document() {
        return MessageContent::File {
            media: media_ref(&doc.file),
            file_name: doc.file_name.clone().unwrap_or_default(),
        };
    }
    if let Some(text) = msg.text() {
        return MessageContent::Text(text.to_string());
    }

    let kind = if msg.sticker().is_some() {
        "sticker"
    } else if msg.animation().is_some() {
        "animation"
    } else if msg.video_note().is_some() {
        "video_note"
    } else if msg.location().is_some() {
        "location"
    } else if msg.poll().is_some() {
        "poll"
    } else {
        "other"
    };
    MessageContent::Other(kind)
}
