//! Outbound replies, and the teloxide-backed implementation.

use std::fmt;
use std::future::Future;

use teloxide::prelude::*;
use teloxide::types::{InputFile, KeyboardButton, KeyboardMarkup, ParseMode};
use tracing::info;

use super::catalog::Language;

/// How Telegram should interpret a text reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

/// A reply could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// Where replies go.
pub trait Transport: Send + Sync {
    /// Send a text reply; `keyboard` attaches the menu of that language.
    fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
        keyboard: Option<Language>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send an OGG Opus voice note.
    fn send_voice(
        &self,
        chat_id: i64,
        ogg: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// One-row reply keyboard with the three menu labels.
pub fn menu_keyboard(lang: Language) -> KeyboardMarkup {
    let row = lang
        .menu_labels()
        .into_iter()
        .map(KeyboardButton::new)
        .collect::<Vec<_>>();
    KeyboardMarkup::new(vec![row]).resize_keyboard()
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl Transport for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
        keyboard: Option<Language>,
    ) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if format == TextFormat::Html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(lang) = keyboard {
            request = request.reply_markup(menu_keyboard(lang));
        }

        request
            .await
            .map(|_| ())
            .map_err(|e| TransportError(format!("Failed to send: {e}")))
    }

    async fn send_voice(&self, chat_id: i64, ogg: Vec<u8>) -> Result<(), TransportError> {
        info!("🔊 Sending voice to chat {} ({} bytes)", chat_id, ogg.len());

        let input_file = InputFile::memory(ogg).file_name("voice.ogg");
        self.bot
            .send_voice(ChatId(chat_id), input_file)
            .await
            .map(|_| ())
            .map_err(|e| TransportError(format!("Failed to send voice: {e}")))
    }
}
