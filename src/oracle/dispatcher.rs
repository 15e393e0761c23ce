//! Per-message routing: menu, rejection, or a spoken answer.
//!
//! Every message is classified independently. The rate limiter is the only
//! shared mutable state; nothing is locked across an `.await`.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::catalog::{self, Catalog, Language, MenuCommand};
use super::rate_limit::RateLimiter;
use super::selector::select;
use super::telegram::{TextFormat, Transport};
use super::transcode::Transcoder;
use super::tts::SpeechSynthesizer;
use super::voice::VoiceRenderer;

/// Who sent a message.
#[derive(Debug, Clone)]
pub struct Sender {
    pub user_id: i64,
    /// For logs only.
    pub display_name: String,
    /// Telegram `language_code`.
    pub locale: Option<String>,
}

/// Message payload after transport-level parsing.
#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    /// A recognized slash command.
    Command(MenuCommand),
    /// Photo, sticker, voice note, document and the like.
    Attachment,
}

/// One inbound message.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub chat_id: i64,
    pub sender: Sender,
    pub content: Content,
}

/// What the dispatcher did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Menu(MenuCommand),
    OnlyText,
    NotAQuestion,
    RateLimited,
    /// Voice clip and text answer both sent.
    Answered(&'static str),
    /// Voice failed; the text answer went out alone.
    TextOnly(&'static str),
    /// Nothing reached the user.
    Failed,
}

/// Routes messages and orchestrates selection, rendering and replies.
pub struct Dispatcher<T, S, C> {
    catalog: Catalog,
    limiter: RateLimiter,
    renderer: VoiceRenderer<S, C>,
    transport: T,
}

impl<T, S, C> Dispatcher<T, S, C>
where
    T: Transport,
    S: SpeechSynthesizer,
    C: Transcoder,
{
    pub fn new(
        catalog: Catalog,
        limiter: RateLimiter,
        renderer: VoiceRenderer<S, C>,
        transport: T,
    ) -> Self {
        Self {
            catalog,
            limiter,
            renderer,
            transport,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn handle(&self, msg: Incoming) -> Outcome {
        self.handle_at(msg, Instant::now()).await
    }

    /// Handle `msg` as if it arrived at `now`.
    pub async fn handle_at(&self, msg: Incoming, now: Instant) -> Outcome {
        let lang = Language::from_locale(msg.sender.locale.as_deref());

        let text = match &msg.content {
            Content::Attachment => {
                debug!("Attachment from {} ({})", msg.sender.display_name, msg.sender.user_id);
                self.reply(msg.chat_id, catalog::ONLY_TEXT, TextFormat::Plain, None)
                    .await;
                return Outcome::OnlyText;
            }
            Content::Command(cmd) => return self.menu(msg.chat_id, *cmd, lang).await,
            Content::Text(text) => text.trim(),
        };

        if let Some(cmd) = MenuCommand::from_label(text) {
            return self.menu(msg.chat_id, cmd, lang).await;
        }

        if !text.contains('?') {
            self.reply(msg.chat_id, catalog::not_a_question(lang), TextFormat::Html, None)
                .await;
            return Outcome::NotAQuestion;
        }

        if !self.limiter.allow(msg.sender.user_id, now) {
            info!("⏱ {} ({}) is asking too fast", msg.sender.display_name, msg.sender.user_id);
            self.reply(msg.chat_id, catalog::please_wait(lang), TextFormat::Plain, None)
                .await;
            return Outcome::RateLimited;
        }

        self.answer(&msg, text, lang).await
    }

    async fn menu(&self, chat_id: i64, cmd: MenuCommand, lang: Language) -> Outcome {
        let keyboard = cmd.shows_keyboard().then_some(lang);
        self.reply(chat_id, cmd.reply(lang), TextFormat::Html, keyboard)
            .await;
        Outcome::Menu(cmd)
    }

    /// Static replies are best effort.
    async fn reply(&self, chat_id: i64, text: &str, format: TextFormat, keyboard: Option<Language>) {
        if let Err(e) = self.transport.send_text(chat_id, text, format, keyboard).await {
            warn!("Reply to chat {} dropped: {e}", chat_id);
        }
    }

    async fn answer(&self, msg: &Incoming, question: &str, lang: Language) -> Outcome {
        let Sender {
            user_id,
            display_name,
            ..
        } = &msg.sender;

        let answer = select(&self.catalog, lang);
        info!("[{} | {}] asked: {} → Answer: {}", display_name, user_id, question, answer);

        let voice_sent = match self.renderer.render(answer, lang, *user_id).await {
            Ok(ogg) => match self.transport.send_voice(msg.chat_id, ogg).await {
                Ok(()) => true,
                Err(e) => {
                    error!(
                        "Voice send failed for [{} | {}] question {:?} answer {:?}: {e}",
                        display_name, user_id, question, answer
                    );
                    false
                }
            },
            Err(e) => {
                error!(
                    "Voice render failed for [{} | {}] question {:?} answer {:?}: {e}",
                    display_name, user_id, question, answer
                );
                false
            }
        };

        let text = format!("{}{}", catalog::ANSWER_PREFIX, answer);
        if let Err(e) = self
            .transport
            .send_text(msg.chat_id, &text, TextFormat::Plain, None)
            .await
        {
            error!(
                "Answer lost for [{} | {}] question {:?} answer {:?}: {e}",
                display_name, user_id, question, answer
            );
            return if voice_sent {
                Outcome::Answered(answer)
            } else {
                Outcome::Failed
            };
        }

        if voice_sent {
            Outcome::Answered(answer)
        } else {
            Outcome::TextOnly(answer)
        }
    }
}
