//! Magic 8 Ball core: answer selection, cooldown and voice rendering.

pub mod catalog;
pub mod dispatcher;
pub mod rate_limit;
pub mod selector;
pub mod telegram;
pub mod transcode;
pub mod tts;
pub mod voice;

#[cfg(test)]
mod tests;

pub use catalog::{Catalog, MenuCommand};
pub use dispatcher::{Content, Dispatcher, Incoming, Sender};
pub use rate_limit::RateLimiter;
pub use telegram::TelegramClient;
pub use transcode::Ffmpeg;
pub use tts::GoogleTts;
pub use voice::VoiceRenderer;
