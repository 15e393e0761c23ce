//! Text-to-speech using the Google Translate speech endpoint.
//!
//! Produces MP3 audio. Long text is sent in chunks of at most
//! [`MAX_CHUNK_CHARS`] characters and the MP3 frames are concatenated,
//! which players handle as one continuous stream.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use super::catalog::Language;
use super::voice::RenderError;

/// Default speech endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Longest text the endpoint accepts in one request.
pub const MAX_CHUNK_CHARS: usize = 100;

/// Turns text into compressed speech audio.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(
        &self,
        text: &str,
        lang: Language,
    ) -> impl Future<Output = Result<Vec<u8>, RenderError>> + Send;
}

/// TTS client for the Google Translate endpoint.
pub struct GoogleTts {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GoogleTts {
    /// `timeout` bounds each HTTP request, connect included.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // The endpoint refuses requests without a browser-like agent
            .user_agent("Mozilla/5.0 (X11; Linux x86_64)")
            .build()?;
        Ok(Self {
            endpoint,
            timeout,
            client,
        })
    }

    fn chunk_url(&self, chunk: &str, lang: Language, idx: usize, total: usize) -> String {
        format!(
            "{}?ie=UTF-8&client=tw-ob&tl={}&q={}&total={}&idx={}&textlen={}",
            self.endpoint,
            lang.code(),
            urlencoding::encode(chunk),
            total,
            idx,
            chunk.chars().count(),
        )
    }

    async fn fetch_chunk(&self, url: &str) -> Result<Vec<u8>, RenderError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::Timeout {
                    stage: "synthesis",
                    after: self.timeout,
                }
            } else {
                RenderError::Synthesis(format!("TTS request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(RenderError::Synthesis(format!("TTS error {}: {}", status, body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Synthesis(format!("Failed to read TTS response: {e}")))?;
        Ok(bytes.to_vec())
    }
}

impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, lang: Language) -> Result<Vec<u8>, RenderError> {
        let chunks = split_for_tts(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(RenderError::Synthesis("nothing to speak".into()));
        }
        let preview: String = text.chars().take(50).collect();
        info!("TTS ({}): \"{}\"", lang.code(), preview);

        let mut audio = Vec::new();
        let total = chunks.len();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, lang, idx, total);
            let data = self.fetch_chunk(&url).await?;
            debug!("Chunk {}/{}: {} bytes of MP3", idx + 1, total, data.len());
            audio.extend_from_slice(&data);
        }

        if audio.is_empty() {
            return Err(RenderError::Synthesis("TTS returned no audio".into()));
        }
        Ok(audio)
    }
}

/// Split `text` on whitespace into chunks of at most `max` characters.
///
/// Words longer than `max` are cut at character boundaries.
pub fn split_for_tts(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: &str = word;
        while word.chars().count() > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let cut = word.char_indices().nth(max).map(|(i, _)| i).unwrap_or(word.len());
            chunks.push(word[..cut].to_string());
            word = &word[cut..];
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
