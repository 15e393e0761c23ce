//! Answer text to Telegram voice clip.
//!
//! Pipeline: strip decoration, synthesize MP3, transcode to OGG Opus,
//! read the result back. Both intermediate files live in a [`VoiceFiles`]
//! guard and are removed on every exit path.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::catalog::Language;
use super::transcode::Transcoder;
use super::tts::SpeechSynthesizer;

/// Errors from the synthesis/transcode pipeline.
#[derive(Debug)]
pub enum RenderError {
    /// Speech engine failed or returned nothing usable.
    Synthesis(String),
    /// Transcoder failed to start or exited non-zero.
    Transcode(String),
    /// A stage exceeded its time budget.
    Timeout { stage: &'static str, after: Duration },
    /// Temp file handling failed.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synthesis(msg) => write!(f, "synthesis failed: {}", msg),
            Self::Transcode(msg) => write!(f, "transcode failed: {}", msg),
            Self::Timeout { stage, after } => {
                write!(f, "{} timed out after {:.1}s", stage, after.as_secs_f32())
            }
            Self::Io { path, source } => write!(f, "temp file '{}': {}", path.display(), source),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Keep only alphanumerics and whitespace, then trim.
///
/// Emoji and punctuation either get read aloud by name or rejected.
pub fn strip_decoration(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

static NEXT_OP: AtomicU64 = AtomicU64::new(0);

/// The MP3/OGG pair for one render.
///
/// Names carry the user id for log correlation plus a per-operation
/// sequence number, so concurrent renders never share a path even for the
/// same user.
pub struct VoiceFiles {
    pub mp3: PathBuf,
    pub ogg: PathBuf,
}

impl VoiceFiles {
    pub fn new(dir: &Path, user_id: i64) -> Self {
        let op = NEXT_OP.fetch_add(1, Ordering::Relaxed);
        let stem = format!("voice_{}_{}_{}", user_id, std::process::id(), op);
        Self {
            mp3: dir.join(format!("{stem}.mp3")),
            ogg: dir.join(format!("{stem}.ogg")),
        }
    }

    /// Remove both files. Safe to call repeatedly; missing files are fine.
    pub fn cleanup(&self) {
        for path in [&self.mp3, &self.ogg] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {e}", path.display()),
            }
        }
    }
}

impl Drop for VoiceFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Renders answers into OGG Opus voice clips.
pub struct VoiceRenderer<S, C> {
    synthesizer: S,
    transcoder: C,
    work_dir: PathBuf,
}

impl<S: SpeechSynthesizer, C: Transcoder> VoiceRenderer<S, C> {
    pub fn new(synthesizer: S, transcoder: C, work_dir: PathBuf) -> Self {
        Self {
            synthesizer,
            transcoder,
            work_dir,
        }
    }

    /// Render `answer` for `user_id` and return the OGG bytes.
    pub async fn render(
        &self,
        answer: &str,
        lang: Language,
        user_id: i64,
    ) -> Result<Vec<u8>, RenderError> {
        let spoken = strip_decoration(answer);
        if spoken.is_empty() {
            return Err(RenderError::Synthesis(format!("no speakable text in {answer:?}")));
        }

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| RenderError::Io {
                path: self.work_dir.clone(),
                source: e,
            })?;

        let files = VoiceFiles::new(&self.work_dir, user_id);

        let mp3 = self.synthesizer.synthesize(&spoken, lang).await?;
        tokio::fs::write(&files.mp3, &mp3)
            .await
            .map_err(|e| RenderError::Io {
                path: files.mp3.clone(),
                source: e,
            })?;

        self.transcoder.transcode(&files.mp3, &files.ogg).await?;

        let ogg = tokio::fs::read(&files.ogg)
            .await
            .map_err(|e| RenderError::Io {
                path: files.ogg.clone(),
                source: e,
            })?;
        if ogg.is_empty() {
            return Err(RenderError::Transcode("transcoder produced an empty file".into()));
        }

        info!(
            "Rendered voice for user {} ({} bytes MP3 -> {} bytes OGG)",
            user_id,
            mp3.len(),
            ogg.len()
        );
        Ok(ogg)
    }
}
