//! MP3 to OGG Opus conversion for Telegram voice messages.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::voice::RenderError;

/// Voice notes are played back as mono 24 kHz Opus.
pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u32 = 1;

/// Converts an audio file on disk into the voice-message format.
pub trait Transcoder: Send + Sync {
    fn transcode(
        &self,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<(), RenderError>> + Send;
}

/// Transcoder backed by an `ffmpeg` executable.
pub struct Ffmpeg {
    program: PathBuf,
    timeout: Duration,
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-ar")
            .arg(SAMPLE_RATE.to_string())
            .arg("-ac")
            .arg(CHANNELS.to_string())
            .args(["-c:a", "libopus"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must not leave ffmpeg running
            .kill_on_drop(true);
        cmd
    }
}

impl Transcoder for Ffmpeg {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), RenderError> {
        let run = self.command(input, output).output();

        let result = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| RenderError::Timeout {
                stage: "transcode",
                after: self.timeout,
            })?
            .map_err(|e| {
                RenderError::Transcode(format!("Failed to run {}: {e}", self.program.display()))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(RenderError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                result.status, tail
            )));
        }

        debug!("Transcoded {} -> {}", input.display(), output.display());
        Ok(())
    }
}
