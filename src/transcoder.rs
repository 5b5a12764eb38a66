//! ffmpeg post-processing into a widely playable H.264/AAC MP4.
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tracing::info;

use crate::{
    error::TranscodeError,
    tools::{hidden_command, last_error_line},
};

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Path handed to yt-dlp so it can merge separate video and audio streams.
    fn location(&self) -> Option<&Path>;

    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

pub struct Ffmpeg {
    binary: PathBuf,
}

impl Ffmpeg {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

pub fn transcode_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-i".to_owned(),
        input.display().to_string(),
        "-c:v".to_owned(),
        "libx264".to_owned(),
        "-pix_fmt".to_owned(),
        "yuv420p".to_owned(),
        "-c:a".to_owned(),
        "aac".to_owned(),
        "-y".to_owned(),
        output.display().to_string(),
    ]
}

#[async_trait]
impl Transcoder for Ffmpeg {
    fn location(&self) -> Option<&Path> {
        Some(&self.binary)
    }

    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        info!(input = %input.display(), output = %output.display(), "transcoding");
        let result = hidden_command(&self.binary)
            .args(transcode_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if result.status.success() {
            Ok(())
        } else {
            Err(TranscodeError::Failed {
                code: result.status.code(),
                message: last_error_line(&String::from_utf8_lossy(&result.stderr)),
            })
        }
    }
}
