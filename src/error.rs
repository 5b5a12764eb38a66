//! Error types for each stage of the analyze → download → transcode pipeline.
//!
//! Every error is caught at the boundary of its background task and turned
//! into status text; none of them terminate the application.
use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the yt-dlp extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("yt-dlp was not found (bundle it next to the app or install it on PATH)")]
    ToolNotFound,

    #[error("failed to run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("yt-dlp exited with {code:?}: {message}")]
    Failed { code: Option<i32>, message: String },

    #[error("yt-dlp returned unreadable metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while turning a URL into a list of downloadable streams.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("no playable MP4 video stream found")]
    NoPlayableStreams,
}

/// Failures of the ffmpeg post-processing step.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to run ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ffmpeg exited with {code:?}: {message}")]
    Failed { code: Option<i32>, message: String },
}

/// Failures of a download job. Files already written are left on disk.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download failed: {0}")]
    Download(#[from] ExtractError),

    #[error("transcode failed: {source} (downloaded file kept at {})", .kept.display())]
    Transcode {
        #[source]
        source: TranscodeError,
        kept: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected translation response")]
    Malformed,
}

/// Why a URL could not be taken from the clipboard.
///
/// Both variants read the same to the user; they are logged differently.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard access denied: {0}")]
    Access(String),

    #[error("clipboard holds no link")]
    NoUrl,
}

/// Rejections that happen on the UI thread before any work is spawned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("not a valid link: {0:?}")]
    NotAUrl(String),

    #[error("a download is already in progress")]
    Busy,
}
