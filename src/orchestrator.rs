//! Runs one download job: naming, yt-dlp download, optional transcode.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::{
    downloader::{DownloadRequest, Extractor},
    error::DownloadError,
    model::{AppEvent, MediaInfo, StreamDescriptor},
    naming,
    progress::{HookStatus, ProgressHook},
    transcoder::Transcoder,
};

/// Suffix of the intermediate file that is handed to the transcoder.
const TEMP_SUFFIX: &str = "_tmp.mp4";

/// Everything needed to run a download, captured when the user clicks.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub media: MediaInfo,
    pub stream: StreamDescriptor,
    pub destination: PathBuf,
    pub transcode: bool,
}

/// Video plus best audio when ffmpeg can merge them, otherwise the single
/// chosen stream, and the best combined stream as the last resort.
pub fn format_selector(format_id: &str, can_merge: bool) -> String {
    if can_merge {
        format!("{format_id}+bestaudio/{format_id}/best")
    } else {
        format!("{format_id}/best")
    }
}

/// Translated description when there is one, else the title.
pub fn display_text(media: &MediaInfo) -> String {
    media
        .translated_description
        .as_deref()
        .map(naming::truncate_description)
        .filter(|d| !naming::sanitize_filename(d).is_empty())
        .unwrap_or_else(|| media.title.clone())
}

pub struct Orchestrator {
    extractor: Arc<dyn Extractor>,
    transcoder: Option<Arc<dyn Transcoder>>,
}

impl Orchestrator {
    pub fn new(extractor: Arc<dyn Extractor>, transcoder: Option<Arc<dyn Transcoder>>) -> Self {
        Self { extractor, transcoder }
    }

    pub fn extractor(&self) -> &Arc<dyn Extractor> {
        &self.extractor
    }

    pub fn can_transcode(&self) -> bool {
        self.transcoder.is_some()
    }

    /// Downloads (and optionally transcodes) the plan's stream, reporting
    /// progress on `events`. Returns the final file path.
    ///
    /// On failure nothing is deleted: partial downloads and the untranscoded
    /// temp file stay where they are.
    pub async fn run(
        &self,
        plan: &DownloadPlan,
        events: &UnboundedSender<AppEvent>,
    ) -> Result<PathBuf, DownloadError> {
        let media = &plan.media;
        let base = naming::display_name(&display_text(media), media.site.fallback_prefix(), &media.id);
        let stem = naming::unique_stem(&plan.destination, &base, &[".mp4", TEMP_SUFFIX]);
        let file_name = format!("{stem}.mp4");
        let final_path = plan.destination.join(&file_name);

        let transcoder = if plan.transcode { self.transcoder.as_deref() } else { None };
        if plan.transcode && transcoder.is_none() {
            let _ = events.send(AppEvent::Status(
                "ffmpeg not found, saving without transcoding".to_string(),
            ));
        }

        let temp_path = transcoder.map(|_| plan.destination.join(format!("{stem}{TEMP_SUFFIX}")));
        let output_template = temp_path
            .clone()
            .unwrap_or_else(|| plan.destination.join(format!("{stem}.%(ext)s")));

        let request = DownloadRequest {
            url: media.url.clone(),
            format_selector: format_selector(&plan.stream.id, self.can_transcode()),
            output_template,
            ffmpeg_location: self
                .transcoder
                .as_ref()
                .and_then(|t| t.location())
                .map(Path::to_path_buf),
        };

        info!(file = %file_name, format = %request.format_selector, "download job started");
        let _ = events.send(AppEvent::JobStarted { file_name: file_name.clone() });

        let transcoding_next = temp_path.is_some();
        let on_progress = |hook: ProgressHook| {
            if let Some(event) = progress_event(&hook, transcoding_next) {
                let _ = events.send(event);
            }
        };
        self.extractor.download(&request, &on_progress).await?;

        let (Some(transcoder), Some(temp_path)) = (transcoder, temp_path) else {
            return Ok(final_path);
        };

        let _ = events.send(AppEvent::Status("Download finished, transcoding…".to_string()));
        transcoder
            .transcode(&temp_path, &final_path)
            .await
            .map_err(|source| DownloadError::Transcode {
                source,
                kept: temp_path.clone(),
            })?;

        if let Err(e) = std::fs::remove_file(&temp_path) {
            warn!(path = %temp_path.display(), error = %e, "could not remove temp file");
        }
        Ok(final_path)
    }
}

fn progress_event(hook: &ProgressHook, transcoding_next: bool) -> Option<AppEvent> {
    match hook.status {
        HookStatus::Downloading => {
            let percent = hook.percent()?;
            Some(AppEvent::Progress {
                percent,
                status: format!("Downloading {} | speed: {}", hook.percent_str, hook.speed_str),
            })
        }
        HookStatus::Finished => Some(AppEvent::Progress {
            percent: 100.0,
            status: if transcoding_next {
                "Download finished, transcoding…".to_string()
            } else {
                "Download finished".to_string()
            },
        }),
    }
}
