use std::path::PathBuf;

use eframe::egui::ColorImage;

/// Which site a link belongs to; drives grouping and fallback naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Xiaohongshu,
    Twitter,
    Other,
}

impl Site {
    pub fn detect(url: &str) -> Self {
        let host = url
            .split("://")
            .nth(1)
            .unwrap_or(url)
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

        if matches("xiaohongshu.com") || matches("xhslink.com") {
            Site::Xiaohongshu
        } else if matches("twitter.com") || matches("x.com") || matches("t.co") {
            Site::Twitter
        } else {
            Site::Other
        }
    }

    /// Prefix of the synthetic filename used when the title is unusable.
    pub fn fallback_prefix(self) -> &'static str {
        match self {
            Site::Xiaohongshu => "xhs",
            Site::Twitter => "twitter",
            Site::Other => "video",
        }
    }

    pub fn default_title(self) -> &'static str {
        match self {
            Site::Xiaohongshu => "xhs_video",
            Site::Twitter => "twitter_video",
            Site::Other => "video",
        }
    }

    /// Xiaohongshu lists are grouped by resolution label, everything else by height.
    pub fn resolution_key(self) -> ResolutionKey {
        match self {
            Site::Xiaohongshu => ResolutionKey::Label,
            Site::Twitter | Site::Other => ResolutionKey::Height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKey {
    Label,
    Height,
}

/// One downloadable MP4 rendition, as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub id: String,
    /// e.g. "1920x1080"
    pub resolution: String,
    pub width: u32,
    pub height: u32,
    /// 0 when unknown
    pub size_bytes: u64,
    pub size_label: String,
    /// Total bitrate in kbit/s, 0 when unknown
    pub bitrate: f64,
}

/// Metadata about the analyzed media item.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub url: String,
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub translated_description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub site: Site,
}

/// Result of a successful analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub media: MediaInfo,
    pub streams: Vec<StreamDescriptor>,
}

/// The single in-flight download, as tracked by the UI.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub source_url: String,
    pub format_id: String,
    pub destination: PathBuf,
    pub file_name: Option<String>,
    /// Percentage (0.0 to 100.0)
    pub progress: f32,
    pub status: String,
    pub completed: bool,
}

impl DownloadJob {
    pub fn new(source_url: String, format_id: String, destination: PathBuf) -> Self {
        Self {
            source_url,
            format_id,
            destination,
            file_name: None,
            progress: 0.0,
            status: "Starting download…".to_string(),
            completed: false,
        }
    }

    /// Each stream of a merged download reports its own 0..100 run.
    pub fn apply_progress(&mut self, percent: f32, status: String) {
        self.progress = percent.clamp(0.0, 100.0);
        self.status = status;
    }

    pub fn finish(&mut self, ok: bool, status: String) {
        if ok {
            self.progress = 100.0;
        }
        self.status = status;
        self.completed = true;
    }
}

/// Messages sent from background tasks to the UI thread.
pub enum AppEvent {
    Status(String),
    /// `seq` identifies the analyze request this answers.
    Analyzed { seq: u64, analysis: Analysis },
    AnalyzeFailed { seq: u64, message: String },
    Thumbnail { video_id: String, image: ColorImage },
    JobStarted { file_name: String },
    Progress { percent: f32, status: String },
    JobFinished { ok: bool, status: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sites_from_host() {
        assert_eq!(Site::detect("https://www.xiaohongshu.com/explore/abc"), Site::Xiaohongshu);
        assert_eq!(Site::detect("http://xhslink.com/a/xyz"), Site::Xiaohongshu);
        assert_eq!(Site::detect("https://x.com/user/status/1"), Site::Twitter);
        assert_eq!(Site::detect("https://mobile.twitter.com/u/status/1"), Site::Twitter);
        assert_eq!(Site::detect("https://example.com/x.com"), Site::Other);
        assert_eq!(Site::detect("https://box.com/v"), Site::Other);
    }

    #[test]
    fn job_tracks_progress_and_completion() {
        let mut job = DownloadJob::new("u".into(), "f".into(), PathBuf::from("."));
        job.apply_progress(40.0, "a".into());
        job.apply_progress(140.0, "b".into());
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.status, "b");
        job.finish(true, "done".into());
        assert_eq!(job.progress, 100.0);
        assert!(job.completed);
    }
}
