//! Application state and the background tasks spawned from UI actions.
//!
//! The controller is owned by the UI. Every action spawns one tokio task;
//! tasks report back only through the [`AppEvent`] channel.
use std::{path::PathBuf, sync::Arc};

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tracing::{error, info, warn};

use crate::{
    clipboard,
    config::{Config, ConfigStore},
    downloader::Extractor,
    error::{ClipboardError, ConfigError, InputError},
    model::{AppEvent, MediaInfo, StreamDescriptor},
    orchestrator::{DownloadPlan, Orchestrator},
    resolver,
    state::{BusyFlag, LatestRequest},
    thumbnail,
    transcoder::Transcoder,
    translate::Translate,
};

/// The external collaborators the controller drives.
pub struct Services {
    pub extractor: Arc<dyn Extractor>,
    pub transcoder: Option<Arc<dyn Transcoder>>,
    pub translator: Option<Arc<dyn Translate>>,
}

pub struct Controller {
    runtime: Handle,
    events: UnboundedSender<AppEvent>,
    busy: BusyFlag,
    analyses: LatestRequest,
    orchestrator: Arc<Orchestrator>,
    translator: Option<Arc<dyn Translate>>,
    store: ConfigStore,
    config: Config,
}

impl Controller {
    pub fn new(
        runtime: Handle,
        services: Services,
        store: ConfigStore,
    ) -> (Self, UnboundedReceiver<AppEvent>) {
        let (events, rx) = unbounded_channel();
        let config = store.load();
        let controller = Self {
            runtime,
            events,
            busy: BusyFlag::default(),
            analyses: LatestRequest::default(),
            orchestrator: Arc::new(Orchestrator::new(services.extractor, services.transcoder)),
            translator: services.translator,
            store,
            config,
        };
        (controller, rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn can_transcode(&self) -> bool {
        self.orchestrator.can_transcode()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Whether `seq` belongs to the most recent analyze request.
    pub fn is_current_analysis(&self, seq: u64) -> bool {
        self.analyses.is_latest(seq)
    }

    /// Switches the download folder and persists it right away.
    pub fn set_download_dir(&mut self, dir: PathBuf) -> Result<(), ConfigError> {
        info!(path = %dir.display(), "download folder changed");
        self.config.download_path = dir;
        self.store.save(&self.config)
    }

    fn status(&self, text: impl Into<String>) {
        let _ = self.events.send(AppEvent::Status(text.into()));
    }

    /// Reads a link from the clipboard.
    pub fn paste_url(&self) -> Result<String, ClipboardError> {
        let result = clipboard::read_url();
        match &result {
            Ok(url) => info!(url = %url, "link pasted from clipboard"),
            Err(ClipboardError::NoUrl) => info!("clipboard holds no link"),
            Err(e @ ClipboardError::Access(_)) => warn!(error = %e, "clipboard unavailable"),
        }
        if result.is_err() {
            self.status("Clipboard has no valid link");
        }
        result
    }

    /// Starts analyzing `url` in the background and returns the request's
    /// sequence number. Results of any earlier request become stale.
    pub fn analyze(&self, url: &str, translate: bool) -> Result<u64, InputError> {
        let seq = self.analyses.issue();
        let url = url.trim().to_string();
        if !url.contains("http") {
            self.status("Clipboard has no valid link");
            return Err(InputError::NotAUrl(url));
        }

        self.status("Analyzing video, please wait…");
        let extractor = Arc::clone(self.orchestrator.extractor());
        let translator = if translate { self.translator.clone() } else { None };
        let events = self.events.clone();
        let runtime = self.runtime.clone();

        self.runtime.spawn(async move {
            match resolver::analyze(extractor.as_ref(), translator.as_deref(), &url).await {
                Ok(analysis) => {
                    if let Some(thumb) = analysis.media.thumbnail_url.clone() {
                        let video_id = analysis.media.id.clone();
                        let events = events.clone();
                        runtime.spawn_blocking(move || {
                            if let Some(image) = thumbnail::fetch_thumbnail(&thumb) {
                                let _ = events.send(AppEvent::Thumbnail { video_id, image });
                            }
                        });
                    }
                    let _ = events.send(AppEvent::Analyzed { seq, analysis });
                }
                Err(e) => {
                    error!(url = %url, error = %e, "analysis failed");
                    let message = format!("Parse failed: {e}");
                    let _ = events.send(AppEvent::AnalyzeFailed { seq, message });
                }
            }
        });
        Ok(seq)
    }

    /// Starts downloading `stream`, unless a download is already running.
    pub fn start_download(
        &self,
        media: &MediaInfo,
        stream: &StreamDescriptor,
        transcode: bool,
    ) -> Result<(), InputError> {
        let Some(guard) = self.busy.try_acquire() else {
            warn!(format = %stream.id, "download rejected, another one is running");
            self.status("A download is already in progress, please wait");
            return Err(InputError::Busy);
        };

        let plan = DownloadPlan {
            media: media.clone(),
            stream: stream.clone(),
            destination: self.config.download_path.clone(),
            transcode,
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let events = self.events.clone();

        self.runtime.spawn(async move {
            let result = orchestrator.run(&plan, &events).await;
            drop(guard);
            let event = match result {
                Ok(path) => {
                    info!(path = %path.display(), "download job finished");
                    AppEvent::JobFinished {
                        ok: true,
                        status: format!("Done: {}", path.display()),
                    }
                }
                Err(e) => {
                    error!(error = %e, "download job failed");
                    AppEvent::JobFinished { ok: false, status: format!("Failed: {e}") }
                }
            };
            let _ = events.send(event);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        downloader::{DownloadRequest, ProgressCallback, RawFormat, RawInfo},
        error::ExtractError,
        model::Site,
    };
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Blocks every download until the gate is opened.
    struct GatedExtractor {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Extractor for GatedExtractor {
        async fn probe(&self, _url: &str) -> Result<RawInfo, ExtractError> {
            Ok(RawInfo {
                id: Some("1".into()),
                title: Some("clip".into()),
                formats: vec![RawFormat {
                    format_id: "a".into(),
                    ext: Some("mp4".into()),
                    vcodec: Some("h264".into()),
                    resolution: Some("1920x1080".into()),
                    tbr: Some(5000.0),
                    ..Default::default()
                }],
                ..Default::default()
            })
        }

        async fn download(
            &self,
            request: &DownloadRequest,
            _on_progress: ProgressCallback<'_>,
        ) -> Result<(), ExtractError> {
            self.gate.notified().await;
            let path = request.output_template.display().to_string().replace("%(ext)s", "mp4");
            std::fs::write(path, b"video")?;
            Ok(())
        }
    }

    fn controller(dir: &std::path::Path, gate: Arc<Notify>) -> (Controller, UnboundedReceiver<AppEvent>) {
        Controller::new(
            Handle::current(),
            Services {
                extractor: Arc::new(GatedExtractor { gate }),
                transcoder: None,
                translator: None,
            },
            ConfigStore::in_dir(dir),
        )
    }

    fn media() -> MediaInfo {
        MediaInfo {
            url: "https://x.com/u/status/1".into(),
            id: "1".into(),
            title: "clip".into(),
            description: None,
            translated_description: None,
            thumbnail_url: None,
            site: Site::Twitter,
        }
    }

    fn stream() -> StreamDescriptor {
        StreamDescriptor {
            id: "a".into(),
            resolution: "1920x1080".into(),
            width: 1920,
            height: 1080,
            size_bytes: 0,
            size_label: "unknown size".into(),
            bitrate: 5000.0,
        }
    }

    #[tokio::test]
    async fn second_download_is_rejected_while_first_runs() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let (controller, mut rx) = controller(dir.path(), gate.clone());

        assert_eq!(controller.start_download(&media(), &stream(), false), Ok(()));
        assert_eq!(controller.start_download(&media(), &stream(), false), Err(InputError::Busy));
        assert!(controller.is_busy());

        gate.notify_one();
        let mut rejections = 0;
        let mut finished = 0;
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Status(s) if s.contains("already in progress") => rejections += 1,
                AppEvent::JobFinished { ok, .. } => {
                    assert!(ok);
                    finished += 1;
                    break;
                }
                _ => {}
            }
        }
        assert_eq!((finished, rejections), (1, 1));
        assert!(!controller.is_busy());
        assert!(dir.path().join("downloads").join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn non_links_are_rejected_without_work() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, mut rx) = controller(dir.path(), Arc::new(Notify::new()));

        let err = controller.analyze("  not a link ", false).unwrap_err();
        assert_eq!(err, InputError::NotAUrl("not a link".into()));
        assert!(matches!(rx.try_recv(), Ok(AppEvent::Status(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn analysis_result_is_delivered_as_event() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, mut rx) = controller(dir.path(), Arc::new(Notify::new()));

        let seq = controller.analyze("https://x.com/u/status/1", false).unwrap();
        loop {
            match rx.recv().await.expect("channel open") {
                AppEvent::Analyzed { seq: got, analysis } => {
                    assert_eq!(got, seq);
                    assert!(controller.is_current_analysis(got));
                    assert_eq!(analysis.media.title, "clip");
                    assert_eq!(analysis.streams[0].id, "a");
                    break;
                }
                AppEvent::AnalyzeFailed { message, .. } => panic!("{message}"),
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn older_analysis_results_are_stale() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, mut rx) = controller(dir.path(), Arc::new(Notify::new()));

        let first = controller.analyze("https://x.com/u/status/1", false).unwrap();
        let second = controller.analyze("https://x.com/u/status/2", false).unwrap();
        assert_ne!(first, second);

        let mut answered = Vec::new();
        while answered.len() < 2 {
            if let AppEvent::Analyzed { seq, .. } = rx.recv().await.expect("channel open") {
                answered.push(seq);
            }
        }
        answered.sort_unstable();
        assert_eq!(answered, [first, second]);
        assert!(!controller.is_current_analysis(first));
        assert!(controller.is_current_analysis(second));
    }

    #[tokio::test]
    async fn rejected_input_still_invalidates_pending_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _rx) = controller(dir.path(), Arc::new(Notify::new()));

        let pending = controller.analyze("https://x.com/u/status/1", false).unwrap();
        assert!(controller.analyze("garbage", false).is_err());
        assert!(!controller.is_current_analysis(pending));
    }

    #[tokio::test]
    async fn changing_folder_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("elsewhere");
        std::fs::create_dir(&target).unwrap();
        let (mut controller, _rx) = controller(dir.path(), Arc::new(Notify::new()));

        controller.set_download_dir(target.clone()).unwrap();
        assert_eq!(ConfigStore::in_dir(dir.path()).load().download_path, target);
    }
}
