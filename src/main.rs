//! Desktop downloader for Xiaohongshu / Twitter videos.

// Clipboard link intake
mod clipboard;
// Persisted download folder
mod config;
// Application state and background tasks
mod controller;
// yt-dlp adapter
mod downloader;
// Error types
mod error;
// CJK font fallback
mod fonts;
// Data models for streams, jobs and UI events
mod model;
// Filename policy
mod naming;
// Download + transcode jobs
mod orchestrator;
// Progress parsing utilities
mod progress;
// Format list filtering and sorting
mod resolver;
// Busy flag for downloads
mod state;
// Thumbnail fetching module
mod thumbnail;
// Locating yt-dlp / ffmpeg
mod tools;
// ffmpeg post-processing
mod transcoder;
// Description translation
mod translate;

use std::sync::Arc;

use config::ConfigStore;
use controller::{Controller, Services};
use downloader::YtDlp;
use model::{Analysis, AppEvent, DownloadJob, StreamDescriptor};
use tools::Tool;
use transcoder::{Ffmpeg, Transcoder};
use translate::GoogleTranslate;

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use egui::{Color32, TextureHandle, TextureOptions, Visuals};
use tokio::{runtime::Runtime, sync::mpsc::UnboundedReceiver};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Program entry point: initializes logging and the runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("social_video_dl=info")),
        )
        .init();

    // The runtime lives for the whole session; the controller gets a handle
    let rt = Runtime::new()?;

    let ffmpeg = tools::locate(Tool::Ffmpeg);
    let services = Services {
        extractor: Arc::new(YtDlp::new(tools::locate(Tool::YtDlp))),
        transcoder: ffmpeg.map(|path| Arc::new(Ffmpeg::new(path)) as Arc<dyn Transcoder>),
        translator: Some(Arc::new(GoogleTranslate::default())),
    };
    let store = ConfigStore::in_dir(&std::env::current_dir()?);
    let (controller, events) = Controller::new(rt.handle().clone(), services, store);
    info!(
        folder = %controller.config().download_path.display(),
        ffmpeg = controller.can_transcode(),
        "starting"
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 760.0])
            .with_always_on_top(),
        ..Default::default()
    };
    eframe::run_native(
        "Video Downloader",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            fonts::install_cjk_font(&cc.egui_ctx);
            Box::new(DownloaderApp::new(controller, events))
        }),
    )?;
    Ok(())
}

/// Application state for the GUI
struct DownloaderApp {
    controller: Controller,
    /// Messages from background tasks
    events: UnboundedReceiver<AppEvent>,
    /// Link being analyzed
    url_input: String,
    status: String,
    analysis: Option<Analysis>,
    thumbnail: Option<TextureHandle>,
    job: Option<DownloadJob>,
    transcode: bool,
    translate: bool,
    always_on_top: bool,
}

impl DownloaderApp {
    fn new(controller: Controller, events: UnboundedReceiver<AppEvent>) -> Self {
        Self {
            controller,
            events,
            url_input: String::new(),
            status: "Ready".to_string(),
            analysis: None,
            thumbnail: None,
            job: None,
            transcode: false,
            translate: false,
            always_on_top: true,
        }
    }

    /// Applies every pending background update; only the UI thread mutates state.
    fn drain_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                AppEvent::Analyzed { seq, .. } | AppEvent::AnalyzeFailed { seq, .. }
                    if !self.controller.is_current_analysis(seq) =>
                {
                    debug!(seq, "dropping result of a replaced analysis");
                }
                AppEvent::Status(text) => self.status = text,
                AppEvent::Analyzed { analysis, .. } => {
                    let title: String = analysis.media.title.chars().take(30).collect();
                    self.status = format!("Parsed: {title}…");
                    self.thumbnail = None;
                    self.analysis = Some(analysis);
                }
                AppEvent::AnalyzeFailed { message, .. } => {
                    self.status = message;
                    self.analysis = None;
                    self.thumbnail = None;
                }
                AppEvent::Thumbnail { video_id, image } => {
                    // Ignore thumbnails for an analysis that has been replaced
                    if self.analysis.as_ref().is_some_and(|a| a.media.id == video_id) {
                        self.thumbnail = Some(ctx.load_texture(&video_id, image, TextureOptions::default()));
                    }
                }
                AppEvent::JobStarted { file_name } => {
                    self.status = format!("Downloading: {file_name}");
                    if let Some(job) = self.job.as_mut() {
                        job.file_name = Some(file_name);
                    }
                }
                AppEvent::Progress { percent, status } => {
                    if let Some(job) = self.job.as_mut() {
                        job.apply_progress(percent, status.clone());
                    }
                    self.status = status;
                }
                AppEvent::JobFinished { ok, status } => {
                    if let Some(job) = self.job.as_mut() {
                        job.finish(ok, status.clone());
                    }
                    self.status = status;
                }
            }
        }
    }

    fn analyze(&mut self) {
        self.analysis = None;
        self.thumbnail = None;
        if let Err(e) = self.controller.analyze(&self.url_input, self.translate) {
            debug!(error = %e, "analyze rejected");
        }
    }

    fn start_download(&mut self, stream: StreamDescriptor) {
        let Some(media) = self.analysis.as_ref().map(|a| a.media.clone()) else {
            return;
        };
        match self.controller.start_download(&media, &stream, self.transcode) {
            Ok(()) => {
                self.job = Some(DownloadJob::new(
                    media.url,
                    stream.id,
                    self.controller.config().download_path.clone(),
                ));
            }
            Err(e) => debug!(error = %e, "download rejected"),
        }
    }

    fn folder_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Save to:");
            let current = self.controller.config().download_path.clone();
            ui.add(egui::Label::new(current.display().to_string()).truncate(true));
            if ui.button("Change…").clicked() {
                if let Some(folder) = FileDialog::new().set_directory(&current).pick_folder() {
                    if let Err(e) = self.controller.set_download_dir(folder) {
                        warn!(error = %e, "could not save config");
                        self.status = format!("Could not save config: {e}");
                    }
                }
            }
        });
    }

    fn results(&mut self, ui: &mut egui::Ui) {
        let mut chosen: Option<StreamDescriptor> = None;

        if let Some(analysis) = &self.analysis {
            ui.label(format!("Title: {}", analysis.media.title));
            if let Some(text) = &analysis.media.translated_description {
                ui.label(format!("Translation: {text}"));
            }
            if let Some(tex) = &self.thumbnail {
                ui.image(tex);
            }
            ui.separator();

            for stream in &analysis.streams {
                ui.horizontal(|ui| {
                    ui.label(format!("📺 {} | {}", stream.resolution, stream.size_label));
                    let text = format!("Download {} ({})", stream.resolution, stream.size_label);
                    let button = ui.button(text).on_hover_text(format!(
                        "format {} · {} bytes · {:.0} kbit/s",
                        stream.id, stream.size_bytes, stream.bitrate
                    ));
                    if button.clicked() {
                        // Each button carries its own copy of the descriptor
                        chosen = Some(stream.clone());
                    }
                });
            }
        }

        if let Some(stream) = chosen {
            self.start_download(stream);
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Apply updates from background tasks
        self.drain_events(ctx);

        // 2️⃣ Main panel
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Video Downloader");
            self.folder_row(ui);
            ui.separator();

            ui.label("Video link:");
            ui.text_edit_singleline(&mut self.url_input);

            ui.horizontal(|ui| {
                if ui.button("📋 Paste & analyze").clicked() {
                    if let Ok(url) = self.controller.paste_url() {
                        self.url_input = url;
                        self.analyze();
                    }
                }
                if ui.button("Analyze").clicked() {
                    self.analyze();
                }
            });

            ui.horizontal(|ui| {
                ui.checkbox(&mut self.transcode, "Transcode to H.264/AAC");
                ui.checkbox(&mut self.translate, "Translate description");
                if ui.checkbox(&mut self.always_on_top, "Always on top").changed() {
                    let level = if self.always_on_top {
                        egui::WindowLevel::AlwaysOnTop
                    } else {
                        egui::WindowLevel::Normal
                    };
                    ctx.send_viewport_cmd(egui::ViewportCommand::WindowLevel(level));
                }
            });

            if !self.controller.can_transcode() {
                ui.colored_label(
                    Color32::RED,
                    "⚠ ffmpeg not found: downloads use single-file formats and cannot be transcoded",
                );
            }

            ui.separator();
            ui.horizontal(|ui| {
                if self.controller.is_busy() {
                    ui.spinner();
                }
                ui.label(&self.status);
            });
            if let Some(job) = &self.job {
                let name = job.file_name.as_deref().unwrap_or("…");
                let state = if job.completed { "finished" } else { "running" };
                ui.small(format!("{name}: {}", job.status)).on_hover_text(format!(
                    "{} [{}] → {} ({state})",
                    job.source_url,
                    job.format_id,
                    job.destination.display()
                ));
            }
            let progress = self.job.as_ref().map_or(0.0, |j| j.progress / 100.0);
            ui.add(egui::ProgressBar::new(progress).show_percentage());
            ui.separator();

            // 3️⃣ Result list: one button per rendition
            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| self.results(ui));
        });

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}
