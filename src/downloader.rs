//! yt-dlp adapter: metadata probing and downloads with streamed progress.
use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

use crate::{
    error::ExtractError,
    progress::{PROGRESS_TEMPLATE, ProgressHook, parse_progress_line},
    tools::{hidden_command, last_error_line},
};

/// The subset of `yt-dlp -J` output we use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// One entry of `formats` in the yt-dlp info JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub resolution: Option<String>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub tbr: Option<f64>,
}

impl RawFormat {
    /// Exact size if known, else the estimate, else 0.
    pub fn size_bytes(&self) -> u64 {
        [self.filesize, self.filesize_approx]
            .into_iter()
            .flatten()
            .find(|s| *s > 0.0)
            .map(|s| s as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub format_selector: String,
    /// Output path; may contain `%(ext)s`.
    pub output_template: PathBuf,
    /// Set when ffmpeg is available so yt-dlp can merge video + audio.
    pub ffmpeg_location: Option<PathBuf>,
}

pub type ProgressCallback<'a> = &'a (dyn Fn(ProgressHook) + Send + Sync);

/// The external video-info extractor.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetches metadata without downloading anything.
    async fn probe(&self, url: &str) -> Result<RawInfo, ExtractError>;

    /// Downloads the selected format, reporting progress as it goes.
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<(), ExtractError>;
}

/// Runs the `yt-dlp` binary.
pub struct YtDlp {
    binary: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self { binary }
    }

    fn binary(&self) -> Result<&PathBuf, ExtractError> {
        self.binary.as_ref().ok_or(ExtractError::ToolNotFound)
    }
}

pub fn probe_args(url: &str) -> Vec<String> {
    ["-J", "--no-playlist", "--no-warnings", "--", url]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn download_args(request: &DownloadRequest) -> Vec<String> {
    let mut args = vec![
        "-f".to_owned(),
        request.format_selector.clone(),
        "-o".to_owned(),
        request.output_template.display().to_string(),
        "--no-playlist".to_owned(),
        "--no-warnings".to_owned(),
        "--no-colors".to_owned(),
        "--newline".to_owned(),
        "--progress-template".to_owned(),
        PROGRESS_TEMPLATE.to_owned(),
    ];

    if let Some(ffmpeg) = &request.ffmpeg_location {
        args.push("--ffmpeg-location".to_owned());
        args.push(ffmpeg.display().to_string());
        args.push("--merge-output-format".to_owned());
        args.push("mp4".to_owned());
    }

    args.push("--".to_owned());
    args.push(request.url.clone());
    args
}

/// Reads one line, decoding lossily: yt-dlp prints titles in the console
/// code page, which is not UTF-8 on every system. `None` at end of stream.
async fn next_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&buf[..]);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Feeds every progress line of `stdout` to `on_progress` until EOF.
async fn stream_progress<R>(stdout: R, on_progress: ProgressCallback<'_>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    while let Some(line) = next_lossy_line(&mut reader, &mut buf).await? {
        match parse_progress_line(&line) {
            Some(hook) => on_progress(hook),
            None => debug!("yt-dlp> {}", line),
        }
    }
    Ok(())
}

#[async_trait]
impl Extractor for YtDlp {
    async fn probe(&self, url: &str) -> Result<RawInfo, ExtractError> {
        let binary = self.binary()?;
        info!(url, "probing formats");

        let output = hidden_command(binary)
            .args(probe_args(url))
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractError::Failed {
                code: output.status.code(),
                message: last_error_line(&String::from_utf8_lossy(&output.stderr)),
            });
        }
        let info: RawInfo = serde_json::from_slice(&output.stdout)?;
        debug!(formats = info.formats.len(), "probe finished");
        Ok(info)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<(), ExtractError> {
        let binary = self.binary()?;
        let args = download_args(request);
        info!(url = %request.url, format = %request.format_selector, "starting yt-dlp download");

        let mut child = hidden_command(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Drain stderr concurrently so a chatty process cannot block on a full pipe.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                while let Ok(Some(line)) = next_lossy_line(&mut reader, &mut buf).await {
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            collected
        });

        let streamed = match child.stdout.take() {
            Some(out) => stream_progress(out, on_progress).await,
            None => Ok(()),
        };
        if let Err(e) = streamed {
            warn!(error = %e, "lost yt-dlp output, stopping the download");
            if let Err(kill) = child.kill().await {
                warn!(error = %kill, "could not stop yt-dlp");
            }
            stderr_task.abort();
            return Err(e.into());
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(ExtractError::Failed {
                code: status.code(),
                message: last_error_line(&stderr),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWITTER_INFO: &str = r#"{
        "id": "1790000000000000000",
        "title": "Some user - clip",
        "description": "@someone look at this",
        "thumbnail": "https://pbs.twimg.com/thumb.jpg",
        "formats": [
            {"format_id": "hls-audio", "ext": "mp4", "vcodec": "none", "acodec": "mp4a.40.2"},
            {"format_id": "http-832", "ext": "mp4", "width": 480, "height": 270,
             "resolution": "480x270", "tbr": 832, "filesize_approx": 1234567.8},
            {"format_id": "http-2176", "ext": "mp4", "width": 1280, "height": 720,
             "resolution": "1280x720", "tbr": 2176, "filesize": null}
        ]
    }"#;

    #[test]
    fn parses_probe_json() {
        let info: RawInfo = serde_json::from_str(TWITTER_INFO).unwrap();
        assert_eq!(info.id.as_deref(), Some("1790000000000000000"));
        assert_eq!(info.formats.len(), 3);
        assert_eq!(info.formats[0].vcodec.as_deref(), Some("none"));
        assert_eq!(info.formats[1].size_bytes(), 1_234_567);
        assert_eq!(info.formats[2].size_bytes(), 0);
        assert_eq!(info.formats[2].height, Some(720));
    }

    #[test]
    fn missing_formats_is_empty() {
        let info: RawInfo = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert!(info.formats.is_empty());
        assert!(info.title.is_none());
    }

    #[test]
    fn download_args_without_ffmpeg() {
        let request = DownloadRequest {
            url: "https://x.com/a/status/1".into(),
            format_selector: "http-2176/best".into(),
            output_template: PathBuf::from("/tmp/clip.%(ext)s"),
            ffmpeg_location: None,
        };
        let args = download_args(&request);
        assert_eq!(&args[..4], ["-f", "http-2176/best", "-o", "/tmp/clip.%(ext)s"]);
        assert!(!args.iter().any(|a| a == "--ffmpeg-location"));
        assert_eq!(args.last().unwrap(), "https://x.com/a/status/1");
        assert!(args.contains(&PROGRESS_TEMPLATE.to_string()));
    }

    #[test]
    fn download_args_with_ffmpeg_merge_to_mp4() {
        let request = DownloadRequest {
            url: "https://x.com/a/status/1".into(),
            format_selector: "a+bestaudio/a/best".into(),
            output_template: PathBuf::from("out.mp4"),
            ffmpeg_location: Some(PathBuf::from("/usr/bin/ffmpeg")),
        };
        let args = download_args(&request);
        let pos = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
        assert_eq!(args[pos + 1], "/usr/bin/ffmpeg");
        assert!(args.windows(2).any(|w| w[0] == "--merge-output-format" && w[1] == "mp4"));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let ytdlp = YtDlp::new(None);
        let err = ytdlp.probe("https://x.com/a").await.unwrap_err();
        assert!(matches!(err, ExtractError::ToolNotFound));
    }

    #[tokio::test]
    async fn lossy_lines_survive_invalid_utf8() {
        let input: &[u8] = b"Destination: \xc4\xe3\xba\xc3.mp4\r\n[dl]|finished|100%|\n";
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        let first = next_lossy_line(&mut reader, &mut buf).await.unwrap().unwrap();
        assert!(first.starts_with("Destination: ") && first.ends_with(".mp4"), "{first}");
        let second = next_lossy_line(&mut reader, &mut buf).await.unwrap().unwrap();
        assert_eq!(second, "[dl]|finished|100%|");
        assert!(next_lossy_line(&mut reader, &mut buf).await.unwrap().is_none());
    }

    /// A stand-in `yt-dlp` that prints the given shell body.
    #[cfg(unix)]
    fn fake_ytdlp(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn request(dir: &std::path::Path) -> DownloadRequest {
        DownloadRequest {
            url: "https://x.com/a/status/1".into(),
            format_selector: "a/best".into(),
            output_template: dir.join("clip.%(ext)s"),
            ffmpeg_location: None,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn download_streams_progress_past_non_utf8_output() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_ytdlp(
            dir.path(),
            r"printf 'Destination: \304\343\272\303.mp4\n'
printf '[dl]|downloading| 50.0%%|1.00MiB/s\n'
printf '[dl]|finished|100%%|\n'
exit 0",
        );
        let hooks = std::sync::Mutex::new(Vec::new());
        let on_progress = |hook: ProgressHook| hooks.lock().unwrap().push(hook);

        YtDlp::new(Some(binary))
            .download(&request(dir.path()), &on_progress)
            .await
            .unwrap();

        let hooks = hooks.into_inner().unwrap();
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].percent(), Some(50.0));
        assert_eq!(hooks[0].speed_str, "1.00MiB/s");
        assert_eq!(hooks[1].status, crate::progress::HookStatus::Finished);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn download_failure_reports_stderr_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_ytdlp(
            dir.path(),
            r"printf 'WARNING: \377 slow\n' >&2
printf 'ERROR: Requested format is not available\n' >&2
exit 1",
        );

        let err = YtDlp::new(Some(binary))
            .download(&request(dir.path()), &|_: ProgressHook| {})
            .await
            .unwrap_err();
        match err {
            ExtractError::Failed { code, message } => {
                assert_eq!(code, Some(1));
                assert_eq!(message, "ERROR: Requested format is not available");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
