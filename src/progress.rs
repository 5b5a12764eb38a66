use once_cell::sync::Lazy;
use regex::Regex;

/// Marker we ask yt-dlp to put in front of every progress line.
pub const PROGRESS_PREFIX: &str = "[dl]";

/// Value for `--progress-template`; fields are pipe separated.
pub const PROGRESS_TEMPLATE: &str =
    "download:[dl]|%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s";

static ANSI: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    Downloading,
    Finished,
}

/// One progress report from the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressHook {
    pub status: HookStatus,
    pub percent_str: String,
    pub speed_str: String,
}

impl ProgressHook {
    pub fn percent(&self) -> Option<f32> {
        parse_percent(&self.percent_str)
    }
}

/// Parses a line produced with [`PROGRESS_TEMPLATE`].
pub fn parse_progress_line(line: &str) -> Option<ProgressHook> {
    let clean = ANSI.replace_all(line, "");
    let rest = clean.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.trim_start_matches('|').split('|');

    let status = match fields.next()?.trim() {
        "downloading" => HookStatus::Downloading,
        "finished" => HookStatus::Finished,
        _ => return None,
    };
    let percent_str = fields.next().unwrap_or_default().trim().to_string();
    let speed_str = fields.next().unwrap_or_default().trim().to_string();

    Some(ProgressHook { status, percent_str, speed_str })
}

/// `" 42.5%"` → `42.5`, clamped to 0..=100.
pub fn parse_percent(text: &str) -> Option<f32> {
    let clean = ANSI.replace_all(text, "");
    let number = clean.trim().trim_end_matches('%').trim();
    number.parse::<f32>().ok().map(|v| v.clamp(0.0, 100.0))
}
