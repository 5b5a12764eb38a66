//! Locating the external `yt-dlp` and `ffmpeg` binaries.
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use rust_embed::RustEmbed;
use tokio::process::Command;
use tracing::{debug, warn};

/// Binaries optionally bundled at build time (drop them into `assets/`).
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Ffmpeg => "ffmpeg",
        }
    }

    /// Platform file name, e.g. `ffmpeg.exe` on Windows.
    pub fn file_name(self) -> String {
        if cfg!(target_os = "windows") {
            format!("{}.exe", self.name())
        } else {
            self.name().to_string()
        }
    }
}

/// Finds a tool: next to the executable, in the working directory,
/// embedded in the binary, then on `PATH`.
pub fn locate(tool: Tool) -> Option<PathBuf> {
    let file_name = tool.file_name();

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)));
    let in_cwd = std::env::current_dir().ok().map(|dir| dir.join(&file_name));

    let found = beside_exe
        .into_iter()
        .chain(in_cwd)
        .find(|p| p.is_file())
        .or_else(|| extract_embedded(&file_name))
        .or_else(|| which::which(tool.name()).ok());

    match &found {
        Some(path) => debug!(tool = tool.name(), path = %path.display(), "located tool"),
        None => warn!(tool = tool.name(), "tool not found"),
    }
    found
}

/// A subprocess command that does not flash a console window on Windows.
pub fn hidden_command(program: &Path) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// Last meaningful line of a tool's stderr, preferring `ERROR:` lines.
pub fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "no error output".to_string())
}

/// Writes an embedded binary to the temp dir once and returns its path.
fn extract_embedded(file_name: &str) -> Option<PathBuf> {
    let data = Asset::get(file_name)?;
    let target = std::env::temp_dir().join(file_name);
    if target.exists() {
        return Some(target);
    }
    match write_executable(&target, &data.data) {
        Ok(()) => Some(target),
        Err(e) => {
            warn!(path = %target.display(), error = %e, "failed to extract bundled tool");
            None
        }
    }
}

fn write_executable(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = File::create(target)?;
    f.write_all(bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(target, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
