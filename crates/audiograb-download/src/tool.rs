//! External media tools (yt-dlp, ffmpeg) behind a narrow, stubbable interface.

use crate::error::{DownloadError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

pub const YT_DLP: &str = "yt-dlp";
pub const FFMPEG: &str = "ffmpeg";

/// Characters of stderr kept in a [`DownloadError::ToolFailed`].
const STDERR_TAIL: usize = 2000;

/// One tool run: read `source` (a URL or a local file), send `headers` when
/// it is a URL, and produce `output`.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub source: String,
    pub headers: BTreeMap<String, String>,
    pub output: PathBuf,
}

#[async_trait]
pub trait MediaTool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the tool to completion. Returns the path of the produced file.
    async fn run(&self, invocation: &ToolInvocation) -> Result<PathBuf>;
}

/// yt-dlp, extracting audio at top quality into the output's container.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary_path: PathBuf,
    retries: u32,
}

impl YtDlp {
    pub fn new(binary_path: PathBuf, retries: u32) -> Self {
        Self {
            binary_path,
            retries,
        }
    }

    pub fn args(&self, invocation: &ToolInvocation) -> Vec<OsString> {
        let format = extension_of(&invocation.output);
        let mut template = invocation.output.with_extension("").into_os_string();
        template.push(".%(ext)s");

        let mut args: Vec<OsString> = vec![
            "-x".into(),
            "--audio-format".into(),
            format.into(),
            "--audio-quality".into(),
            "0".into(),
            "--retries".into(),
            self.retries.to_string().into(),
            "-o".into(),
            template,
        ];
        for (name, value) in &invocation.headers {
            args.push("--add-header".into());
            args.push(format!("{name}: {value}").into());
        }
        args.push(invocation.source.clone().into());
        args
    }
}

#[async_trait]
impl MediaTool for YtDlp {
    fn name(&self) -> &'static str {
        YT_DLP
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<PathBuf> {
        tracing::debug!(source = %invocation.source, output = %invocation.output.display(), "Running yt-dlp");
        let mut command = Command::new(&self.binary_path);
        command.args(self.args(invocation));
        run_command(YT_DLP, &mut command).await?;
        Ok(invocation.output.clone())
    }
}

/// ffmpeg re-encoding a local file (an assembled transport stream) into the
/// output's audio container.
#[derive(Debug, Clone)]
pub struct FfmpegRemux {
    binary_path: PathBuf,
}

impl FfmpegRemux {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    pub fn args(&self, invocation: &ToolInvocation) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            invocation.source.clone().into(),
            "-vn".into(),
        ];
        if extension_of(&invocation.output) == "mp3" {
            args.extend(["-c:a", "libmp3lame", "-q:a", "0"].map(OsString::from));
        }
        // The staging name hides the real extension from ffmpeg.
        args.extend(["-f".into(), muxer_for(&invocation.output).into()]);
        args.push(invocation.output.clone().into_os_string());
        args
    }
}

#[async_trait]
impl MediaTool for FfmpegRemux {
    fn name(&self) -> &'static str {
        FFMPEG
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<PathBuf> {
        tracing::debug!(input = %invocation.source, output = %invocation.output.display(), "Remuxing");
        let mut command = Command::new(&self.binary_path);
        command.args(self.args(invocation));
        run_command(FFMPEG, &mut command).await?;
        Ok(invocation.output.clone())
    }
}

/// Stands in for a tool that was not found; every run fails as missing.
#[derive(Debug, Clone, Copy)]
pub struct MissingTool(pub &'static str);

#[async_trait]
impl MediaTool for MissingTool {
    fn name(&self) -> &'static str {
        self.0
    }

    async fn run(&self, _invocation: &ToolInvocation) -> Result<PathBuf> {
        Err(DownloadError::ToolMissing(self.0))
    }
}

/// Locations of the external binaries found on `PATH`.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub yt_dlp: Option<PathBuf>,
}

impl Toolchain {
    /// Look the tools up on `PATH`. ffmpeg is always required; yt-dlp only
    /// when `needs_yt_dlp`.
    pub fn discover(needs_yt_dlp: bool) -> Result<Self> {
        let ffmpeg = which::which(FFMPEG).map_err(|_| DownloadError::ToolMissing(FFMPEG))?;
        let yt_dlp = which::which(YT_DLP).ok();
        if needs_yt_dlp && yt_dlp.is_none() {
            return Err(DownloadError::ToolMissing(YT_DLP));
        }
        tracing::debug!(ffmpeg = %ffmpeg.display(), yt_dlp = ?yt_dlp, "Found external tools");
        Ok(Self { ffmpeg, yt_dlp })
    }

    pub fn external_downloader(&self, retries: u32) -> Box<dyn MediaTool> {
        match &self.yt_dlp {
            Some(path) => Box::new(YtDlp::new(path.clone(), retries)),
            None => Box::new(MissingTool(YT_DLP)),
        }
    }

    pub fn remuxer(&self) -> Box<dyn MediaTool> {
        Box::new(FfmpegRemux::new(self.ffmpeg.clone()))
    }
}

/// Run a prepared command, turning a missing binary into
/// [`DownloadError::ToolMissing`] and a nonzero exit into
/// [`DownloadError::ToolFailed`].
pub(crate) async fn run_command(tool: &'static str, command: &mut Command) -> Result<Output> {
    command.kill_on_drop(true);
    let output = command.output().await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DownloadError::ToolMissing(tool),
        _ => DownloadError::Io(e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL)
            .map_or(0, |(i, _)| i);
        return Err(DownloadError::ToolFailed {
            tool,
            status: output.status.to_string(),
            stderr: stderr[start..].to_string(),
        });
    }
    Ok(output)
}

/// Extension of the final file, ignoring any staging suffix
/// (`Chapter 001.mp3.part` gives `mp3`).
pub(crate) fn extension_of(path: &Path) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let name = name.strip_suffix(crate::fetch::STAGING_SUFFIX).unwrap_or(name);
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3")
        .to_ascii_lowercase()
}

/// ffmpeg muxer name for an output path.
pub(crate) fn muxer_for(path: &Path) -> String {
    let ext = extension_of(path);
    if ext == "m4a" || ext == "m4b" {
        "ipod".to_string()
    } else {
        ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_yt_dlp_args() {
        let tool = YtDlp::new(PathBuf::from("yt-dlp"), 5);
        let invocation = ToolInvocation {
            source: "https://x.example/a.mp3".into(),
            headers: BTreeMap::from([("Referer".to_string(), "https://x.example".to_string())]),
            output: PathBuf::from("Audiobooks/Book/Chapter 001.mp3"),
        };
        assert_eq!(
            strings(tool.args(&invocation)),
            [
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "0",
                "--retries",
                "5",
                "-o",
                "Audiobooks/Book/Chapter 001.%(ext)s",
                "--add-header",
                "Referer: https://x.example",
                "https://x.example/a.mp3",
            ]
        );
    }

    #[test]
    fn test_ffmpeg_remux_args() {
        let tool = FfmpegRemux::new(PathBuf::from("ffmpeg"));
        let invocation = ToolInvocation {
            source: "/tmp/seg.ts".into(),
            headers: BTreeMap::new(),
            output: PathBuf::from("Book/Chapter 001.mp3.part"),
        };
        let args = strings(tool.args(&invocation));
        assert_eq!(&args[..7], ["-hide_banner", "-loglevel", "error", "-y", "-i", "/tmp/seg.ts", "-vn"]);
        assert!(args.windows(2).any(|w| w == ["-c:a", "libmp3lame"]));
        assert!(args.windows(2).any(|w| w == ["-f", "mp3"]));
        assert_eq!(args.last().unwrap(), "Book/Chapter 001.mp3.part");
    }

    #[test]
    fn test_muxer_for_m4b() {
        assert_eq!(muxer_for(Path::new("B/Chapter 001.m4b.part")), "ipod");
        assert_eq!(muxer_for(Path::new("B/Chapter 001.mp3")), "mp3");
    }

    #[tokio::test]
    async fn test_missing_tool_is_fatal() {
        let invocation = ToolInvocation {
            source: "u".into(),
            headers: BTreeMap::new(),
            output: PathBuf::from("o.mp3"),
        };
        let err = MissingTool(YT_DLP).run(&invocation).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_run_command_reports_missing_binary() {
        let mut command = Command::new("definitely-not-a-real-binary-4f2a");
        let err = run_command(YT_DLP, &mut command).await.unwrap_err();
        assert!(matches!(err, DownloadError::ToolMissing(YT_DLP)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_reports_nonzero_exit() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_command(FFMPEG, &mut command).await.unwrap_err();
        match err {
            DownloadError::ToolFailed { tool, stderr, .. } => {
                assert_eq!(tool, FFMPEG);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
