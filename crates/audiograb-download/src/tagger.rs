use crate::error::{DownloadError, Result};
use crate::tool::{muxer_for, run_command, FFMPEG};
use async_trait::async_trait;
use audiograb_model::TrackTags;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Writes book and chapter tags into a finished chapter file, in place.
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn write_tags(&self, path: &Path, tags: &TrackTags<'_>) -> Result<()>;
}

/// Tags through ffmpeg: streams are copied untouched into a sibling temp file
/// carrying the new metadata, which then replaces the original.
#[derive(Debug, Clone)]
pub struct FfmpegTagger {
    binary_path: PathBuf,
}

impl FfmpegTagger {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    pub fn args(&self, input: &Path, cover: Option<&Path>, tags: &TrackTags<'_>, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .map(OsString::from)
            .into();
        args.push(input.as_os_str().to_owned());
        if let Some(cover) = cover {
            args.push("-i".into());
            args.push(cover.as_os_str().to_owned());
            args.extend(
                [
                    "-map", "0:a", "-map", "1:v", "-c:v", "copy",
                    "-disposition:v:0", "attached_pic",
                    "-metadata:s:v", "title=Album cover",
                    "-metadata:s:v", "comment=Cover (front)",
                ]
                .map(OsString::from),
            );
        } else {
            args.extend(["-map", "0:a"].map(OsString::from));
        }
        args.extend(["-c:a", "copy", "-map_metadata", "-1"].map(OsString::from));

        for (key, value) in metadata_pairs(tags) {
            args.push("-metadata".into());
            args.push(format!("{key}={value}").into());
        }
        args.extend(["-id3v2_version", "3", "-f"].map(OsString::from));
        args.push(muxer_for(input).into());
        args.push(output.as_os_str().to_owned());
        args
    }
}

/// ffmpeg metadata keys for the tag fields that are present.
pub fn metadata_pairs<'t>(tags: &'t TrackTags<'_>) -> Vec<(&'static str, &'t str)> {
    let mut pairs = vec![
        ("album", tags.album.as_str()),
        ("genre", tags.genre),
        ("track", tags.track.as_str()),
        ("title", tags.title.as_str()),
    ];
    if let Some(artist) = &tags.artist {
        pairs.push(("artist", artist.as_str()));
    }
    if let Some(album_artist) = &tags.album_artist {
        pairs.push(("album_artist", album_artist.as_str()));
    }
    if let Some(year) = &tags.year {
        pairs.push(("date", year.as_str()));
    }
    pairs
}

fn cover_suffix(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => ".png",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        _ => ".jpg",
    }
}

#[async_trait]
impl Tagger for FfmpegTagger {
    async fn write_tags(&self, path: &Path, tags: &TrackTags<'_>) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let cover_file = match tags.cover {
            Some(artwork) => {
                let file = tempfile::Builder::new()
                    .prefix(".cover-")
                    .suffix(cover_suffix(&artwork.mime_type))
                    .tempfile_in(dir)?;
                tokio::fs::write(file.path(), &artwork.bytes).await?;
                Some(file.into_temp_path())
            }
            None => None,
        };

        let output = tempfile::Builder::new()
            .prefix(".tagging-")
            .suffix(".tmp")
            .tempfile_in(dir)?
            .into_temp_path();

        let mut command = Command::new(&self.binary_path);
        command.args(self.args(path, cover_file.as_deref(), tags, &output));
        run_command(FFMPEG, &mut command).await.map_err(|e| match e {
            DownloadError::ToolMissing(_) => e,
            other => DownloadError::Tag {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        output.persist(path).map_err(|e| DownloadError::Tag {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), track = %tags.track, "Tagged");
        Ok(())
    }
}
