use super::manifest::segment_urls;
use super::{discard, promote, request_headers, staging_path};
use crate::error::{DownloadError, Result};
use crate::tool::{MediaTool, ToolInvocation};
use audiograb_model::{BookData, Chapter, StreamAuth};
use futures::{stream, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Settings for one segmented chapter fetch.
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Segment requests in flight at once.
    pub concurrency: usize,
    /// Timeout for the playlist and for each segment.
    pub timeout: Duration,
}

/// What a finished segmented fetch produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assembled {
    pub segments: usize,
    pub bytes: u64,
}

/// Headers for one media request: the site headers plus the stream headers
/// derived from this request's own path.
fn media_headers(book: &BookData, auth: &StreamAuth, url: &Url) -> BTreeMap<String, String> {
    let mut headers = book.site_headers.clone();
    headers.extend(auth.headers_for(url));
    headers
}

async fn get_bytes(
    client: &reqwest::Client,
    url: &Url,
    headers: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let response = client
        .get(url.clone())
        .headers(request_headers(headers))
        .timeout(timeout)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::http(status, url.as_str()));
    }
    Ok(response.bytes().await?.to_vec())
}

/// Fetch a chapter's sub-playlist, download every segment on a bounded pool,
/// concatenate them in playlist order and remux the result into `dest`.
///
/// Any failed segment fails the chapter. Neither the concatenated stream nor
/// a partial output is left behind.
pub async fn fetch_segmented(
    client: &reqwest::Client,
    remux: &dyn MediaTool,
    book: &BookData,
    chapter: &Chapter,
    dest: &Path,
    options: SegmentOptions,
) -> Result<Assembled> {
    let auth = StreamAuth::from_site_headers(&book.site_headers)?;
    let playlist_url = Url::parse(&chapter.url).map_err(|e| DownloadError::Manifest {
        url: chapter.url.clone(),
        reason: e.to_string(),
    })?;

    let playlist = get_bytes(
        client,
        &playlist_url,
        &media_headers(book, &auth, &playlist_url),
        options.timeout,
    )
    .await?;
    let segments = segment_urls(&playlist_url, &String::from_utf8_lossy(&playlist))?;
    tracing::debug!(chapter = %chapter.title, segments = segments.len(), "Parsed playlist");

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let assembled = tempfile::Builder::new()
        .prefix(".segments-")
        .suffix(".ts")
        .tempfile_in(dir)?
        .into_temp_path();

    let mut file = tokio::fs::File::create(&assembled).await?;
    let mut fetched = stream::iter(segments.iter().enumerate())
        .map(|(index, url)| {
            let headers = media_headers(book, &auth, url);
            async move {
                get_bytes(client, url, &headers, options.timeout)
                    .await
                    .map_err(|e| DownloadError::Segment {
                        index,
                        url: url.to_string(),
                        source: Box::new(e),
                    })
            }
        })
        .buffered(options.concurrency.max(1));

    let mut bytes: u64 = 0;
    while let Some(segment) = fetched.try_next().await? {
        file.write_all(&segment).await?;
        bytes += segment.len() as u64;
    }
    file.flush().await?;
    drop(file);

    let staging = staging_path(dest);
    let invocation = ToolInvocation {
        source: assembled.to_string_lossy().into_owned(),
        headers: BTreeMap::new(),
        output: staging.clone(),
    };
    if let Err(e) = remux.run(&invocation).await {
        discard(&staging).await;
        return Err(e);
    }
    promote(&staging, dest).await?;

    Ok(Assembled {
        segments: segments.len(),
        bytes,
    })
}
