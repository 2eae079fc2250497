use super::{discard, promote, request_headers, staging_path};
use crate::config::RetryConfig;
use crate::error::{DownloadError, Result};
use crate::retry::download_with_retry;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Stream `url` into `dest` through the shared client, retrying transient
/// failures (403 included) with backoff. Returns the number of bytes written.
///
/// The body goes to a staging file first; `dest` only appears once a complete
/// body has been received.
pub async fn fetch_direct(
    client: &reqwest::Client,
    retry: &RetryConfig,
    url: &str,
    headers: &BTreeMap<String, String>,
    dest: &Path,
) -> Result<u64> {
    let staging = staging_path(dest);
    let result = download_with_retry(retry, |attempt| {
        let staging = staging.clone();
        async move {
            tracing::debug!(url = %url, attempt, "GET");
            stream_once(client, url, headers, &staging).await
        }
    })
    .await;

    match result {
        Ok(bytes) => {
            promote(&staging, dest).await?;
            Ok(bytes)
        }
        Err(e) => {
            discard(&staging).await;
            Err(e)
        }
    }
}

async fn stream_once(
    client: &reqwest::Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    staging: &Path,
) -> Result<u64> {
    let response = client.get(url).headers(request_headers(headers)).send().await?;

    let status = response.status();
    if !status.is_success() {
        if status == reqwest::StatusCode::FORBIDDEN {
            tracing::warn!(url = %url, "403 Forbidden; the URL may need a manual check");
        }
        return Err(DownloadError::http(status, url));
    }

    let expected = response.content_length();
    let mut file = tokio::fs::File::create(staging).await?;
    let mut received: u64 = 0;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        // A connection dropped mid-body is a short read, not a bad response.
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(url = %url, received, error = %e, "Body ended early");
                return Err(match expected {
                    Some(expected) => DownloadError::ShortRead { expected, received },
                    None => DownloadError::Network(e),
                });
            }
        };
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
    }
    file.flush().await?;

    if let Some(expected) = expected {
        if received < expected {
            return Err(DownloadError::ShortRead { expected, received });
        }
    }
    Ok(received)
}
