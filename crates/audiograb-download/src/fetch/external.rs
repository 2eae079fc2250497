use crate::error::{DownloadError, Result};
use crate::tool::{MediaTool, ToolInvocation};
use audiograb_model::{BookData, Chapter, StreamAuth};
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

/// Headers the external tool must send for `chapter`.
///
/// Books that carry stream credentials get the per-request track headers
/// rebuilt from the chapter's own URL on top of the site headers.
pub fn tool_headers(book: &BookData, chapter: &Chapter) -> Result<BTreeMap<String, String>> {
    let mut headers = book.site_headers.clone();
    if let Ok(auth) = StreamAuth::from_site_headers(&book.site_headers) {
        let url = Url::parse(&chapter.url).map_err(|e| DownloadError::Manifest {
            url: chapter.url.clone(),
            reason: e.to_string(),
        })?;
        headers.extend(auth.headers_for(&url));
    }
    Ok(headers)
}

/// Hand the chapter to the external downloader. A nonzero exit fails the
/// chapter; the tool does its own retrying.
pub async fn fetch_external(
    tool: &dyn MediaTool,
    book: &BookData,
    chapter: &Chapter,
    dest: &Path,
) -> Result<()> {
    let invocation = ToolInvocation {
        source: chapter.url.clone(),
        headers: tool_headers(book, chapter)?,
        output: dest.to_path_buf(),
    };
    let produced = tool.run(&invocation).await?;
    if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
        return Err(DownloadError::ToolFailed {
            tool: tool.name(),
            status: "exit status: 0".into(),
            stderr: format!("expected output {} was not created", produced.display()),
        });
    }
    Ok(())
}
