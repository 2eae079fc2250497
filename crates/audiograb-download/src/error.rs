use audiograb_model::ModelError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = DownloadError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status} for {url}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection ended before the declared body length arrived.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: u64, received: u64 },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("required tool `{0}` was not found on PATH")]
    ToolMissing(&'static str),

    #[error("invalid playlist {url}: {reason}")]
    Manifest { url: String, reason: String },

    #[error("segment {index} of {url} failed: {source}")]
    Segment {
        index: usize,
        url: String,
        #[source]
        source: Box<DownloadError>,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("tagging {path} failed: {reason}")]
    Tag { path: PathBuf, reason: String },
}

/// Errors that may go away when the same request is sent again.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for DownloadError {
    fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
            }
            DownloadError::Http { status, .. } => {
                status.as_u16() == 403
                    || status.as_u16() == 408
                    || status.as_u16() == 429
                    || status.is_server_error()
            }
            DownloadError::ShortRead { .. } => true,
            DownloadError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::Interrupted
            ),
            DownloadError::ToolFailed { .. }
            | DownloadError::ToolMissing(_)
            | DownloadError::Manifest { .. }
            | DownloadError::Segment { .. }
            | DownloadError::Model(_)
            | DownloadError::Tag { .. } => false,
        }
    }
}

impl DownloadError {
    /// Environment failures that end the whole run instead of one chapter.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DownloadError::ToolMissing(_))
    }

    pub fn http(status: reqwest::StatusCode, url: impl Into<String>) -> Self {
        DownloadError::Http {
            status,
            url: url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_http_classification() {
        assert!(DownloadError::http(StatusCode::FORBIDDEN, "u").is_retryable());
        assert!(DownloadError::http(StatusCode::TOO_MANY_REQUESTS, "u").is_retryable());
        assert!(DownloadError::http(StatusCode::BAD_GATEWAY, "u").is_retryable());
        assert!(!DownloadError::http(StatusCode::NOT_FOUND, "u").is_retryable());
    }

    #[test]
    fn test_short_read_is_retryable() {
        let err = DownloadError::ShortRead {
            expected: 100,
            received: 40,
        };
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_tool_missing_is_fatal_not_retryable() {
        let err = DownloadError::ToolMissing("ffmpeg");
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "required tool `ffmpeg` was not found on PATH");
    }
}
