use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Timeout for small requests: API calls, playlists, segments, cover art.
pub const SHORT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Per-read timeout; large chapter bodies stream for minutes.
    pub read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let user_agent = std::env::var("USER_AGENT")
            .or_else(|_| std::env::var("HTTP_USER_AGENT"))
            .ok()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Self {
            user_agent,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(180),
        }
    }
}

/// The one HTTP client of a run. Keeps cookies between the book page visit
/// and the chapter requests that depend on them.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpSession {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET a page and return its body, failing on any non-2xx status.
    pub async fn fetch_page(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<String> {
        let response = self
            .client
            .get(url)
            .headers(header_map(headers)?)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        let status = response.status();
        anyhow::ensure!(status.is_success(), "HTTP {status} for {url}");

        response.text().await.context("Failed to read response body")
    }
}

/// Convert a plain header mapping into a reqwest `HeaderMap`.
pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name: {name}"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header {name}"))?;
        map.insert(name, value);
    }
    Ok(map)
}
