use crate::html::resolve_url;
use crate::http::SHORT_REQUEST_TIMEOUT;
use crate::{Extractor, HttpSession};
use anyhow::{Context, Result};
use async_trait::async_trait;
use audiograb_model::{
    join_names, BookData, Chapter, Credits, Site, AUDIOBOOK_ID_HEADER, STREAM_TOKEN_HEADER,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

const POST_DETAILS_PATH: &str = "/api/v1/search/post-details";
const PLAYLIST_PATH: &str = "/api/v1/playlist";
const MEDIA_PATH: &str = "/api/v1/public/audio/";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserIdentity<'a> {
    ip_address: &'a str,
    user_agent: &'a str,
    timestamp: String,
}

impl<'a> UserIdentity<'a> {
    fn now(user_agent: &'a str) -> Self {
        Self {
            ip_address: "0.0.0.0",
            user_agent,
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S.000Z").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostDetailsRequest<'a> {
    dynamic_slug_id: &'a str,
    user_identity: UserIdentity<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistRequest<'a> {
    audio_book_id: &'a str,
    post_detail_token: &'a str,
    user_identity: UserIdentity<'a>,
}

#[derive(Debug, Deserialize)]
struct Person {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostDetails {
    title: String,
    cover_image: Option<String>,
    #[serde(default)]
    authors: Vec<Person>,
    #[serde(default)]
    narrators: Vec<Person>,
    audio_book_id: String,
    post_detail_token: String,
}

#[derive(Debug, Deserialize)]
struct Track {
    src: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Playlist {
    stream_token: String,
    audio_book_id: Option<String>,
    #[serde(default)]
    tracks: Vec<Track>,
}

/// tokybook.com: a details call yields the book ID and a continuation token,
/// a playlist call yields the stream token and the ordered track sources.
///
/// Chapter URLs point at per-chapter sub-playlists under the public audio
/// path; every request for them needs the stream credentials kept in
/// `site_headers`.
#[derive(Debug, Clone)]
pub struct TokybookExtractor {
    base_url: String,
}

impl Default for TokybookExtractor {
    fn default() -> Self {
        Self::new(Site::Tokybook.base_url())
    }
}

impl TokybookExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<B, R>(
        &self,
        session: &HttpSession,
        path: &str,
        referer: Option<&str>,
        body: &B,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let mut request = session
            .client()
            .post(&url)
            .timeout(SHORT_REQUEST_TIMEOUT)
            .header("Origin", &self.base_url)
            .header("Accept", "*/*")
            .json(body);
        if let Some(referer) = referer {
            request = request.header("Referer", referer);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to call {url}"))?;
        let status = response.status();
        anyhow::ensure!(status.is_success(), "HTTP {status} for {url}");

        response
            .json()
            .await
            .with_context(|| format!("Unexpected response shape from {url}"))
    }
}

#[async_trait]
impl Extractor for TokybookExtractor {
    fn site(&self) -> Site {
        Site::Tokybook
    }

    async fn fetch_book_data(&self, session: &HttpSession, url: &str) -> Result<BookData> {
        let slug = slug_from_url(url).with_context(|| format!("No book slug in {url}"))?;
        tracing::info!(url = %url, slug = %slug, "Fetching from tokybook.com API");

        let details: PostDetails = self
            .post_json(
                session,
                POST_DETAILS_PATH,
                Some(url),
                &PostDetailsRequest {
                    dynamic_slug_id: &slug,
                    user_identity: UserIdentity::now(session.user_agent()),
                },
            )
            .await?;

        let playlist: Playlist = self
            .post_json(
                session,
                PLAYLIST_PATH,
                None,
                &PlaylistRequest {
                    audio_book_id: &details.audio_book_id,
                    post_detail_token: &details.post_detail_token,
                    user_identity: UserIdentity::now(session.user_agent()),
                },
            )
            .await?;
        tracing::info!(tracks = playlist.tracks.len(), "Received playlist");

        let media_base = Url::parse(&format!("{}{MEDIA_PATH}", self.base_url))
            .context("Invalid media base URL")?;
        let chapters = playlist
            .tracks
            .iter()
            .filter_map(|track| track.src.as_deref())
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .enumerate()
            .map(|(i, src)| {
                let media_url = media_base
                    .join(src)
                    .with_context(|| format!("Invalid track source: {src}"))?;
                Ok(Chapter::numbered(i + 1, media_url.as_str()).with_src(media_url.path()))
            })
            .collect::<Result<Vec<_>>>()?;

        let book_id = playlist
            .audio_book_id
            .filter(|id| !id.is_empty())
            .unwrap_or(details.audio_book_id);

        let cover_url = details
            .cover_image
            .as_deref()
            .and_then(|src| resolve_url(&self.base_url, src));

        let book = BookData::new(Site::Tokybook, &details.title, url, chapters)?
            .with_cover_url(cover_url)
            .with_credits(Credits {
                author: join_names(details.authors.iter().map(|p| p.name.as_str())),
                narrator: join_names(details.narrators.iter().map(|p| p.name.as_str())),
                year: None,
            })
            .with_site_headers([
                ("Origin".to_string(), self.base_url.clone()),
                ("Referer".to_string(), url.to_string()),
                (AUDIOBOOK_ID_HEADER.to_string(), book_id),
                (STREAM_TOKEN_HEADER.to_string(), playlist.stream_token),
            ]);
        Ok(book)
    }
}

/// Last non-empty path segment: `https://tokybook.com/post/some-book/` gives `some-book`.
fn slug_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpConfig;
    use audiograb_model::StreamAuth;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_slug_from_url() {
        assert_eq!(
            slug_from_url("https://tokybook.com/post/project-hail-mary/").as_deref(),
            Some("project-hail-mary")
        );
        assert_eq!(slug_from_url("https://tokybook.com/dune").as_deref(), Some("dune"));
        assert_eq!(slug_from_url("https://tokybook.com/"), None);
    }

    #[test]
    fn test_user_identity_shape() {
        let body = serde_json::to_value(PostDetailsRequest {
            dynamic_slug_id: "x",
            user_identity: UserIdentity::now("ua"),
        })
        .unwrap();
        assert_eq!(body["dynamicSlugId"], "x");
        assert_eq!(body["userIdentity"]["ipAddress"], "0.0.0.0");
        assert_eq!(body["userIdentity"]["userAgent"], "ua");
        let ts = body["userIdentity"]["timestamp"].as_str().unwrap();
        assert_eq!(ts.len(), "2025-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with(".000Z"));
    }

    #[tokio::test]
    async fn test_two_stage_api() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(POST_DETAILS_PATH))
            .and(body_partial_json(json!({ "dynamicSlugId": "project-hail-mary" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Project Hail Mary: A Novel",
                "coverImage": "/images/phm.jpg",
                "authors": [{ "name": "Andy Weir" }],
                "narrators": [{ "name": "Ray Porter" }],
                "audioBookId": "B08G9PRS1K",
                "postDetailToken": "pdt-123",
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(PLAYLIST_PATH))
            .and(header("origin", server.uri().as_str()))
            .and(body_partial_json(json!({
                "audioBookId": "B08G9PRS1K",
                "postDetailToken": "pdt-123",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "streamToken": "st-456",
                "audioBookId": "B08G9PRS1K",
                "tracks": [
                    { "src": "B08G9PRS1K/Chapter 1.m3u8", "trackTitle": "Chapter 1" },
                    { "src": "", "trackTitle": "Broken" },
                    { "src": "B08G9PRS1K/Chapter 2.m3u8", "trackTitle": "Chapter 2" },
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = HttpSession::new(&HttpConfig::default()).unwrap();
        let extractor = TokybookExtractor::new(server.uri());
        let book_url = format!("{}/post/project-hail-mary", server.uri());
        let book = extractor.fetch_book_data(&session, &book_url).await.unwrap();

        assert_eq!(book.site, Site::Tokybook);
        assert_eq!(book.title, "Project Hail Mary - A Novel");
        assert_eq!(book.author.as_deref(), Some("Andy Weir"));
        assert_eq!(book.narrator.as_deref(), Some("Ray Porter"));
        assert_eq!(book.cover_url, Some(format!("{}/images/phm.jpg", server.uri())));

        assert_eq!(book.chapters.len(), 2);
        assert_eq!(book.chapters[0].title, "Chapter 001");
        assert_eq!(
            book.chapters[0].url,
            format!("{}/api/v1/public/audio/B08G9PRS1K/Chapter%201.m3u8", server.uri())
        );
        assert_eq!(
            book.chapters[1].src.as_deref(),
            Some("/api/v1/public/audio/B08G9PRS1K/Chapter%202.m3u8")
        );

        let auth = StreamAuth::from_site_headers(&book.site_headers).unwrap();
        assert_eq!(auth.book_id, "B08G9PRS1K");
        assert_eq!(auth.stream_token, "st-456");
        assert_eq!(book.site_headers["Referer"], book_url);
    }

    #[tokio::test]
    async fn test_api_error_fails_extraction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POST_DETAILS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let session = HttpSession::new(&HttpConfig::default()).unwrap();
        let err = TokybookExtractor::new(server.uri())
            .fetch_book_data(&session, &format!("{}/post/x", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_playlist_fails_extraction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POST_DETAILS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Empty",
                "audioBookId": "id",
                "postDetailToken": "t",
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(PLAYLIST_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "streamToken": "s", "tracks": [] })),
            )
            .mount(&server)
            .await;

        let session = HttpSession::new(&HttpConfig::default()).unwrap();
        let result = TokybookExtractor::new(server.uri())
            .fetch_book_data(&session, &format!("{}/post/empty", server.uri()))
            .await;
        assert!(result.is_err());
    }
}
