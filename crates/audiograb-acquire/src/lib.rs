pub mod embedded;
pub mod html;
pub mod http;
pub mod metadata;
pub mod registry;
pub mod static_links;
pub mod tokybook;

use anyhow::Result;
use async_trait::async_trait;
use audiograb_model::{BookData, Site};

pub use http::{HttpConfig, HttpSession};
pub use registry::{resolve, resolve_site};

/// Turns one site's book page (or API) into a normalized [`BookData`].
///
/// Any network error, missing markup or empty chapter list fails the whole
/// extraction; implementations never return a partially filled book.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn site(&self) -> Site;

    async fn fetch_book_data(&self, session: &HttpSession, url: &str) -> Result<BookData>;
}
