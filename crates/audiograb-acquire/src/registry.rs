use crate::embedded::EmbeddedMediaExtractor;
use crate::static_links::StaticLinksExtractor;
use crate::tokybook::TokybookExtractor;
use crate::Extractor;
use audiograb_model::Site;
use url::Url;

/// Domain substrings in match order; the first hit wins.
const DOMAINS: &[(&str, Site)] = &[
    ("tokybook.com", Site::Tokybook),
    ("goldenaudiobook.net", Site::GoldenAudiobook),
    ("zaudiobooks.com", Site::Zaudiobooks),
    ("fulllengthaudiobooks.net", Site::FullLengthAudiobooks),
    ("hdaudiobooks.net", Site::HdAudiobooks),
    ("bigaudiobooks.net", Site::BigAudiobooks),
];

/// The site a URL belongs to, or `None` when no supported domain matches.
///
/// Only the parsed host is matched. A scheme-less `goldenaudiobook.net/x` is
/// retried with `https://` in front.
pub fn resolve_site(url: &str) -> Option<Site> {
    let url = url.trim();
    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{url}")).ok())?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    DOMAINS
        .iter()
        .find(|(domain, _)| host.contains(domain))
        .map(|(_, site)| *site)
}

/// The extractor for a URL, or `None` for an unsupported source.
pub fn resolve(url: &str) -> Option<Box<dyn Extractor>> {
    resolve_site(url).map(extractor_for)
}

pub fn extractor_for(site: Site) -> Box<dyn Extractor> {
    match site {
        Site::Tokybook => Box::new(TokybookExtractor::default()),
        Site::Zaudiobooks => Box::new(StaticLinksExtractor::default()),
        Site::GoldenAudiobook
        | Site::FullLengthAudiobooks
        | Site::HdAudiobooks
        | Site::BigAudiobooks => Box::new(EmbeddedMediaExtractor::new(site)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_sites() {
        assert_eq!(resolve_site("https://tokybook.com/post/x"), Some(Site::Tokybook));
        assert_eq!(resolve_site("https://goldenaudiobook.net/y"), Some(Site::GoldenAudiobook));
        assert_eq!(
            resolve_site("https://www.hdaudiobooks.net/some-book/"),
            Some(Site::HdAudiobooks)
        );
        assert_eq!(resolve_site("bigaudiobooks.net/book"), Some(Site::BigAudiobooks));
    }

    #[test]
    fn test_resolve_selects_extractor_kind() {
        assert_eq!(resolve("https://tokybook.com/post/x").unwrap().site(), Site::Tokybook);
        assert_eq!(
            resolve("https://goldenaudiobook.net/y").unwrap().site(),
            Site::GoldenAudiobook
        );
        assert_eq!(
            resolve("https://zaudiobooks.com/z/").unwrap().site(),
            Site::Zaudiobooks
        );
    }

    #[test]
    fn test_unmatched_or_unparsable() {
        assert!(resolve("https://example.com/book").is_none());
        assert!(resolve("").is_none());
        assert!(resolve("http://[::1").is_none());
    }

    #[test]
    fn test_matches_host_not_path() {
        assert!(resolve_site("https://example.com/tokybook.com/post/x").is_none());
    }
}
