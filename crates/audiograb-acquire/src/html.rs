//! Small scraper helpers shared by the HTML extractors.

use audiograb_model::{collapse_whitespace, Credits};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Collapsed text of the first element matching `selector`, if it is non-empty.
pub fn first_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).expect("valid selector");
    document
        .select(&sel)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
}

/// The first non-empty value of one of `attrs` (tried in order) on elements
/// matching `selector`.
pub fn first_attr(document: &Html, selector: &str, attrs: &[&str]) -> Option<String> {
    let sel = Selector::parse(selector).expect("valid selector");
    document.select(&sel).find_map(|el| {
        attrs
            .iter()
            .filter_map(|attr| el.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// `<meta property="og:...">` content.
pub fn og_meta(document: &Html, property: &str) -> Option<String> {
    first_attr(document, &format!(r#"meta[property="{property}"]"#), &["content"])
}

pub fn element_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Resolve a possibly relative link against `base`; absolute links pass through.
pub fn resolve_url(base: &str, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    match Url::parse(link) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(base)
            .ok()?
            .join(link)
            .ok()
            .map(|url| url.to_string()),
    }
}

/// Author/narrator/year from `div.detail-item` rows: a `span.font-medium`
/// label followed by a value span.
pub fn detail_credits(document: &Html) -> Credits {
    let row_sel = Selector::parse("div.detail-item").expect("valid selector");
    let label_sel = Selector::parse("span.font-medium").expect("valid selector");
    let value_sel =
        Selector::parse("span.detail-value-link, span.detail-value").expect("valid selector");

    let rows: Vec<(String, String)> = document
        .select(&row_sel)
        .filter_map(|row| {
            let label = row.select(&label_sel).next().map(|l| element_text(&l))?;
            let values: Vec<String> = row
                .select(&value_sel)
                .map(|v| element_text(&v))
                .filter(|v| !v.is_empty())
                .collect();
            (!values.is_empty()).then(|| (label, values.join(", ")))
        })
        .collect();

    Credits::from_labels(rows.iter().map(|(l, v)| (l.as_str(), v.as_str())))
}
