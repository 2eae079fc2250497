use crate::sanitize::collapse_whitespace;
use regex::Regex;
use std::sync::LazyLock;

static TRAILING_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{4}|\d{2})\s*$").expect("valid regex"));

/// Author, narrator and year recovered from a site's label/value detail rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credits {
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub year: Option<String>,
}

impl Credits {
    /// Build credits from `(label, value)` pairs such as `("Authors:", "Andy Weir")`.
    ///
    /// Labels are matched case-insensitively by substring: anything containing
    /// "author", "narrator" or "release date". Later rows overwrite earlier ones.
    pub fn from_labels<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut credits = Credits::default();
        for (label, value) in pairs {
            let label = label.trim().to_lowercase();
            let value = collapse_whitespace(value);
            if value.is_empty() {
                continue;
            }
            if label.contains("author") {
                credits.author = Some(value);
            } else if label.contains("narrator") {
                credits.narrator = Some(value);
            } else if label.contains("release date") {
                if let Some(year) = normalize_year(&value) {
                    credits.year = Some(year);
                }
            }
        }
        credits
    }

    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.narrator.is_none() && self.year.is_none()
    }
}

/// Pull the trailing 2- or 4-digit year out of a date string.
///
/// Two-digit years are taken to be in the 2000s: `"17"` and `"03/05/17"`
/// both give `"2017"`, `"March 3, 2019"` gives `"2019"`.
pub fn normalize_year(text: &str) -> Option<String> {
    let caps = TRAILING_YEAR.captures(text.trim())?;
    let digits = caps.get(1)?.as_str();
    if digits.len() == 2 {
        Some(format!("20{digits}"))
    } else {
        Some(digits.to_string())
    }
}

/// Join a list of credited names the way sites display them ("A, B").
pub fn join_names<I, S>(names: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = names
        .into_iter()
        .map(|n| collapse_whitespace(n.as_ref()))
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}
