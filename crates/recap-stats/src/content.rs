//! URL and image detection on note content.

use regex::Regex;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Path extensions counted as images. Compared case-insensitively.
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "avif"];

/// Every URL-shaped substring of `text`, in order of appearance.
pub fn find_urls(text: &str) -> Vec<&str> {
    URL_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// `text` with every URL removed, then trimmed.
pub fn strip_urls(text: &str) -> String {
    URL_RE.replace_all(text, "").trim().to_string()
}

/// Character count of the URL-stripped text.
///
/// Counts Unicode scalar values, so an emoji counts once regardless of its
/// byte length.
pub fn char_count(text: &str) -> u64 {
    strip_urls(text).chars().count() as u64
}

/// Whether the URL's path ends in an image extension. Query string and
/// fragment are ignored; a bare host never counts.
pub fn is_image_url(url: &str) -> bool {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = match without_scheme.find('/') {
        Some(idx) => &without_scheme[idx..],
        None => return false,
    };
    let path = path.split(['?', '#']).next().unwrap_or("");
    let last_segment = path.rsplit('/').next().unwrap_or("");

    match last_segment.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// Number of image URLs in `text`.
pub fn image_count(text: &str) -> u64 {
    find_urls(text).into_iter().filter(|u| is_image_url(u)).count() as u64
}
