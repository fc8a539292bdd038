//! Turns Drive and Docs links into file ids.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DriveError, Result};

/// Link shapes that carry an id, tried in order.
static LINK_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // drive.google.com/drive/[u/N/]folders/<ID>
        r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)",
        // drive.google.com/file/d/<ID>[/view]
        r"^https?://drive\.google\.com/file/d/([a-zA-Z0-9_-]+)",
        // drive.google.com/open?id=<ID>, drive.google.com/uc?id=<ID>[&export=download]
        r"^https?://drive\.google\.com/(?:open|uc)\?(?:.*&)?id=([a-zA-Z0-9_-]+)",
        // docs.google.com/{document,spreadsheets,presentation,forms}/d/<ID>
        r"^https?://docs\.google\.com/(?:document|spreadsheets|presentation|forms)/d/([a-zA-Z0-9_-]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid link regex"))
    .collect()
});

/// Valid Drive id (alphanumeric, underscore, hyphen).
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Extract a Drive id from a link, or validate a raw id.
///
/// # Examples
///
/// ```
/// use driven::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/file/d/1abc123/view").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_id("Id01").unwrap();
/// assert_eq!(id, "Id01");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    for regex in LINK_REGEXES.iter() {
        if let Some(id) = regex.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidArgument(format!(
        "not a Drive link or id: {}",
        url_or_id
    )))
}
