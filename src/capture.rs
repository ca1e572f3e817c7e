//! Turns an extracted page into a saveable article.
//!
//! The reading surface hands over whatever it could scrape (url, title,
//! visible text, leading paragraphs); this module derives the stored
//! metadata: domain, word count, estimated reading time, and a short
//! content snippet.

use chrono::Utc;
use thiserror::Error;

use crate::model::{LocalArticle, ReadStatus};
use crate::util::{validate_article_url, UrlValidationError};

/// Reading speed assumed for the time estimate.
pub const WORDS_PER_MINUTE: u32 = 200;

/// How many leading paragraphs feed the snippet.
const SNIPPET_PARAGRAPHS: usize = 3;
/// Snippet length cap, in characters.
const SNIPPET_MAX_CHARS: usize = 300;

/// Raw page data as extracted by the capturing surface.
#[derive(Debug, Clone, Default)]
pub struct CapturedPage {
    pub url: String,
    pub title: String,
    /// Full visible text, used only for word counting.
    pub body_text: String,
    /// Leading paragraphs in document order, used for the snippet.
    pub paragraphs: Vec<String>,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("invalid article URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error("page has no usable title")]
    EmptyTitle,
}

/// Builds a fresh local article from a captured page.
///
/// The URL is stored verbatim (it is the article's sync identity, so no
/// normalization happens here); only its scheme and host are validated.
/// The result carries no `id` and no `updatedAt` — both belong to the
/// authoritative store.
pub fn capture_article(page: &CapturedPage) -> Result<LocalArticle, CaptureError> {
    let parsed = validate_article_url(&page.url)?;

    let title = page.title.trim();
    if title.is_empty() {
        return Err(CaptureError::EmptyTitle);
    }

    let word_count = count_words(&page.body_text);

    Ok(LocalArticle {
        id: None,
        url: page.url.clone(),
        title: title.to_string(),
        domain: parsed.host_str().unwrap_or_default().to_string(),
        content_snippet: make_snippet(&page.paragraphs),
        word_count: Some(word_count),
        estimated_reading_time_minutes: Some(reading_minutes(word_count)),
        saved_at: Utc::now(),
        last_accessed_at: None,
        scroll_position: None,
        progress_percent: 0,
        tags: Vec::new(),
        status: ReadStatus::Unread,
        updated_at: None,
    })
}

/// Whitespace-delimited word count.
pub fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Estimated minutes to read `word_count` words, rounded up. Empty text
/// estimates zero rather than one.
pub fn reading_minutes(word_count: u32) -> u32 {
    if word_count == 0 {
        return 0;
    }
    word_count.div_ceil(WORDS_PER_MINUTE)
}

fn make_snippet(paragraphs: &[String]) -> Option<String> {
    let joined = paragraphs
        .iter()
        .take(SNIPPET_PARAGRAPHS)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        return None;
    }
    Some(truncate_chars(&joined, SNIPPET_MAX_CHARS))
}

/// Truncates to `max_chars` characters on a char boundary, marking the cut
/// with an ellipsis.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut truncated = text[..byte_index].trim_end().to_string();
            truncated.push_str("...");
            truncated
        }
        None => text.to_string(),
    }
}
