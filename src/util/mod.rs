//! Shared utility functions.
//!
//! Currently just URL validation: article URLs come from outside and must
//! never smuggle in a non-web scheme, and the API client sends credentials
//! to a configured base, so both get checked at the boundary.
//!
//! # Examples
//!
//! ```
//! use dogear::util::{validate_article_url, validate_api_base};
//!
//! let url = validate_article_url("https://example.com/post/42").unwrap();
//! assert_eq!(url.domain(), Some("example.com"));
//!
//! assert!(validate_api_base("http://api.example.com").is_err());
//! ```

mod url;

pub use url::{validate_api_base, validate_article_url, UrlValidationError};

/// Maximum allowed search query length, shared by the storage query surface
/// and any front-end validation layered above it.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
