//! Client-side surface: HTTP transport, durable cache, session state.
//!
//! The pieces compose the offline-first story:
//!
//! - [`api`] - Typed reqwest client for the article service endpoints.
//! - [`cache`] - File-backed `{articles, token}` blob the client reads and
//!   writes while offline.
//! - [`session`] - Explicit request/response handlers over both, with the
//!   degradation rules (server unreachable means serve the cache; a failed
//!   sync means the cache stays untouched).

mod api;
mod cache;
mod session;

pub use api::{ApiClient, ApiError};
pub use cache::{CacheError, FileCache};
pub use session::{Request, Response, Session};
