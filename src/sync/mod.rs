//! Bidirectional article synchronization.
//!
//! Sync treats the store as the authority and a client's offline cache as a
//! proposal. One round has two halves:
//!
//! - [`reconciler`] - Pure merge planning: pair local and stored articles by
//!   URL, pick winners by `updatedAt`, and schedule the writes.
//! - [`engine`] - Plan execution: apply the scheduled creates and updates
//!   concurrently and report per-article failures without aborting the round.
//!
//! # Example
//!
//! ```ignore
//! use crate::sync::sync_articles;
//!
//! let outcome = sync_articles(&db, "user-1", &cached_articles).await?;
//! println!("{} created, {} updated", outcome.created, outcome.updated);
//! ```

mod engine;
mod reconciler;

pub use engine::{sync_articles, SyncOutcome};
pub use reconciler::{reconcile, MergePlan};
