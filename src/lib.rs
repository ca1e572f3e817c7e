//! dogear is a read-it-later article store: capture pages, track reading
//! progress and highlights, and reconcile an offline cache against the
//! server-side store.
//!
//! The crate splits along the wire:
//!
//! - [`model`] - article, highlight, and note types shared by both sides
//! - [`capture`] - turn a captured page into an article record
//! - [`anchor`] - structural text anchors for highlight positioning
//! - [`progress`] - scroll positions and read-status transitions
//! - [`storage`] - SQLite-backed store for articles, highlights, and notes
//! - [`sync`] - last-write-wins reconciliation between a cache and the store
//! - [`client`] - HTTP client, offline cache file, and the request session
//! - [`config`] - optional TOML configuration

pub mod anchor;
pub mod capture;
pub mod client;
pub mod config;
pub mod model;
pub mod progress;
pub mod storage;
pub mod sync;
pub mod util;
