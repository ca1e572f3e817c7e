//! Durable text-range anchors for highlights.
//!
//! A highlight must survive page reloads without storing character offsets
//! into the full document text (those drift whenever unrelated content
//! changes). Instead, a selection is encoded as a pair of structural paths:
//! for each boundary node, the sequence of sibling indices from the document
//! root down to that node, plus an offset within it.
//!
//! The module splits into:
//!
//! - [`tree`] - a minimal arena document tree standing in for the host
//!   document model (ordered children, element/text nodes)
//! - [`codec`] - encoding selections into [`SelectorInfo`] descriptors and
//!   resolving stored descriptors back into live ranges
//!
//! Resolution is best-effort by contract: the document may have mutated
//! since capture, so a descriptor that no longer fits fails with a typed
//! error and the caller skips that one highlight. The stored highlight
//! record is never discarded because resolution failed.

pub mod codec;
pub mod tree;

pub use codec::{
    describe_range, resolve_all, resolve_selector, AnchorError, RangeSelector, ResolveOutcome,
    SelectorInfo,
};
pub use tree::{Boundary, DocumentTree, NodeId, NodeKind, TextRange};
