use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tree::{Boundary, DocumentTree, TextRange};

/// Errors from encoding or resolving anchor descriptors.
///
/// Resolution errors are expected in normal operation: the document a
/// descriptor is resolved against may have changed since capture. Callers
/// treat them as "skip this highlight", never as a reason to abort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    /// The selection is collapsed (start == end); there is nothing to anchor.
    #[error("cannot describe an empty selection")]
    EmptyRange,
    /// A boundary node is not reachable from the document root.
    #[error("selection boundary is detached from the document root")]
    DetachedNode,
    /// Descent from the root ran out of children before the path ended.
    #[error("no node at child index {index} (depth {depth} of path {path:?})")]
    NodeNotFound {
        path: Vec<usize>,
        depth: usize,
        index: usize,
    },
    /// The path resolved, but the stored offset no longer fits the node.
    #[error("offset {offset} exceeds node capacity {capacity}")]
    InvalidOffset { offset: usize, capacity: usize },
}

/// Serializable anchor descriptor for a stored highlight.
///
/// `range` is the only selector kind today; the tag leaves room for future
/// kinds (e.g. text-quote selectors) without a schema break.
///
/// Wire shape:
/// `{"type":"range","startPath":[..],"startOffset":n,"endPath":[..],"endOffset":n}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SelectorInfo {
    Range(RangeSelector),
}

/// Structural path pair describing a text range.
///
/// Each path lists sibling indices from the document root down to the
/// boundary node (root excluded). An empty path addresses the root itself.
/// Paths depend only on sibling order, never on content, so unrelated text
/// edits inside untouched nodes do not invalidate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSelector {
    pub start_path: Vec<usize>,
    pub start_offset: usize,
    pub end_path: Vec<usize>,
    pub end_offset: usize,
}

/// Encodes a selection into a durable descriptor.
///
/// Encoding is deterministic and purely structural: two selections with the
/// same boundary points yield identical descriptors. Collapsed selections
/// are rejected here so no empty highlight is ever persisted.
pub fn describe_range(
    tree: &DocumentTree,
    range: &TextRange,
) -> Result<SelectorInfo, AnchorError> {
    if range.is_collapsed() {
        return Err(AnchorError::EmptyRange);
    }

    Ok(SelectorInfo::Range(RangeSelector {
        start_path: path_from_root(tree, range.start)?,
        start_offset: range.start.offset,
        end_path: path_from_root(tree, range.end)?,
        end_offset: range.end.offset,
    }))
}

fn path_from_root(tree: &DocumentTree, boundary: Boundary) -> Result<Vec<usize>, AnchorError> {
    let mut path = Vec::new();
    let mut current = boundary.node;
    while current != tree.root() {
        let index = tree
            .sibling_index(current)
            .ok_or(AnchorError::DetachedNode)?;
        path.push(index);
        // sibling_index proved a parent exists
        current = tree.parent(current).ok_or(AnchorError::DetachedNode)?;
    }
    path.reverse();
    Ok(path)
}

/// Resolves a stored descriptor against the current document tree.
///
/// The tree is an external, unversioned resource: it may have been mutated
/// arbitrarily since the descriptor was captured, so every lookup step can
/// fail. Failure is a typed error, never a panic.
pub fn resolve_selector(
    tree: &DocumentTree,
    selector: &SelectorInfo,
) -> Result<TextRange, AnchorError> {
    let SelectorInfo::Range(range) = selector;
    let start = resolve_boundary(tree, &range.start_path, range.start_offset)?;
    let end = resolve_boundary(tree, &range.end_path, range.end_offset)?;
    Ok(TextRange::new(start, end))
}

fn resolve_boundary(
    tree: &DocumentTree,
    path: &[usize],
    offset: usize,
) -> Result<Boundary, AnchorError> {
    let mut current = tree.root();
    for (depth, &index) in path.iter().enumerate() {
        current = tree
            .children(current)
            .get(index)
            .copied()
            .ok_or_else(|| AnchorError::NodeNotFound {
                path: path.to_vec(),
                depth,
                index,
            })?;
    }

    let capacity = tree.boundary_capacity(current);
    if offset > capacity {
        return Err(AnchorError::InvalidOffset { offset, capacity });
    }

    Ok(Boundary {
        node: current,
        offset,
    })
}

/// Result of a best-effort batch resolution.
///
/// `resolved` pairs each successful range with the index of its input
/// selector so callers can map back to the owning highlight.
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub resolved: Vec<(usize, TextRange)>,
    pub skipped: usize,
}

/// Resolves many descriptors, skipping the ones that no longer fit.
///
/// One stale descriptor must not prevent the rest from rendering: failures
/// are logged and counted, and the underlying highlight records are left
/// untouched for a later resolve against a restored document.
pub fn resolve_all<'a, I>(tree: &DocumentTree, selectors: I) -> ResolveOutcome
where
    I: IntoIterator<Item = &'a SelectorInfo>,
{
    let mut outcome = ResolveOutcome::default();

    for (index, selector) in selectors.into_iter().enumerate() {
        match resolve_selector(tree, selector) {
            Ok(range) => outcome.resolved.push((index, range)),
            Err(error) => {
                tracing::debug!(index = index, error = %error, "skipping unresolvable highlight anchor");
                outcome.skipped += 1;
            }
        }
    }

    outcome
}
