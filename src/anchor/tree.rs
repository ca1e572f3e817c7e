/// Handle to a node inside a [`DocumentTree`] arena.
///
/// Ids are only meaningful for the tree that produced them. They stay valid
/// for the lifetime of the tree; detaching a subtree does not invalidate its
/// ids, it only unlinks them from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Container node with an element tag (`p`, `div`, ...). Offsets into an
    /// element count children, like host boundary points do.
    Element(String),
    /// Leaf text node. Offsets count characters.
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A boundary point: a node plus an offset into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

/// A selection spanning two boundary points under one document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl TextRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// A selection is collapsed when both boundary points coincide.
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Arena-allocated stand-in for the host document model.
///
/// Anchor descriptors are positional, so the only structure that matters is
/// the ordered child list under each node. The tree is deliberately minimal:
/// elements, text leaves, append and detach. Nothing here performs I/O.
#[derive(Debug)]
pub struct DocumentTree {
    nodes: Vec<NodeData>,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    /// Creates a tree with a single `body` root element.
    pub fn new() -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element("body".to_string()),
        });
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Appends an element child under `parent` and returns its id.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.append(parent, NodeKind::Element(tag.to_string()))
    }

    /// Appends a text leaf under `parent` and returns its id.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append(parent, NodeKind::Text(text.to_string()))
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Detaches the `index`-th child of `parent`, returning its id.
    ///
    /// The subtree stays in the arena but is no longer reachable from the
    /// root; later siblings shift down by one, which is exactly the
    /// structural drift anchors must survive (or fail cleanly on).
    pub fn detach_child(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        if index >= self.nodes[parent.0].children.len() {
            return None;
        }
        let removed = self.nodes[parent.0].children.remove(index);
        self.nodes[removed.0].parent = None;
        Some(removed)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    /// Text content of a text leaf, `None` for elements.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    /// Position of `node` within its parent's child list.
    pub fn sibling_index(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&child| child == node)
    }

    /// Maximum valid boundary offset for `node`: character count for text
    /// leaves, child count for elements.
    pub fn boundary_capacity(&self, node: NodeId) -> usize {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => text.chars().count(),
            NodeKind::Element(_) => self.nodes[node.0].children.len(),
        }
    }
}
