use crate::types::{Data, NodeId, Tag};

#[derive(Clone, Debug)]
struct Node {
    data: Data,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed markup tree.
///
/// Nodes are addressed by [`NodeId`]; each payload records the id of the
/// node that holds it, so "which node owns this tag" is an O(1) lookup
/// without a reference cycle. Nodes are only ever appended; pruning a
/// subtree copies it out with [`Tree::extract`].
#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new(mut data: Data) -> Self {
        data.set_container(0);
        Self {
            nodes: vec![Node {
                data,
                parent: None,
                children: Vec::new(),
            }],
            root: 0,
        }
    }

    /// Synthetic `<root bogus="true">` holding a document being parsed.
    pub fn bogus(common_case: bool) -> Self {
        let mut tag = Tag::new("root", common_case);
        tag.set_attribute("bogus", "true");
        Self::new(Data::Tag(tag))
    }

    /// Synthetic `<root invented="true">` grouping independent fragments.
    pub fn invented(common_case: bool) -> Self {
        let mut tag = Tag::new("root", common_case);
        tag.set_attribute("invented", "true");
        Self::new(Data::Tag(tag))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn data(&self, id: NodeId) -> &Data {
        &self.nodes[id as usize].data
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut Data {
        &mut self.nodes[id as usize].data
    }

    pub fn tag(&self, id: NodeId) -> Option<&Tag> {
        self.data(id).as_tag()
    }

    pub fn tag_mut(&mut self, id: NodeId) -> Option<&mut Tag> {
        self.data_mut(id).as_tag_mut()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id as usize].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id as usize].children
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.nodes[id as usize].children.is_empty()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id as usize].children.last().copied()
    }

    /// Append `data` as the last child of `parent`.
    ///
    /// A tag payload receives its ordinal among the parent's children and
    /// the parent's child counter is bumped. A self-terminating tag only
    /// takes text children (the empty placeholder streamed units carry).
    pub fn append(&mut self, parent: NodeId, mut data: Data) -> NodeId {
        let id = self.nodes.len() as NodeId;
        debug_assert!(
            matches!(data, Data::Text(_))
                || !self.tag(parent).is_some_and(Tag::is_self_terminating),
            "appending a tag under a self-terminating tag"
        );
        if let Some(parent_tag) = self.tag_mut(parent) {
            let ordinal = parent_tag.inc_num_children();
            if let Data::Tag(tag) = &mut data {
                tag.set_child_num(ordinal);
            }
        }
        data.set_container(id);
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent as usize].children.push(id);
        id
    }

    /// Depth of `id` below the root (the root is at depth 0).
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cur = id;
        while let Some(parent) = self.parent(cur) {
            depth += 1;
            cur = parent;
        }
        depth
    }

    /// Nearest tag named `name` at or above `from`.
    pub fn find_tag_upward(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            if self.tag(id).is_some_and(|tag| tag.name() == name) {
                return Some(id);
            }
            cur = self.parent(id);
        }
        None
    }

    /// Tags from the root down to `id` inclusive.
    pub fn ancestor_tags(&self, id: NodeId) -> Vec<&Tag> {
        let mut tags = Vec::new();
        let mut cur = Some(id);
        while let Some(node) = cur {
            if let Some(tag) = self.tag(node) {
                tags.push(tag);
            }
            cur = self.parent(node);
        }
        tags.reverse();
        tags
    }

    /// Pre-order walk of the subtree rooted at `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Copy the subtree rooted at `id` out as a standalone tree.
    pub fn extract(&self, id: NodeId) -> Tree {
        let mut out = Tree::new(self.data(id).clone());
        let mut pending: Vec<(NodeId, NodeId)> = self
            .children(id)
            .iter()
            .rev()
            .map(|&child| (child, out.root))
            .collect();

        while let Some((old, new_parent)) = pending.pop() {
            let new_id = out.push_copy(new_parent, self.data(old).clone());
            pending.extend(self.children(old).iter().rev().map(|&child| (child, new_id)));
        }
        out
    }

    // Raw append that keeps the payload's counters as they were.
    fn push_copy(&mut self, parent: NodeId, mut data: Data) -> NodeId {
        let id = self.nodes.len() as NodeId;
        data.set_container(id);
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent as usize].children.push(id);
        id
    }

    /// Graft a copy of `other` (all of it) under `parent`.
    pub fn adopt(&mut self, parent: NodeId, other: &Tree) -> NodeId {
        let top = self.append(parent, other.data(other.root).clone());
        let mut pending: Vec<(NodeId, NodeId)> = other
            .children(other.root)
            .iter()
            .rev()
            .map(|&child| (child, top))
            .collect();
        while let Some((old, new_parent)) = pending.pop() {
            let new_id = self.push_copy(new_parent, other.data(old).clone());
            pending.extend(other.children(old).iter().rev().map(|&child| (child, new_id)));
        }
        top
    }
}

/// Iterator returned by [`Tree::descendants`].
pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}
