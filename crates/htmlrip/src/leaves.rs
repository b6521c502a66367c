use std::collections::HashSet;

use crate::tree::Tree;
use crate::types::{Data, NodeId};

/// Text leaves under `node` in document order, skipping the subtrees of
/// tags named in `ignore_tags`.
pub fn gather_leaves(tree: &Tree, node: NodeId, ignore_tags: &HashSet<String>) -> Vec<NodeId> {
    let mut leaves = Vec::new();
    let mut stack = vec![node];
    while let Some(id) = stack.pop() {
        match tree.data(id) {
            Data::Text(_) => leaves.push(id),
            Data::Tag(tag) if ignore_tags.contains(tag.name()) => {}
            Data::Tag(_) => stack.extend(tree.children(id).iter().rev().copied()),
            _ => {}
        }
    }
    leaves
}

/// All text under `node`, one space between leaves.
pub fn all_text(tree: &Tree, node: NodeId) -> String {
    let mut out = String::new();
    for id in tree.descendants(node) {
        if let Data::Text(text) = tree.data(id)
            && !text.text().is_empty()
        {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text.text());
        }
    }
    out
}

/// Follow a chain of only children from `node` down to a text leaf.
pub fn dive_for_text(tree: &Tree, node: NodeId) -> Option<&str> {
    let mut cur = node;
    loop {
        match tree.data(cur) {
            Data::Text(text) => return Some(text.text()),
            Data::Tag(_) => match tree.children(cur) {
                [only] => cur = *only,
                _ => return None,
            },
            _ => return None,
        }
    }
}
