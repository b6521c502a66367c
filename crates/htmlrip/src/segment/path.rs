use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::config::SegmentConfig;
use crate::leaves::all_text;
use crate::rippers::{DataUnit, NodeUnit, TextUnit};
use crate::tag_stack::{StackView, TagStackSnapshot};
use crate::tree::Tree;
use crate::types::Tag;

/// One ripped leaf: its text and the tags above it.
#[derive(Clone, Debug)]
pub struct Path {
    text: String,
    tags: TagStackSnapshot,
    tree: Option<Tree>,
}

impl Path {
    pub fn new(text: impl Into<String>, tags: TagStackSnapshot) -> Self {
        Self {
            text: text.into(),
            tags,
            tree: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }

    pub fn tags(&self) -> &TagStackSnapshot {
        &self.tags
    }

    /// The subtree this path was ripped from, for node-ripped paths.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn deepest_tag(&self) -> Option<&Rc<Tag>> {
        self.tags.top()
    }

    /// An empty path ending in a line-break tag.
    pub fn is_break(&self, config: &SegmentConfig) -> bool {
        !self.has_text()
            && self
                .deepest_tag()
                .is_some_and(|tag| config.inline_break_tags.contains(tag.name()))
    }

    pub fn is_horizontal_rule(&self) -> bool {
        !self.has_text() && self.deepest_tag().is_some_and(|tag| tag.name() == "hr")
    }

    /// Shallowest tag named in `names`.
    pub fn index_of_tag(&self, names: &HashSet<String>) -> Option<usize> {
        self.tags.has_any_tag(names)
    }

    /// Deepest tag named in `names`.
    pub fn last_index_of_tag(&self, names: &HashSet<String>) -> Option<usize> {
        self.tags.find_deepest_any(names)
    }

    /// Whether this path's nearest block ancestor is shared with `other`,
    /// i.e. it lies before the point where the two stacks diverge.
    ///
    /// A path without any block ancestor is inline with everything.
    pub fn is_inline(&self, other: &Path, config: &SegmentConfig) -> bool {
        let Some(block) = self.last_index_of_tag(&config.block_tags) else {
            return true;
        };
        match self.tags.find_first_divergent_tag(&other.tags) {
            Some(divergence) => block < divergence,
            None => false,
        }
    }

    /// Words as counted for block statistics: one more than the spaces.
    pub fn word_count(&self) -> usize {
        word_count(&self.text)
    }

    /// Key of the first `len` tags.
    pub fn key_to(&self, len: usize) -> String {
        self.tags.path_key_to(len)
    }
}

pub(crate) fn word_count(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        1 + text.bytes().filter(|&b| b == b' ').count()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}='{}'", self.tags.path_key(), self.text)
    }
}

impl From<TextUnit> for Path {
    fn from(unit: TextUnit) -> Self {
        Self::new(unit.text, unit.tags)
    }
}

impl From<NodeUnit> for Path {
    fn from(unit: NodeUnit) -> Self {
        let text = all_text(&unit.tree, unit.tree.root());
        // The node's own tag sits below the snapshot; include it so the
        // path reaches the leaf like a text unit's would.
        let mut tags = unit.tags.tags().to_vec();
        if let Some(tag) = unit.tree.tag(unit.tree.root()) {
            tags.push(Rc::new(tag.clone()));
        }
        Self {
            text,
            tags: TagStackSnapshot::new(tags, unit.tags.equivalence()),
            tree: Some(unit.tree),
        }
    }
}

impl<U: Into<Path>> From<DataUnit<U>> for Path {
    fn from(unit: DataUnit<U>) -> Self {
        unit.unit.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_stack::TagEquivalence;

    fn stack(names: &[&str]) -> Vec<Rc<Tag>> {
        names.iter().map(|name| Rc::new(Tag::new(*name, true))).collect()
    }

    fn path(text: &str, tags: Vec<Rc<Tag>>) -> Path {
        Path::new(text, TagStackSnapshot::new(tags, TagEquivalence::Identity))
    }

    #[test]
    fn breaks_and_rules_need_empty_text() {
        let config = SegmentConfig::html();
        let tags = stack(&["body", "br"]);
        assert!(path("", tags.clone()).is_break(&config));
        assert!(!path("x", tags).is_break(&config));
        assert!(path("", stack(&["hr"])).is_horizontal_rule());
        assert!(path("", stack(&["hr"])).is_break(&config));
        assert!(!path("", stack(&["p"])).is_horizontal_rule());
    }

    #[test]
    fn inline_within_a_shared_block() {
        let config = SegmentConfig::html();
        let shared = stack(&["body", "div", "p"]);
        let mut other = shared[..2].to_vec();
        other.push(Rc::new(Tag::new("p", true)));
        let a = path("a", shared.clone());
        let b = path("b", other);
        // Both sit in the same div; their p tags differ.
        assert!(a.is_inline(&b, &config));
        assert!(b.is_inline(&a, &config));

        let mut heading = shared[..2].to_vec();
        heading.push(Rc::new(Tag::new("h1", true)));
        let h = path("Title", heading);
        assert!(a.is_inline(&h, &config));
        assert!(!h.is_inline(&a, &config));
    }

    #[test]
    fn no_block_is_always_inline() {
        let config = SegmentConfig::html();
        let a = path("a", stack(&["span"]));
        let b = path("b", stack(&["div"]));
        assert!(a.is_inline(&b, &config));
        assert!(!b.is_inline(&a, &config));
    }

    #[test]
    fn word_counts_follow_spaces() {
        assert_eq!(path("", Vec::new()).word_count(), 0);
        assert_eq!(path("one", Vec::new()).word_count(), 1);
        assert_eq!(path("one two three", Vec::new()).word_count(), 3);
    }

    #[test]
    fn node_paths_reach_the_node_tag() {
        use crate::rippers::NodeRipper;
        let unit = NodeRipper::html(&b"<div><p>x <b>y</b></p></div>"[..])
            .next()
            .unwrap()
            .unwrap();
        let path = Path::from(unit);
        assert_eq!(path.text(), "x y");
        assert_eq!(path.tags().path_key(), "div.p");
        assert!(path.tree().is_some());
    }
}
