use std::fmt;
use std::hash::{Hash, Hasher};

use crate::entities::escape_xml;

/// Index of a node inside a [`crate::Tree`] arena.
pub type NodeId = u32;

/// An element: name, ordered attributes and nesting bookkeeping.
///
/// Equality is name plus attributes; the counters and the container id are
/// bookkeeping and never take part in comparisons.
#[derive(Clone, Debug)]
pub struct Tag {
    name: String,
    attributes: Vec<(String, String)>,
    common_case: bool,
    self_terminating: bool,
    num_children: u32,
    child_num: u32,
    container: Option<NodeId>,
}

impl Tag {
    /// Create a tag; in common-case (HTML) mode the name is ASCII-lowercased.
    pub fn new(name: impl Into<String>, common_case: bool) -> Self {
        let mut name = name.into();
        if common_case {
            name.make_ascii_lowercase();
        }
        let self_terminating = name.is_empty();
        Self {
            name,
            attributes: Vec::new(),
            common_case,
            self_terminating,
            num_children: 0,
            child_num: 0,
            container: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn common_case(&self) -> bool {
        self.common_case
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| self.key_matches(key, name))
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place so insertion
    /// order is kept.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let mut name = name.into();
        if self.common_case {
            name.make_ascii_lowercase();
        }
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self
            .attributes
            .iter()
            .position(|(key, _)| self.key_matches(key, name))?;
        Some(self.attributes.remove(pos).1)
    }

    fn key_matches(&self, key: &str, name: &str) -> bool {
        if self.common_case {
            key.eq_ignore_ascii_case(name)
        } else {
            key == name
        }
    }

    pub fn is_self_terminating(&self) -> bool {
        self.self_terminating
    }

    pub fn set_self_terminating(&mut self) {
        self.self_terminating = true;
    }

    pub fn num_children(&self) -> u32 {
        self.num_children
    }

    /// Bump the child counter, returning the ordinal for the new child.
    pub fn inc_num_children(&mut self) -> u32 {
        let ordinal = self.num_children;
        self.num_children += 1;
        ordinal
    }

    /// Position of this tag among its parent's children.
    pub fn child_num(&self) -> u32 {
        self.child_num
    }

    pub fn set_child_num(&mut self, child_num: u32) {
        self.child_num = child_num;
    }

    pub fn container(&self) -> Option<NodeId> {
        self.container
    }

    pub fn set_container(&mut self, container: Option<NodeId>) {
        self.container = container;
    }

    /// Synthetic document root wrapped around a full parse.
    pub fn is_bogus(&self) -> bool {
        self.attribute("bogus") == Some("true")
    }

    /// Synthetic root standing in for a list of top-level fragments.
    pub fn is_invented(&self) -> bool {
        self.attribute("invented") == Some("true")
    }

    /// Open tag as markup: `<name k="v">`, or `<name k="v"/>` when
    /// self-terminating.
    pub fn write_open(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            escape_xml(value, out);
            out.push('"');
        }
        if self.self_terminating {
            out.push('/');
        }
        out.push('>');
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.attributes == other.attributes
    }
}

impl Eq for Tag {}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_open(&mut out);
        f.write_str(&out)
    }
}

macro_rules! string_payload {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $name {
            text: String,
            container: Option<NodeId>,
        }

        impl $name {
            pub fn new(text: impl Into<String>) -> Self {
                Self {
                    text: text.into(),
                    container: None,
                }
            }

            pub fn text(&self) -> &str {
                &self.text
            }

            pub fn container(&self) -> Option<NodeId> {
                self.container
            }

            pub fn set_container(&mut self, container: Option<NodeId>) {
                self.container = container;
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.text == other.text
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.text.hash(state);
            }
        }
    };
}

string_payload!(
    /// Character data between tags, already unescaped and whitespace-collapsed.
    Text
);
string_payload!(
    /// Raw markup declaration between `<` and `>`, e.g. `!-- note --`.
    Comment
);
string_payload!(
    /// Raw body of a `<script>` element.
    Script
);
string_payload!(
    /// Raw body of a `<style>` element.
    Style
);

impl Text {
    /// Merge a following text run into this one, joined by a single space.
    pub fn append_run(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }
}

impl Comment {
    /// An `<?xml ...?>` declaration kept as a comment node.
    pub fn is_xml_declaration(&self) -> bool {
        self.text.starts_with("?xml ")
    }
}

/// Payload of a tree node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Data {
    Tag(Tag),
    Text(Text),
    Comment(Comment),
    Script(Script),
    Style(Style),
}

impl Data {
    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Data::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn as_tag_mut(&mut self) -> Option<&mut Tag> {
        match self {
            Data::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Data::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            Data::Comment(comment) => Some(comment),
            _ => None,
        }
    }

    pub fn container(&self) -> Option<NodeId> {
        match self {
            Data::Tag(tag) => tag.container(),
            Data::Text(text) => text.container(),
            Data::Comment(comment) => comment.container(),
            Data::Script(script) => script.container(),
            Data::Style(style) => style.container(),
        }
    }

    pub(crate) fn set_container(&mut self, id: NodeId) {
        let id = Some(id);
        match self {
            Data::Tag(tag) => tag.set_container(id),
            Data::Text(text) => text.set_container(id),
            Data::Comment(comment) => comment.set_container(id),
            Data::Script(script) => script.set_container(id),
            Data::Style(style) => style.set_container(id),
        }
    }
}
