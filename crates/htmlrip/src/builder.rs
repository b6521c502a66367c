//! Auto-closing tree builder.
//!
//! Lexer events are folded into a [`Tree`] under a synthetic
//! `<root bogus="true">`. Malformed markup is never an error: unmatched end
//! tags, missing end tags and illegal nesting are all resolved by the
//! quirks tables in [`MarkupTables`].

use std::collections::HashSet;
use std::io::Read;

use crate::config::MarkupTables;
use crate::entities::fix_text;
use crate::error::RipResult;
use crate::input::MarkupInput;
use crate::lexer::{TagEvent, TagLexer};
use crate::tree::Tree;
use crate::types::{Data, NodeId, Tag, Text};

/// Outcome of applying one lexer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Applied {
    /// Node that receives the next content.
    pub cur: NodeId,
    /// Node matched and closed by an end tag.
    pub closed: Option<NodeId>,
}

impl Applied {
    fn stay(cur: NodeId) -> Self {
        Self { cur, closed: None }
    }
}

/// Markup that ended [`TreeBuilder::read_node_until`] because it belongs
/// outside the node being read. It has been consumed but not applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// End tag of an element enclosing the node.
    End(String),
    /// Start tag whose special rule closes the node itself.
    Start(Tag),
}

#[derive(Clone, Debug)]
pub struct TreeBuilder {
    lexer: TagLexer,
    ignore_tags: HashSet<String>,
    text: String,
}

impl TreeBuilder {
    pub fn new(lexer: TagLexer) -> Self {
        Self {
            lexer,
            ignore_tags: HashSet::new(),
            text: String::new(),
        }
    }

    pub fn html() -> Self {
        Self::new(TagLexer::html())
    }

    pub fn xml() -> Self {
        Self::new(TagLexer::xml())
    }

    /// Text under any of these tags is dropped while building.
    pub fn with_ignore_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn lexer(&self) -> &TagLexer {
        &self.lexer
    }

    fn tables(&self) -> &MarkupTables {
        self.lexer.tables()
    }

    fn common_case(&self) -> bool {
        self.lexer.common_case()
    }

    /// Read the whole stream.
    ///
    /// Returns `None` for a document without any content, the single
    /// top-level element when it has no text beside it, and the synthetic
    /// root otherwise.
    pub fn parse<R: Read>(&mut self, input: &mut MarkupInput<R>) -> RipResult<Option<Tree>> {
        let mut tree = Tree::bogus(self.common_case());
        let mut cur = tree.root();
        while let Some(applied) = self.advance(input, &mut tree, cur, false)? {
            cur = applied.cur;
        }
        Ok(collapse(tree))
    }

    /// Read up to and including the first start tag and return it without
    /// children. Its content is then pulled with [`TreeBuilder::next_child`].
    pub fn top<R: Read>(&mut self, input: &mut MarkupInput<R>) -> RipResult<Option<Tree>> {
        let mut tree = Tree::bogus(self.common_case());
        let root = tree.root();
        let mut cur = root;
        loop {
            let Some(applied) = self.advance(input, &mut tree, cur, false)? else {
                return Ok(None);
            };
            cur = applied.cur;
            if cur != root && tree.tag(cur).is_some_and(|tag| !tag.name().is_empty()) {
                break;
            }
        }
        log::trace!(target: "htmlrip.builder", "top node {:?}", tree.tag(cur).map(Tag::name));
        Ok(Some(tree.extract(cur)))
    }

    /// Read exactly one complete top-level node, or `None` at end of stream.
    /// Comments are never kept in this mode.
    pub fn next_child<R: Read>(&mut self, input: &mut MarkupInput<R>) -> RipResult<Option<Tree>> {
        let mut tree = Tree::bogus(self.common_case());
        let root = tree.root();
        let mut cur = root;
        while let Some(applied) = self.advance(input, &mut tree, cur, true)? {
            cur = applied.cur;
            if cur == root && tree.has_children(root) {
                break;
            }
        }
        Ok(collapse(tree))
    }

    /// Continue reading the children of the already opened `node` until its
    /// end tag (or the end of the stream).
    pub fn read_full_node<R: Read>(
        &mut self,
        input: &mut MarkupInput<R>,
        tree: &mut Tree,
        node: NodeId,
    ) -> RipResult<()> {
        self.read_node_until(input, tree, node, |_| false).map(|_| ())
    }

    /// Like [`TreeBuilder::read_full_node`] for a node whose ancestors live
    /// outside `tree`.
    ///
    /// Reading stops early at an end tag that matches nothing in `tree` but
    /// is accepted by `encloses`, or at a start tag that implicitly closes
    /// `node` or an enclosing tag. That markup is returned for the caller
    /// to apply.
    pub fn read_node_until<R, F>(
        &mut self,
        input: &mut MarkupInput<R>,
        tree: &mut Tree,
        node: NodeId,
        encloses: F,
    ) -> RipResult<Option<Boundary>>
    where
        R: Read,
        F: Fn(&str) -> bool,
    {
        let mut cur = node;
        loop {
            self.text.clear();
            let more = self.lexer.read_text(input, &mut self.text)?;
            self.add_text(tree, cur);
            if !more {
                return Ok(None);
            }
            let event = match self.lexer.read_tag(input, false)? {
                None => continue,
                Some(TagEvent::EndOfStream) => return Ok(None),
                Some(TagEvent::End(name))
                    if find_open(tree, cur, &name).is_none() && encloses(name.as_str()) =>
                {
                    return Ok(Some(Boundary::End(name)));
                }
                Some(TagEvent::Start(tag)) if self.closes_node(tree, cur, node, &tag, &encloses) => {
                    return Ok(Some(Boundary::Start(tag)));
                }
                Some(event) => event,
            };
            let applied = self.apply(tree, cur, event);
            cur = applied.cur;
            if applied.closed == Some(node) || !is_within(tree, cur, node) {
                return Ok(None);
            }
        }
    }

    // Whether `tag` closes `node` under the special rules, either directly
    // or by closing an enclosing tag that `encloses` accepts.
    fn closes_node<F>(&self, tree: &Tree, cur: NodeId, node: NodeId, tag: &Tag, encloses: &F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        match special_target(self.tables(), tree, cur, tag.name()) {
            Some(found) => found == node,
            None => self
                .tables()
                .special_close_targets(tag.name())
                .is_some_and(|targets| targets.iter().any(|target| encloses(target))),
        }
    }

    /// Read one text run and the tag after it, applying both to `tree`.
    /// `None` once the stream is exhausted.
    pub fn advance<R: Read>(
        &mut self,
        input: &mut MarkupInput<R>,
        tree: &mut Tree,
        cur: NodeId,
        force_ignore_comments: bool,
    ) -> RipResult<Option<Applied>> {
        self.text.clear();
        let more = self.lexer.read_text(input, &mut self.text)?;
        self.add_text(tree, cur);
        if !more {
            return Ok(None);
        }
        Ok(match self.lexer.read_tag(input, force_ignore_comments)? {
            None => Some(Applied::stay(cur)),
            Some(TagEvent::EndOfStream) => None,
            Some(event) => Some(self.apply(tree, cur, event)),
        })
    }

    /// Apply a single lexer event at `cur`.
    pub fn apply(&self, tree: &mut Tree, cur: NodeId, event: TagEvent) -> Applied {
        match event {
            TagEvent::Comment(comment) => {
                tree.append(cur, Data::Comment(comment));
                Applied::stay(cur)
            }
            TagEvent::Script(script) => {
                tree.append(cur, Data::Script(script));
                Applied::stay(cur)
            }
            TagEvent::Style(style) => {
                tree.append(cur, Data::Style(style));
                Applied::stay(cur)
            }
            TagEvent::End(name) => match find_open(tree, cur, &name) {
                Some(node) => Applied {
                    cur: close_tag(tree, node),
                    closed: Some(node),
                },
                None => {
                    log::debug!(target: "htmlrip.builder", "stray end tag </{name}>");
                    let mut tag = Tag::new(name, self.common_case());
                    tag.set_self_terminating();
                    tree.append(cur, Data::Tag(tag));
                    Applied::stay(cur)
                }
            },
            TagEvent::Start(mut tag) => {
                let quirk = self.tables().is_nesting_quirk(tag.name())
                    && tree.find_tag_upward(cur, tag.name()).is_some();
                if quirk {
                    tag.set_self_terminating();
                }
                let parent = match special_target(self.tables(), tree, cur, tag.name()) {
                    Some(found) if tree.parent(found).is_some() => close_tag(tree, found),
                    _ => cur,
                };
                let descend = !tag.is_self_terminating();
                let id = tree.append(parent, Data::Tag(tag));
                Applied::stay(if descend { id } else { parent })
            }
            TagEvent::EndOfStream => Applied::stay(cur),
        }
    }

    fn add_text(&self, tree: &mut Tree, cur: NodeId) {
        if self.text.is_empty() {
            return;
        }
        if self.under_ignored(tree, cur) {
            return;
        }
        let text = fix_text(&self.text);
        if text.is_empty() {
            return;
        }
        if let Some(last) = tree.last_child(cur)
            && let Data::Text(prev) = tree.data_mut(last)
        {
            prev.append_run(&text);
            return;
        }
        tree.append(cur, Data::Text(Text::new(text)));
    }

    fn under_ignored(&self, tree: &Tree, cur: NodeId) -> bool {
        if self.ignore_tags.is_empty() {
            return false;
        }
        let mut node = Some(cur);
        while let Some(id) = node {
            if tree
                .tag(id)
                .is_some_and(|tag| self.ignore_tags.contains(tag.name()))
            {
                return true;
            }
            node = tree.parent(id);
        }
        false
    }
}

/// Open tag that a start tag named `name` closes under the special rules:
/// the nearest one named by the first of its targets that is open.
pub(crate) fn special_target(
    tables: &MarkupTables,
    tree: &Tree,
    cur: NodeId,
    name: &str,
) -> Option<NodeId> {
    let targets = tables.special_close_targets(name)?;
    let found = targets.iter().find_map(|target| find_open(tree, cur, target))?;
    log::trace!(
        target: "htmlrip.builder",
        "<{name}> closes open <{}>",
        tree.tag(found).map_or("", Tag::name)
    );
    Some(found)
}

/// Nearest open tag named `name` at or above `cur`, never matching the
/// synthetic document root.
fn find_open(tree: &Tree, cur: NodeId, name: &str) -> Option<NodeId> {
    let found = tree.find_tag_upward(cur, name)?;
    if tree.tag(found).is_some_and(Tag::is_bogus) {
        return None;
    }
    Some(found)
}

// Close `node`: childless tags become self-terminating; reading resumes at
// the parent (or at `node` itself when it is the top).
pub(crate) fn close_tag(tree: &mut Tree, node: NodeId) -> NodeId {
    if !tree.has_children(node)
        && let Some(tag) = tree.tag_mut(node)
    {
        tag.set_self_terminating();
    }
    tree.parent(node).unwrap_or(node)
}

fn is_within(tree: &Tree, mut cur: NodeId, node: NodeId) -> bool {
    loop {
        if cur == node {
            return true;
        }
        match tree.parent(cur) {
            Some(parent) => cur = parent,
            None => return false,
        }
    }
}

// Promote a lone top-level element unless text sits beside it; keep the
// synthetic root otherwise.
fn collapse(tree: Tree) -> Option<Tree> {
    let root = tree.root();
    if !tree.has_children(root) {
        return None;
    }
    let children = tree.children(root);
    if children
        .iter()
        .any(|&child| matches!(tree.data(child), Data::Text(_)))
    {
        return Some(tree);
    }
    let mut tags = children.iter().copied().filter(|&child| tree.tag(child).is_some());
    match (tags.next(), tags.next()) {
        (Some(only), None) => Some(tree.extract(only)),
        _ => Some(tree),
    }
}
