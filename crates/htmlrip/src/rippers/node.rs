use std::collections::HashSet;
use std::io::Read;
use std::rc::Rc;
use std::sync::Arc;

use crate::builder::{close_tag, special_target};
use crate::config::{DEFAULT_IGNORE_TAGS, MarkupTables};
use crate::entities::fix_text;
use crate::error::RipResult;
use crate::input::MarkupInput;
use crate::lexer::{LexerOptions, TagEvent, TagLexer};
use crate::rippers::{RippedUnit, UnitSource, bump, pop_logged};
use crate::tag_stack::{StackPolicy, StackView, TagStack, TagStackSnapshot};
use crate::tree::Tree;
use crate::types::{Data, NodeId, Tag, Text};

/// The smallest subtree closing off one run of text.
#[derive(Clone, Debug)]
pub struct NodeUnit {
    pub tree: Tree,
    /// Ancestors of the subtree's root.
    pub tags: TagStackSnapshot,
    pub encoding_error: bool,
}

impl RippedUnit for NodeUnit {
    fn tags(&self) -> &TagStackSnapshot {
        &self.tags
    }

    fn encoding_error(&self) -> bool {
        self.encoding_error
    }
}

/// Streams subtrees, each rooted at the tag that held the next run of text.
///
/// Tags opened before any text are kept on the stack. Once text shows up,
/// the innermost open tag becomes the root of a fresh subtree and everything
/// up to that tag's end is built under it. Self-terminating tags get an
/// empty text child so empty elements such as `<meta>` still surface.
pub struct NodeRipper<R: Read> {
    input: MarkupInput<R>,
    lexer: TagLexer,
    stack: TagStack,
    ignore_tags: HashSet<String>,
    text: String,
    // End tag that closed an ancestor of the last subtree; popped on the
    // next read so that subtree's snapshot still shows the ancestor.
    pending_end: Option<String>,
    // Start tag that closed the last subtree; replayed on the next read.
    pending_start: Option<Tag>,
    peeked: Option<NodeUnit>,
    last: Option<TagStackSnapshot>,
    last_encoding_error: bool,
    index: Option<usize>,
    finished_stream: bool,
    closed: bool,
}

impl<R: Read> NodeRipper<R> {
    pub fn new(reader: R, lexer: TagLexer, stack: TagStack, ignore_tags: HashSet<String>) -> Self {
        Self {
            input: MarkupInput::new(reader),
            lexer,
            stack,
            ignore_tags,
            text: String::new(),
            pending_end: None,
            pending_start: None,
            peeked: None,
            last: None,
            last_encoding_error: false,
            index: None,
            finished_stream: false,
            closed: false,
        }
    }

    pub fn html(reader: R) -> Self {
        let tables = Arc::new(MarkupTables::html());
        Self::new(
            reader,
            TagLexer::new(LexerOptions::html(), Arc::clone(&tables)),
            TagStack::new(StackPolicy::html(), tables),
            DEFAULT_IGNORE_TAGS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn xml(reader: R) -> Self {
        Self::new(reader, TagLexer::xml(), TagStack::xml(), HashSet::new())
    }

    pub fn tag_stack(&self) -> Option<&TagStackSnapshot> {
        self.last.as_ref()
    }

    pub fn has_next(&mut self) -> RipResult<bool> {
        if self.peeked.is_none() {
            self.peeked = self.read_unit()?;
        }
        Ok(self.peeked.is_some())
    }

    pub fn hit_encoding_error(&self) -> bool {
        self.last_encoding_error
    }

    pub fn finished_stream(&self) -> bool {
        self.finished_stream
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.input.close();
        }
    }

    fn read_unit(&mut self) -> RipResult<Option<NodeUnit>> {
        if self.closed {
            return Ok(None);
        }
        let Some(tree) = self.read_node()? else {
            return Ok(None);
        };
        Ok(Some(NodeUnit {
            tree,
            tags: self.stack.snapshot(false),
            encoding_error: self.input.take_encoding_error(),
        }))
    }

    fn read_node(&mut self) -> RipResult<Option<Tree>> {
        // The subtree being built and the node receiving content.
        let mut building: Option<(Tree, NodeId)> = None;
        self.text.clear();
        if let Some(name) = self.pending_end.take() {
            pop_logged(&mut self.stack, &name);
        }

        loop {
            let event = match self.pending_start.take() {
                Some(tag) => TagEvent::Start(tag),
                None => {
                    if self.lexer.read_text(&mut self.input, &mut self.text)? {
                        match self.lexer.read_tag(&mut self.input, true)? {
                            Some(event) => event,
                            None => {
                                // Text accumulates across constructs that
                                // produce no event.
                                self.text.push(' ');
                                continue;
                            }
                        }
                    } else {
                        TagEvent::EndOfStream
                    }
                }
            };

            let ignored = building
                .as_ref()
                .is_some_and(|(tree, cur)| self.under_ignored(tree, *cur))
                || self.stack.has_any_tag(&self.ignore_tags).is_some();
            let text = if ignored {
                String::new()
            } else {
                fix_text(&self.text)
            };
            self.text.clear();

            if !text.is_empty() {
                if building.is_none()
                    && let Some(tag) = self.stack.pop()
                {
                    let tree = Tree::new(Data::Tag(unshare(tag)));
                    let root = tree.root();
                    building = Some((tree, root));
                }
                // Text before the first open tag has no home and is dropped.
                if let Some((tree, cur)) = building.as_mut() {
                    tree.append(*cur, Data::Text(Text::new(text.as_str())));
                }
            }

            match event {
                TagEvent::Start(mut tag) => {
                    let empty = tag.is_self_terminating();
                    if let Some((tree, cur)) = building.as_mut() {
                        let Some(parent) = self.subtree_parent(tree, *cur, &mut tag) else {
                            // Closes the subtree or one of its ancestors.
                            self.pending_start = Some(tag);
                            break;
                        };
                        let empty = tag.is_self_terminating();
                        let id = tree.append(parent, Data::Tag(tag));
                        if empty {
                            tree.append(id, Data::Text(Text::new("")));
                            *cur = parent;
                        } else {
                            *cur = id;
                        }
                    } else if text.is_empty() && !empty {
                        self.stack.push_tag(tag);
                    } else if ignored {
                        log::trace!(target: "htmlrip.rippers", "skipping ignored <{}>", tag.name());
                    } else {
                        let mut tree = Tree::new(Data::Tag(tag));
                        let root = tree.root();
                        if empty {
                            tree.append(root, Data::Text(Text::new("")));
                            building = Some((tree, root));
                            break;
                        }
                        building = Some((tree, root));
                    }
                }
                TagEvent::End(name) => {
                    let Some((tree, cur)) = building.as_mut() else {
                        pop_logged(&mut self.stack, &name);
                        continue;
                    };
                    match tree.find_tag_upward(*cur, &name) {
                        Some(found) => match tree.parent(found) {
                            Some(_) => *cur = close_tag(tree, found),
                            None => break,
                        },
                        None => {
                            // Closes an ancestor of the subtree.
                            self.pending_end = Some(name);
                            break;
                        }
                    }
                }
                TagEvent::EndOfStream => {
                    self.finished_stream = true;
                    break;
                }
                TagEvent::Comment(_) | TagEvent::Script(_) | TagEvent::Style(_) => {}
            }
        }

        Ok(building.map(|(tree, _)| tree))
    }

    // Where `tag` attaches inside the subtree, after the same nesting and
    // special-rule quirks a full parse applies. `None` when the tag closes
    // the subtree's root or an ancestor on the stack.
    fn subtree_parent(&self, tree: &mut Tree, cur: NodeId, tag: &mut Tag) -> Option<NodeId> {
        let tables = self.lexer.tables();
        if tables.is_nesting_quirk(tag.name())
            && (tree.find_tag_upward(cur, tag.name()).is_some()
                || self.stack.has_tag(tag.name()).is_some())
        {
            tag.set_self_terminating();
        }
        match special_target(tables, tree, cur, tag.name()) {
            Some(found) if tree.parent(found).is_some() => Some(close_tag(tree, found)),
            Some(_) => None,
            None => {
                let closes_outer = tables
                    .special_close_targets(tag.name())
                    .is_some_and(|targets| {
                        targets.iter().any(|target| self.stack.has_tag(target).is_some())
                    });
                (!closes_outer).then_some(cur)
            }
        }
    }

    fn under_ignored(&self, tree: &Tree, cur: NodeId) -> bool {
        !self.ignore_tags.is_empty()
            && tree
                .ancestor_tags(cur)
                .iter()
                .any(|tag| self.ignore_tags.contains(tag.name()))
    }
}

fn unshare(tag: Rc<Tag>) -> Tag {
    Rc::try_unwrap(tag).unwrap_or_else(|shared| Tag::clone(&shared))
}

impl<R: Read> UnitSource for NodeRipper<R> {
    type Unit = NodeUnit;

    fn next_unit(&mut self) -> Option<RipResult<NodeUnit>> {
        let unit = match self.peeked.take() {
            Some(unit) => Ok(Some(unit)),
            None => self.read_unit(),
        };
        match unit {
            Ok(Some(unit)) => {
                bump(&mut self.index);
                self.last = Some(unit.tags.clone());
                self.last_encoding_error = unit.encoding_error;
                Some(Ok(unit))
            }
            Ok(None) => {
                self.close();
                None
            }
            Err(err) => {
                self.close();
                Some(Err(err))
            }
        }
    }

    fn index(&self) -> Option<usize> {
        self.index
    }

    fn close(&mut self) {
        NodeRipper::close(self);
    }
}

impl<R: Read> Iterator for NodeRipper<R> {
    type Item = RipResult<NodeUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_unit()
    }
}

impl<R: Read> Drop for NodeRipper<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::serialize::as_xml;

    fn rip(html: &str) -> Vec<(String, String)> {
        NodeRipper::html(html.as_bytes())
            .map(|unit| {
                let unit = unit.unwrap();
                let xml = as_xml(&unit.tree, unit.tree.root(), false);
                (xml.trim_end().to_string(), unit.tags.path_key().to_string())
            })
            .collect()
    }

    #[test]
    fn nested_tags_are_captured_with_their_text() {
        assert_eq!(
            rip("<html><body><p>Hello <b>bold</b> tail</p><p>next</p></body></html>"),
            vec![
                ("<p>Hello<b>bold</b>tail</p>".to_string(), "html.body".to_string()),
                ("<p>next</p>".to_string(), "html.body".to_string()),
            ]
        );
    }

    #[test]
    fn self_terminating_tags_carry_empty_text() {
        let units: Vec<_> = NodeRipper::html(&b"<div>one<br>two</div>"[..])
            .map(Result::unwrap)
            .collect();
        assert_eq!(units.len(), 1);
        let tree = &units[0].tree;
        let br = tree.children(tree.root())[1];
        assert_eq!(tree.tag(br).map(Tag::name), Some("br"));
        assert_eq!(tree.children(br).len(), 1);
        assert_eq!(as_xml(tree, tree.root(), false), "<div>one<br/>two</div>\n");
    }

    #[test]
    fn leading_empty_element_is_its_own_unit() {
        assert_eq!(
            rip("<p><br>x</p>"),
            vec![
                ("<br/>".to_string(), "p".to_string()),
                ("<p>x</p>".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn end_tag_outside_the_subtree_pops_the_stack() {
        assert_eq!(
            rip("<div><p>text</div><span>after</span>"),
            vec![
                ("<p>text</p>".to_string(), "div".to_string()),
                ("<span>after</span>".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn unclosed_text_at_end_of_stream_is_kept() {
        assert_eq!(
            rip("<html><body><div><p>first</p><p>last words"),
            vec![
                ("<p>first</p>".to_string(), "html.body.div".to_string()),
                ("<p>last words</p>".to_string(), "html.body.div".to_string()),
            ]
        );
        assert_eq!(rip("<p>one<!-- c -->two"), vec![("<p>one two</p>".to_string(), String::new())]);
    }

    #[test]
    fn subtree_follows_the_full_parse() {
        let html = "<div>x<p>a<p>b</p></div>";
        let full = TreeBuilder::html()
            .parse(&mut MarkupInput::new(html.as_bytes()))
            .unwrap()
            .unwrap();
        let units: Vec<_> = NodeRipper::html(html.as_bytes()).map(Result::unwrap).collect();
        assert_eq!(units.len(), 1);
        assert_eq!(
            as_xml(&units[0].tree, units[0].tree.root(), false),
            as_xml(&full, full.root(), false)
        );
        assert_eq!(
            rip("<div>x<font>a<font>b</font></div>"),
            vec![("<div>x<font>a<font/>b</font></div>".to_string(), String::new())]
        );
    }

    #[test]
    fn start_tag_closing_the_root_starts_the_next_unit() {
        assert_eq!(
            rip("<ul><li>one<li>two</ul><p>after</p>"),
            vec![
                ("<li>one</li>".to_string(), "ul".to_string()),
                ("<li>two</li>".to_string(), "ul".to_string()),
                ("<p>after</p>".to_string(), String::new()),
            ]
        );
        assert_eq!(
            rip("<p><span>text<p>next</p>"),
            vec![
                ("<span>text</span>".to_string(), "p".to_string()),
                ("<p>next</p>".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn ignored_text_is_skipped() {
        assert_eq!(
            rip("<body><select><option>x</option></select><p>kept</p></body>"),
            vec![("<p>kept</p>".to_string(), "body".to_string())]
        );
    }

    #[test]
    fn peeking_and_indexing() {
        let mut ripper = NodeRipper::html(&b"<p>a</p><p>b</p>"[..]);
        assert!(ripper.has_next().unwrap());
        assert_eq!(ripper.index(), None);
        ripper.next().unwrap().unwrap();
        assert_eq!(ripper.index(), Some(0));
        assert_eq!(ripper.tag_stack().map(|s| s.depth()), Some(0));
        ripper.next().unwrap().unwrap();
        assert!(ripper.next().is_none());
        assert!(ripper.finished_stream());
    }
}
