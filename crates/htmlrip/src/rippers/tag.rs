use std::io::Read;
use std::rc::Rc;

use crate::builder::{Boundary, TreeBuilder};
use crate::error::RipResult;
use crate::input::MarkupInput;
use crate::leaves::all_text;
use crate::lexer::TagEvent;
use crate::rippers::{RippedUnit, UnitSource, bump, pop_logged};
use crate::tag_stack::{StackView, TagStack, TagStackSnapshot};
use crate::tree::Tree;
use crate::types::{Data, Tag};

#[derive(Clone, Debug)]
pub struct TagUnit {
    pub tag: Rc<Tag>,
    /// Open tags with `tag` on top.
    pub tags: TagStackSnapshot,
    pub encoding_error: bool,
}

impl RippedUnit for TagUnit {
    fn tags(&self) -> &TagStackSnapshot {
        &self.tags
    }

    fn encoding_error(&self) -> bool {
        self.encoding_error
    }
}

/// Streams start tags in document order. Text is skipped; after any tag
/// its whole element can be pulled with [`TagRipper::rip_node`].
pub struct TagRipper<R: Read> {
    input: MarkupInput<R>,
    builder: TreeBuilder,
    stack: TagStack,
    scratch: String,
    // Start tag that implicitly closed the last ripped node.
    pending_start: Option<Tag>,
    peeked: Option<TagUnit>,
    last: Option<TagUnit>,
    index: Option<usize>,
    finished_stream: bool,
    closed: bool,
}

impl<R: Read> TagRipper<R> {
    pub fn new(reader: R, builder: TreeBuilder, stack: TagStack) -> Self {
        Self {
            input: MarkupInput::new(reader),
            builder,
            stack,
            scratch: String::new(),
            pending_start: None,
            peeked: None,
            last: None,
            index: None,
            finished_stream: false,
            closed: false,
        }
    }

    pub fn html(reader: R) -> Self {
        Self::new(reader, TreeBuilder::html(), TagStack::html())
    }

    pub fn xml(reader: R) -> Self {
        Self::new(reader, TreeBuilder::xml(), TagStack::xml())
    }

    pub fn tag_stack(&self) -> Option<&TagStackSnapshot> {
        self.last.as_ref().map(|unit| &unit.tags)
    }

    pub fn has_next(&mut self) -> RipResult<bool> {
        if self.peeked.is_none() {
            self.peeked = self.read_unit()?;
        }
        Ok(self.peeked.is_some())
    }

    pub fn hit_encoding_error(&self) -> bool {
        self.last.as_ref().is_some_and(|unit| unit.encoding_error)
    }

    pub fn finished_stream(&self) -> bool {
        self.finished_stream
    }

    /// Read the rest of the element opened by the last yielded tag.
    ///
    /// `None` when nothing was yielded yet, or when the ripper already
    /// looked past that tag with `has_next`. The element's end tag is
    /// consumed, so the ripper continues after it. Markup that closes an
    /// enclosing element ends the node and is applied to the stack.
    pub fn rip_node(&mut self) -> RipResult<Option<Tree>> {
        if self.peeked.is_some() || self.closed {
            return Ok(None);
        }
        let Some(unit) = self.last.as_ref() else {
            return Ok(None);
        };
        let tag = Rc::clone(&unit.tag);

        let mut tree = Tree::new(Data::Tag(Tag::clone(&tag)));
        if tag.is_self_terminating() {
            return Ok(Some(tree));
        }
        let root = tree.root();
        let stack = &self.stack;
        let boundary = self
            .builder
            .read_node_until(&mut self.input, &mut tree, root, |name| {
                stack.has_tag(name).is_some()
            })?;
        if self.stack.top().is_some_and(|top| Rc::ptr_eq(top, &tag)) {
            self.stack.pop();
        }
        match boundary {
            Some(Boundary::End(name)) => pop_logged(&mut self.stack, &name),
            Some(Boundary::Start(next)) => self.pending_start = Some(next),
            None => {}
        }
        Ok(Some(tree))
    }

    /// All text of the element opened by the last yielded tag.
    pub fn rip_text(&mut self) -> RipResult<Option<String>> {
        Ok(self.rip_node()?.map(|tree| all_text(&tree, tree.root())))
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.input.close();
        }
    }

    fn read_unit(&mut self) -> RipResult<Option<TagUnit>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(tag) = self.pending_start.take() {
            return Ok(Some(self.start_unit(tag)));
        }
        loop {
            self.scratch.clear();
            if !self.builder.lexer().read_text(&mut self.input, &mut self.scratch)? {
                self.finished_stream = true;
                return Ok(None);
            }
            match self.builder.lexer().read_tag(&mut self.input, true)? {
                Some(TagEvent::Start(tag)) => return Ok(Some(self.start_unit(tag))),
                Some(TagEvent::End(name)) => pop_logged(&mut self.stack, &name),
                Some(TagEvent::EndOfStream) => {
                    self.finished_stream = true;
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn start_unit(&mut self, tag: Tag) -> TagUnit {
        let tag = self.stack.push_tag(tag);
        TagUnit {
            tag,
            tags: self.stack.snapshot(false),
            encoding_error: self.input.take_encoding_error(),
        }
    }
}

impl<R: Read> UnitSource for TagRipper<R> {
    type Unit = TagUnit;

    fn next_unit(&mut self) -> Option<RipResult<TagUnit>> {
        let unit = match self.peeked.take() {
            Some(unit) => Ok(Some(unit)),
            None => self.read_unit(),
        };
        match unit {
            Ok(Some(unit)) => {
                bump(&mut self.index);
                self.last = Some(unit.clone());
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
        TagRipper::close(self);
    }
}

impl<R: Read> Iterator for TagRipper<R> {
    type Item = RipResult<TagUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_unit()
    }
}

impl<R: Read> Drop for TagRipper<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::as_xml;

    #[test]
    fn tags_stream_in_document_order() {
        let got: Vec<_> = TagRipper::html(&b"<html><body><p>a<b>b</b></p><br></body></html>"[..])
            .map(|unit| {
                let unit = unit.unwrap();
                format!("{}@{}", unit.tag.name(), unit.tags.path_key())
            })
            .collect();
        assert_eq!(
            got,
            vec![
                "html@html",
                "body@html.body",
                "p@html.body.p",
                "b@html.body.p.b",
                "br@html.body.br",
            ]
        );
    }

    #[test]
    fn rip_node_reads_the_whole_element() {
        let mut ripper = TagRipper::html(&b"<div><ul><li>one<li>two</ul><p>after</p></div>"[..]);
        let mut found = None;
        while let Some(unit) = ripper.next() {
            if unit.unwrap().tag.name() == "ul" {
                found = ripper.rip_node().unwrap();
                break;
            }
        }
        let tree = found.expect("ul");
        assert_eq!(
            as_xml(&tree, tree.root(), false),
            "<ul><li>one</li><li>two</li></ul>\n"
        );

        let next = ripper.next().unwrap().unwrap();
        assert_eq!(next.tag.name(), "p");
        assert_eq!(next.tags.path_key(), "div.p");
    }

    #[test]
    fn rip_node_stops_at_an_enclosing_end_tag() {
        let mut ripper = TagRipper::html(&b"<div><p>text</div><span>after</span>"[..]);
        assert_eq!(ripper.next().unwrap().unwrap().tag.name(), "div");
        assert_eq!(ripper.next().unwrap().unwrap().tag.name(), "p");
        let tree = ripper.rip_node().unwrap().unwrap();
        assert_eq!(as_xml(&tree, tree.root(), false), "<p>text</p>\n");

        let next = ripper.next().unwrap().unwrap();
        assert_eq!(next.tag.name(), "span");
        assert_eq!(next.tags.path_key(), "span");
        assert!(ripper.next().is_none());
    }

    #[test]
    fn rip_node_hands_back_the_tag_that_closed_it() {
        let mut ripper = TagRipper::html(&b"<ul><li>one<li>two</ul>"[..]);
        assert_eq!(ripper.next().unwrap().unwrap().tag.name(), "ul");
        assert_eq!(ripper.next().unwrap().unwrap().tag.name(), "li");
        let tree = ripper.rip_node().unwrap().unwrap();
        assert_eq!(as_xml(&tree, tree.root(), false), "<li>one</li>\n");

        let next = ripper.next().unwrap().unwrap();
        assert_eq!(next.tag.name(), "li");
        assert_eq!(next.tags.path_key(), "ul.li");
        assert_eq!(ripper.rip_text().unwrap().as_deref(), Some("two"));
        assert!(ripper.next().is_none());
    }

    #[test]
    fn rip_text_after_peek_is_refused() {
        let mut ripper = TagRipper::html(&b"<h1>Title <i>here</i></h1><p>x</p>"[..]);
        ripper.next().unwrap().unwrap();
        assert!(ripper.has_next().unwrap());
        assert_eq!(ripper.rip_text().unwrap(), None);

        let mut ripper = TagRipper::html(&b"<h1>Title <i>here</i></h1><p>x</p>"[..]);
        ripper.next().unwrap().unwrap();
        assert_eq!(ripper.rip_text().unwrap().as_deref(), Some("Title here"));
        assert_eq!(ripper.next().unwrap().unwrap().tag.name(), "p");
        assert!(ripper.next().is_none());
        assert_eq!(ripper.index(), Some(1));
    }
}
