use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use crate::config::{DEFAULT_IGNORE_TAGS, MarkupTables};
use crate::entities::fix_text;
use crate::error::RipResult;
use crate::input::MarkupInput;
use crate::lexer::{LexerOptions, TagEvent, TagLexer};
use crate::rippers::{RippedUnit, UnitSource, bump, pop_logged};
use crate::tag_stack::{StackPolicy, StackView, TagStack, TagStackSnapshot};
use crate::types::Tag;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextRipperOptions {
    /// Also yield an empty unit for an element that holds no text.
    pub keep_empties: bool,
    /// Text under these tags is skipped.
    pub ignore_tags: HashSet<String>,
    /// Start tags with these names are collected as they stream past.
    pub save_tags: HashSet<String>,
    /// Deep-copy the tags of each snapshot instead of sharing them.
    pub copy_snapshots: bool,
}

impl TextRipperOptions {
    pub fn html() -> Self {
        Self {
            keep_empties: false,
            ignore_tags: DEFAULT_IGNORE_TAGS.iter().map(|s| s.to_string()).collect(),
            save_tags: HashSet::from(["meta".to_string()]),
            copy_snapshots: false,
        }
    }

    pub fn xml() -> Self {
        Self::default()
    }

    pub fn keep_empties(mut self, keep: bool) -> Self {
        self.keep_empties = keep;
        self
    }

    pub fn copy_snapshots(mut self, copy: bool) -> Self {
        self.copy_snapshots = copy;
        self
    }
}

/// One run of text with its ancestry.
#[derive(Clone, Debug)]
pub struct TextUnit {
    pub text: String,
    pub tags: TagStackSnapshot,
    pub encoding_error: bool,
}

impl RippedUnit for TextUnit {
    fn tags(&self) -> &TagStackSnapshot {
        &self.tags
    }

    fn encoding_error(&self) -> bool {
        self.encoding_error
    }
}

/// Streams text runs, each paired with the tags open around it.
///
/// Tags read right after a run are held back until the next step, so a
/// unit's snapshot never includes markup that follows its text.
pub struct TextRipper<R: Read> {
    input: MarkupInput<R>,
    lexer: TagLexer,
    stack: TagStack,
    options: TextRipperOptions,
    text: String,
    // Start tag that followed the previous unit's text.
    pending_tag: Option<Tag>,
    // End tag that followed the previous unit (or closed an empty element).
    pending_end: Option<String>,
    saw_begin: bool,
    saved: Vec<Tag>,
    peeked: Option<TextUnit>,
    last: Option<TagStackSnapshot>,
    last_encoding_error: bool,
    index: Option<usize>,
    finished_stream: bool,
    closed: bool,
}

impl<R: Read> TextRipper<R> {
    pub fn new(reader: R, lexer: TagLexer, stack: TagStack, options: TextRipperOptions) -> Self {
        Self {
            input: MarkupInput::new(reader),
            lexer,
            stack,
            options,
            text: String::new(),
            pending_tag: None,
            pending_end: None,
            saw_begin: false,
            saved: Vec::new(),
            peeked: None,
            last: None,
            last_encoding_error: false,
            index: None,
            finished_stream: false,
            closed: false,
        }
    }

    pub fn html(reader: R) -> Self {
        Self::html_with(reader, TextRipperOptions::html())
    }

    pub fn html_with(reader: R, options: TextRipperOptions) -> Self {
        let tables = Arc::new(MarkupTables::html());
        Self::new(
            reader,
            TagLexer::new(LexerOptions::html(), Arc::clone(&tables)),
            TagStack::new(StackPolicy::html(), tables),
            options,
        )
    }

    pub fn xml(reader: R) -> Self {
        Self::new(reader, TagLexer::xml(), TagStack::xml(), TextRipperOptions::xml())
    }

    /// Snapshot for the unit most recently returned, carrying (and
    /// draining) the tags saved so far.
    pub fn tag_stack(&mut self) -> Option<TagStackSnapshot> {
        let snapshot = self.last.clone()?;
        Some(snapshot.with_saved(self.take_saved_tags()))
    }

    pub fn take_saved_tags(&mut self) -> Vec<Tag> {
        std::mem::take(&mut self.saved)
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

    /// Whether the end of the input has been reached.
    pub fn finished_stream(&self) -> bool {
        self.finished_stream
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.input.close();
        }
    }

    fn deliver(&mut self, unit: TextUnit) -> TextUnit {
        bump(&mut self.index);
        self.last = Some(unit.tags.clone());
        self.last_encoding_error = unit.encoding_error;
        unit
    }

    fn read_unit(&mut self) -> RipResult<Option<TextUnit>> {
        if self.closed {
            return Ok(None);
        }

        let mut result: Option<String> = None;
        let mut hold_pop = false;
        if let Some(tag) = self.pending_tag.take() {
            let self_terminating = tag.is_self_terminating();
            self.stack.push_tag(tag);
            if self.options.keep_empties && self_terminating {
                hold_pop = true;
                result = Some(String::new());
            }
        }
        if !hold_pop && let Some(name) = self.pending_end.take() {
            pop_logged(&mut self.stack, &name);
        }

        // Text runs separated only by markup that produces no event (an
        // ignored comment, a processing instruction) form one run, as they
        // do in a built tree.
        let mut joins_previous = false;
        while result.is_none() || joins_previous {
            self.text.clear();
            let more = self.lexer.read_text(&mut self.input, &mut self.text)?;
            let text = fix_text(&self.text);
            let has_text = !text.is_empty();
            if has_text {
                if !joins_previous {
                    self.stack.count_child();
                }
                if self.stack.has_any_tag(&self.options.ignore_tags).is_none() {
                    match result.as_mut() {
                        Some(run) if joins_previous => {
                            run.push(' ');
                            run.push_str(&text);
                        }
                        _ => result = Some(text),
                    }
                }
            }
            if !more {
                self.finished_stream = true;
                break;
            }

            let after_text = has_text || joins_previous;
            joins_previous = false;
            match self.lexer.read_tag(&mut self.input, false)? {
                Some(TagEvent::Start(tag)) => self.on_start(tag, &mut result),
                Some(TagEvent::End(name)) => self.on_end(name, &mut result),
                Some(TagEvent::EndOfStream) => {
                    self.finished_stream = true;
                    break;
                }
                None => joins_previous = after_text,
                Some(TagEvent::Comment(_) | TagEvent::Script(_) | TagEvent::Style(_)) => {
                    self.stack.count_child();
                }
            }
        }

        let Some(text) = result else {
            return Ok(None);
        };
        Ok(Some(TextUnit {
            text,
            tags: self.stack.snapshot(self.options.copy_snapshots),
            encoding_error: self.input.take_encoding_error(),
        }))
    }

    fn on_start(&mut self, tag: Tag, result: &mut Option<String>) {
        self.saw_begin = true;
        if self.options.save_tags.contains(tag.name()) {
            self.saved.push(tag.clone());
        }
        let end = tag.is_self_terminating().then(|| tag.name().to_string());
        if result.is_none() {
            self.stack.push_tag(tag);
        } else {
            self.pending_tag = Some(tag);
        }
        if let Some(name) = end {
            self.on_end(name, result);
        }
    }

    fn on_end(&mut self, name: String, result: &mut Option<String>) {
        if result.is_some() {
            self.pending_end = Some(name);
        } else if self.options.keep_empties && self.saw_begin {
            self.pending_end = Some(name);
            *result = Some(String::new());
        } else {
            pop_logged(&mut self.stack, &name);
        }
        self.saw_begin = false;
    }
}

impl<R: Read> UnitSource for TextRipper<R> {
    type Unit = TextUnit;

    fn next_unit(&mut self) -> Option<RipResult<TextUnit>> {
        let unit = match self.peeked.take() {
            Some(unit) => Ok(Some(unit)),
            None => self.read_unit(),
        };
        match unit {
            Ok(Some(unit)) => Some(Ok(self.deliver(unit))),
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
        TextRipper::close(self);
    }
}

impl<R: Read> Iterator for TextRipper<R> {
    type Item = RipResult<TextUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_unit()
    }
}

impl<R: Read> Drop for TextRipper<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rip(html: &str, options: TextRipperOptions) -> Vec<(String, String)> {
        TextRipper::html_with(html.as_bytes(), options)
            .map(|unit| {
                let unit = unit.unwrap();
                (unit.text, unit.tags.path_key().to_string())
            })
            .collect()
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn text_runs_carry_their_ancestry() {
        let got = rip(
            "<html><body><p>Hello <b>bold</b> tail</p><p>next</p></body></html>",
            TextRipperOptions::html(),
        );
        assert_eq!(
            got,
            pairs(&[
                ("Hello", "html.body.p"),
                ("bold", "html.body.p.b"),
                ("tail", "html.body.p"),
                ("next", "html.body.p"),
            ])
        );
    }

    #[test]
    fn keep_empties_reports_break_tags() {
        let got = rip(
            "This is some text<br>and some more text",
            TextRipperOptions::html().keep_empties(true),
        );
        assert_eq!(
            got,
            pairs(&[
                ("This is some text", ""),
                ("", "br"),
                ("and some more text", ""),
            ])
        );
    }

    #[test]
    fn breaks_are_silent_without_keep_empties() {
        let got = rip("one<br>two<p></p>", TextRipperOptions::html());
        assert_eq!(got, pairs(&[("one", ""), ("two", "")]));
    }

    #[test]
    fn empty_elements_yield_units_with_keep_empties() {
        let got = rip("<div><p></p>x</div>", TextRipperOptions::html().keep_empties(true));
        assert_eq!(got, pairs(&[("", "div.p"), ("x", "div")]));
    }

    #[test]
    fn ignored_tags_hide_their_text() {
        let got = rip(
            "<body><select><option>choice</select><textarea>typed</textarea>shown</body>",
            TextRipperOptions::html(),
        );
        assert_eq!(got, pairs(&[("shown", "body")]));
    }

    #[test]
    fn meta_tags_are_saved_and_drained() {
        let mut ripper = TextRipper::html(
            &b"<html><head><meta name=a content=1><meta name=b></head><body>x</body></html>"[..],
        );
        let unit = ripper.next().unwrap().unwrap();
        assert_eq!(unit.text, "x");
        let stack = ripper.tag_stack().expect("snapshot");
        let names: Vec<_> = stack
            .saved_tags()
            .iter()
            .filter_map(|t| t.attribute("name"))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(ripper.take_saved_tags().is_empty());
    }

    #[test]
    fn has_next_peeks_without_consuming() {
        let mut ripper = TextRipper::html(&b"<p>a</p><p>b</p>"[..]);
        assert!(ripper.has_next().unwrap());
        assert!(ripper.has_next().unwrap());
        assert_eq!(ripper.index(), None);
        assert_eq!(ripper.next().unwrap().unwrap().text, "a");
        assert_eq!(ripper.index(), Some(0));
        assert_eq!(ripper.next().unwrap().unwrap().text, "b");
        assert!(!ripper.has_next().unwrap());
        assert!(ripper.next().is_none());
        assert!(ripper.finished_stream());
        ripper.close();
        ripper.close();
    }

    #[test]
    fn snapshots_are_not_changed_by_later_advances() {
        let mut ripper = TextRipper::html(&b"<div><p>a</p></div><span>b</span>"[..]);
        let first = ripper.next().unwrap().unwrap();
        assert!(ripper.has_next().unwrap());
        let _ = ripper.next();
        assert_eq!(first.tags.path_key(), "div.p");
    }

    #[test]
    fn encoding_errors_are_flagged_per_unit() {
        let mut ripper = TextRipper::html(&b"<p>bad \xFF byte</p>"[..]);
        let unit = ripper.next().unwrap().unwrap();
        assert!(unit.encoding_error);
        assert!(ripper.hit_encoding_error());
    }

    #[test]
    fn dropped_markup_does_not_split_a_run() {
        let got = rip(
            "<div><p>one<!-- c -->two<?pi?> three</p><p>four</p></div>",
            TextRipperOptions::html(),
        );
        assert_eq!(got, pairs(&[("one two three", "div.p"), ("four", "div.p")]));

        // Kept comments are nodes of their own and do split runs.
        let got: Vec<_> = TextRipper::xml(&b"<d>one<!-- c -->two</d>"[..])
            .map(|u| u.unwrap().text)
            .collect();
        assert_eq!(got, vec!["one", "two"]);
    }

    #[test]
    fn xml_ripper_keeps_case() {
        let got: Vec<_> = TextRipper::xml(&b"<Doc><Item>v</Item></Doc>"[..])
            .map(|u| u.unwrap().tags.path_key().to_string())
            .collect();
        assert_eq!(got, vec!["Doc.Item"]);
    }
}
