//! Ancestor tag stacks for streaming modes.
//!
//! A [`TagStack`] follows the open tags while a ripper advances, applying
//! the same auto-close quirks the tree builder applies so the reported
//! ancestry matches a full parse. [`TagStackSnapshot`] is the frozen copy
//! handed out with each ripped unit. Both answer the same queries through
//! [`StackView`].

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::config::MarkupTables;
use crate::error::{RipError, RipResult};
use crate::types::Tag;

/// How two stacks decide that tags at the same depth are "the same".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagEquivalence {
    /// Same tag instance (shared `Rc`).
    #[default]
    Identity,
    /// Same name and same position among the parent's children. Works for
    /// stacks built by independent parses of the same document.
    Structural,
}

impl TagEquivalence {
    pub fn equivalent(self, a: &Rc<Tag>, b: &Rc<Tag>) -> bool {
        match self {
            TagEquivalence::Identity => Rc::ptr_eq(a, b),
            TagEquivalence::Structural => a.name() == b.name() && a.child_num() == b.child_num(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PopMode {
    /// A pop that matches nothing leaves the stack alone.
    #[default]
    Lenient,
    /// A pop that matches nothing is reported as [`RipError::StackMiss`].
    Strict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackPolicy {
    pub html_quirks: bool,
    pub equivalence: TagEquivalence,
    pub pop: PopMode,
}

impl StackPolicy {
    pub fn html() -> Self {
        Self {
            html_quirks: true,
            equivalence: TagEquivalence::Identity,
            pop: PopMode::Lenient,
        }
    }

    pub fn xml() -> Self {
        Self {
            html_quirks: false,
            equivalence: TagEquivalence::Identity,
            pop: PopMode::Strict,
        }
    }

    pub fn with_equivalence(mut self, equivalence: TagEquivalence) -> Self {
        self.equivalence = equivalence;
        self
    }
}

impl Default for StackPolicy {
    fn default() -> Self {
        Self::html()
    }
}

fn join_names(tags: &[Rc<Tag>]) -> String {
    let mut key = String::new();
    for tag in tags {
        if !key.is_empty() {
            key.push('.');
        }
        key.push_str(tag.name());
    }
    key
}

/// Read-only queries shared by live stacks and snapshots.
///
/// Index-returning queries give the position from the root (0) or `None`
/// when nothing matches.
pub trait StackView {
    /// Root-to-current tags.
    fn tags(&self) -> &[Rc<Tag>];

    fn equivalence(&self) -> TagEquivalence;

    /// Tag names joined by `.`; memoized.
    fn path_key(&self) -> &str;

    fn depth(&self) -> usize {
        self.tags().len()
    }

    fn is_empty(&self) -> bool {
        self.tags().is_empty()
    }

    fn tag(&self, index: usize) -> Option<&Rc<Tag>> {
        self.tags().get(index)
    }

    fn top(&self) -> Option<&Rc<Tag>> {
        self.tags().last()
    }

    /// Key of the first `len` tags.
    fn path_key_to(&self, len: usize) -> String {
        let tags = self.tags();
        join_names(&tags[..len.min(tags.len())])
    }

    /// Key of the first `len` tags with each tag's child ordinal, e.g.
    /// `html[0].body[1]`.
    fn path_key_with_ordinals(&self, len: usize) -> String {
        let mut key = String::new();
        for tag in self.tags().iter().take(len) {
            if !key.is_empty() {
                key.push('.');
            }
            key.push_str(tag.name());
            key.push('[');
            key.push_str(&tag.child_num().to_string());
            key.push(']');
        }
        key
    }

    fn has_tag(&self, name: &str) -> Option<usize> {
        self.tags().iter().position(|tag| tag.name() == name)
    }

    fn has_any_tag(&self, names: &HashSet<String>) -> Option<usize> {
        self.tags().iter().position(|tag| names.contains(tag.name()))
    }

    /// First tag equal (by name and attributes) to `instance`.
    fn has_tag_instance(&self, instance: &Tag) -> Option<usize> {
        self.tags().iter().position(|tag| **tag == *instance)
    }

    fn has_tag_attribute(&self, attribute: &str, value: &str) -> Option<usize> {
        self.tags()
            .iter()
            .position(|tag| tag.attribute(attribute) == Some(value))
    }

    fn has_tag_attribute_in(&self, attribute: &str, values: &HashSet<String>) -> Option<usize> {
        self.tags().iter().position(|tag| {
            tag.attribute(attribute)
                .is_some_and(|value| values.contains(value))
        })
    }

    /// First tag carrying every attribute/value pair in `attributes`.
    fn has_tag_attributes(&self, attributes: &HashMap<String, String>) -> Option<usize> {
        self.tags().iter().position(|tag| {
            attributes
                .iter()
                .all(|(key, value)| tag.attribute(key) == Some(value.as_str()))
        })
    }

    fn find_deepest_tag(&self, name: &str) -> Option<usize> {
        self.tags().iter().rposition(|tag| tag.name() == name)
    }

    fn find_deepest_any(&self, names: &HashSet<String>) -> Option<usize> {
        self.tags().iter().rposition(|tag| names.contains(tag.name()))
    }

    /// Deepest tag named in `names` that also has `attribute` set.
    fn find_deepest_with_attribute(&self, names: &HashSet<String>, attribute: &str) -> Option<usize> {
        self.tags()
            .iter()
            .rposition(|tag| names.contains(tag.name()) && tag.attribute(attribute).is_some())
    }

    /// Position where the two stacks stop agreeing, under this stack's
    /// equivalence.
    ///
    /// `None` when the roots already differ. When one stack is a prefix of
    /// the other the shorter depth is returned.
    fn find_first_divergent_tag<S: StackView + ?Sized>(&self, other: &S) -> Option<usize> {
        let (mine, theirs) = (self.tags(), other.tags());
        let common = mine.len().min(theirs.len());
        if common == 0 {
            return Some(0);
        }
        let equivalence = self.equivalence();
        if !equivalence.equivalent(&mine[0], &theirs[0]) {
            return None;
        }
        Some(
            (1..common)
                .find(|&i| !equivalence.equivalent(&mine[i], &theirs[i]))
                .unwrap_or(common),
        )
    }

    /// Deepest tag both stacks share.
    fn deepest_common_tag<S: StackView + ?Sized>(&self, other: &S) -> Option<&Rc<Tag>> {
        match self.find_first_divergent_tag(other) {
            Some(index) if index > 0 => self.tag(index - 1),
            _ => None,
        }
    }
}

/// Mutable ancestor stack driven by a ripper.
#[derive(Clone, Debug)]
pub struct TagStack {
    tags: Vec<Rc<Tag>>,
    // Children seen so far under each stacked tag, parallel to `tags`.
    counts: Vec<u32>,
    root_count: u32,
    policy: StackPolicy,
    tables: Arc<MarkupTables>,
    key: OnceCell<String>,
}

impl TagStack {
    pub fn new(policy: StackPolicy, tables: Arc<MarkupTables>) -> Self {
        Self {
            tags: Vec::new(),
            counts: Vec::new(),
            root_count: 0,
            policy,
            tables,
            key: OnceCell::new(),
        }
    }

    pub fn html() -> Self {
        Self::new(StackPolicy::html(), Arc::new(MarkupTables::html()))
    }

    pub fn xml() -> Self {
        Self::new(StackPolicy::xml(), Arc::new(MarkupTables::xml()))
    }

    pub fn policy(&self) -> StackPolicy {
        self.policy
    }

    fn next_ordinal(&mut self) -> u32 {
        let slot = self.counts.last_mut().unwrap_or(&mut self.root_count);
        let ordinal = *slot;
        *slot += 1;
        ordinal
    }

    /// Count a non-tag child (a text run) under the current tag so later
    /// sibling tags get the same ordinals a tree would give them.
    pub fn count_child(&mut self) {
        self.next_ordinal();
    }

    fn truncate(&mut self, len: usize) -> Option<Rc<Tag>> {
        if len >= self.tags.len() {
            return None;
        }
        let popped = self.tags.drain(len..).next();
        self.counts.truncate(len);
        self.key.take();
        popped
    }

    /// Drop a self-terminating tag left on top by the previous push.
    pub fn pop_stale(&mut self) -> Option<Rc<Tag>> {
        if self.tags.last().is_some_and(|tag| tag.is_self_terminating()) {
            let len = self.tags.len() - 1;
            return self.truncate(len);
        }
        None
    }

    /// Push an opened tag and return the shared handle to it.
    ///
    /// A self-terminating tag left on top is dropped first. With HTML
    /// quirks, special-rule closing runs next, and a nested quirk tag
    /// (`font` inside `font`) is marked self-terminating and not pushed.
    /// Self-terminating tags are pushed so the unit that follows them sees
    /// them; [`TagStack::pop_stale`] or the next push removes them.
    pub fn push_tag(&mut self, mut tag: Tag) -> Rc<Tag> {
        self.pop_stale();

        if self.policy.html_quirks {
            if let Some(targets) = self.tables.special_close_targets(tag.name()) {
                let found = targets
                    .iter()
                    .find_map(|target| self.find_deepest_tag(target));
                if let Some(index) = found {
                    log::trace!(
                        target: "htmlrip.rippers",
                        "<{}> closes <{}>",
                        tag.name(),
                        self.tags[index].name()
                    );
                    self.truncate(index);
                }
            }

            if self.tables.is_nesting_quirk(tag.name()) && self.has_tag(tag.name()).is_some() {
                tag.set_self_terminating();
                tag.set_child_num(self.next_ordinal());
                return Rc::new(tag);
            }
        }

        tag.set_child_num(self.next_ordinal());
        let tag = Rc::new(tag);
        self.tags.push(Rc::clone(&tag));
        self.counts.push(0);
        self.key.take();
        tag
    }

    /// Pop through the deepest tag named `name`, returning it.
    pub fn pop_tag(&mut self, name: &str) -> RipResult<Option<Rc<Tag>>> {
        match self.find_deepest_tag(name) {
            Some(index) => Ok(self.truncate(index)),
            None => match self.policy.pop {
                PopMode::Lenient => Ok(None),
                PopMode::Strict => Err(RipError::StackMiss {
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Pop the current tag.
    pub fn pop(&mut self) -> Option<Rc<Tag>> {
        let len = self.tags.len().checked_sub(1)?;
        self.truncate(len)
    }

    pub fn clear(&mut self) {
        self.tags.clear();
        self.counts.clear();
        self.root_count = 0;
        self.key.take();
    }

    /// Freeze the current state.
    ///
    /// With `copy`, every tag is deep-copied; copies share no identity with
    /// the live stack, so the snapshot compares structurally.
    pub fn snapshot(&self, copy: bool) -> TagStackSnapshot {
        if copy {
            TagStackSnapshot::new(
                self.tags.iter().map(|tag| Rc::new(Tag::clone(tag))).collect(),
                TagEquivalence::Structural,
            )
        } else {
            TagStackSnapshot::new(self.tags.clone(), self.policy.equivalence)
        }
    }
}

impl StackView for TagStack {
    fn tags(&self) -> &[Rc<Tag>] {
        &self.tags
    }

    fn equivalence(&self) -> TagEquivalence {
        self.policy.equivalence
    }

    fn path_key(&self) -> &str {
        self.key.get_or_init(|| join_names(&self.tags))
    }
}

/// Immutable ancestry for one ripped unit, optionally carrying the tags
/// saved while reaching it.
#[derive(Clone, Debug, Default)]
pub struct TagStackSnapshot {
    tags: Vec<Rc<Tag>>,
    equivalence: TagEquivalence,
    saved: Vec<Tag>,
    key: OnceCell<String>,
}

impl TagStackSnapshot {
    pub fn new(tags: Vec<Rc<Tag>>, equivalence: TagEquivalence) -> Self {
        Self {
            tags,
            equivalence,
            saved: Vec::new(),
            key: OnceCell::new(),
        }
    }

    pub fn with_saved(mut self, saved: Vec<Tag>) -> Self {
        self.saved = saved;
        self
    }

    pub fn saved_tags(&self) -> &[Tag] {
        &self.saved
    }

    pub fn has_saved_tags(&self) -> bool {
        !self.saved.is_empty()
    }
}

impl StackView for TagStackSnapshot {
    fn tags(&self) -> &[Rc<Tag>] {
        &self.tags
    }

    fn equivalence(&self) -> TagEquivalence {
        self.equivalence
    }

    fn path_key(&self) -> &str {
        self.key.get_or_init(|| join_names(&self.tags))
    }
}

impl fmt::Display for TagStackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_key())
    }
}

impl PartialEq for TagStackSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.tags.len() == other.tags.len()
            && self.tags.iter().zip(&other.tags).all(|(a, b)| a == b)
    }
}
