//! Heading strength: how likely a path is to be a heading, from its tags
//! and, failing that, from the shape of its text.

use std::sync::Arc;

use crate::config::SegmentConfig;
use crate::leaves::dive_for_text;
use crate::segment::path::Path;
use crate::segment::path_group::PathGroup;
use crate::tag_stack::StackView;
use crate::tree::Tree;
use crate::types::{NodeId, Tag};

/// Strength of a document title; never counted toward a group's heading.
pub const MAX_STRENGTH: u32 = 7;
pub const MIN_USABLE_STRENGTH: u32 = 1;

const ALL_CAPS_STRENGTH: u32 = 2;
const TITLE_CASE_STRENGTH: u32 = 1;
const TITLE_MAX_WORDS: usize = 10;

#[derive(Clone, Debug)]
pub struct HeadingScorer {
    config: Arc<SegmentConfig>,
}

impl HeadingScorer {
    pub fn new(config: Arc<SegmentConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Strength of a single tag, looked up by name or, for tags such as
    /// `font`, by the value of their strength attribute.
    pub fn tag_strength(&self, tag: &Tag) -> u32 {
        let value = match self.config.strength_attributes.get(tag.name()) {
            Some(attribute) => tag.attribute(attribute),
            None => Some(tag.name()),
        };
        value
            .and_then(|value| self.config.heading_strengths.get(value))
            .map_or(0, |&strength| u32::from(strength))
    }

    /// Strongest tag on the stack. With `cumulative`, the strengths of the
    /// cumulative tags (emphasis, links) are summed on top instead.
    pub fn stack_strength<S: StackView + ?Sized>(&self, stack: &S, cumulative: bool) -> u32 {
        let mut strongest = 0;
        let mut summed = 0;
        for tag in stack.tags() {
            let strength = self.tag_strength(tag);
            if cumulative && self.config.cumulative_tags.contains(tag.name()) {
                summed += strength;
            } else {
                strongest = strongest.max(strength);
            }
        }
        if cumulative { strongest + summed } else { strongest }
    }

    /// Strength of a candidate path: its tags, emphasis summed on top, or
    /// the shape of its text when the tags say nothing and capitalization
    /// is in use.
    pub fn path_strength(&self, path: &Path) -> u32 {
        let strength = self.stack_strength(path.tags(), true);
        if strength == 0 && self.config.use_capitalization {
            self.text_strength(path.text())
        } else {
            strength
        }
    }

    /// Heading strength of a whole group: its strongest path, skipping
    /// title-strength paths.
    pub fn group_strength(&self, group: &PathGroup) -> u32 {
        group
            .paths()
            .iter()
            .map(|path| self.path_strength(path))
            .filter(|&strength| strength != MAX_STRENGTH)
            .max()
            .unwrap_or(0)
    }

    /// Strength suggested by the text alone.
    pub fn text_strength(&self, text: &str) -> u32 {
        if is_manual_divider(text) {
            self.divider_strength()
        } else if self.is_all_caps_prefix(text) {
            ALL_CAPS_STRENGTH
        } else if is_title_line(text) {
            TITLE_CASE_STRENGTH
        } else {
            0
        }
    }

    /// Whether the first word of 3+ characters is written in capitals and
    /// is not merely an abbreviation.
    pub fn is_all_caps_prefix(&self, text: &str) -> bool {
        if !self.config.use_capitalization {
            return false;
        }
        match words(text).find(|word| word.chars().count() >= 3) {
            Some(word) => {
                (word.chars().count() > 4 || !is_likely_abbreviation(word)) && all_caps(word)
            }
            None => false,
        }
    }

    pub fn node_strength(&self, tree: &Tree, node: NodeId) -> u32 {
        tree.tag(node).map_or(0, |tag| self.tag_strength(tag))
    }

    /// Strongest tag from `deep` up to and including `shallow`.
    pub fn strength_between(&self, tree: &Tree, deep: NodeId, shallow: NodeId) -> u32 {
        let mut strongest = 0;
        let mut cur = Some(deep);
        while let Some(node) = cur {
            strongest = strongest.max(self.node_strength(tree, node));
            if node == shallow {
                break;
            }
            cur = tree.parent(node);
        }
        strongest
    }

    /// Divider strength when the text under `node` is a run of dashes or
    /// underscores, else 0.
    pub fn manual_strength(&self, tree: &Tree, node: NodeId) -> u32 {
        match dive_for_text(tree, node) {
            Some(text) if is_manual_divider(text) => self.divider_strength(),
            _ => 0,
        }
    }

    fn divider_strength(&self) -> u32 {
        self.config
            .heading_strengths
            .get("hr")
            .map_or(0, |&strength| u32::from(strength))
    }
}

/// Text opening with at least four `-` or `_`.
pub fn is_manual_divider(text: &str) -> bool {
    text.chars().count() > 3 && text.chars().take(4).all(|c| c == '-' || c == '_')
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.'))
        .filter(|word| !word.is_empty())
}

fn all_caps(word: &str) -> bool {
    let mut saw_letter = false;
    for c in word.chars().filter(|c| c.is_alphabetic()) {
        if !c.is_uppercase() {
            return false;
        }
        saw_letter = true;
    }
    saw_letter
}

// A short line whose significant words are capitalized, not ending like a
// sentence.
fn is_title_line(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || text.ends_with('.') {
        return false;
    }
    let words: Vec<&str> = words(text).collect();
    if words.is_empty() || words.len() > TITLE_MAX_WORDS {
        return false;
    }
    let capitalized = |word: &str| word.chars().next().is_some_and(|c| !c.is_lowercase());
    capitalized(words[0])
        && words
            .iter()
            .filter(|word| word.chars().count() > 3)
            .all(|word| capitalized(word))
}

fn is_vowel(c: char) -> bool {
    matches!(
        c,
        'a' | 'e' | 'i' | 'o' | 'u' | 'y'
            | 'A' | 'E' | 'I' | 'O' | 'U' | 'Y'
            | 'ä' | 'ë' | 'ï' | 'ö' | 'ü' | 'ÿ'
            | 'Ä' | 'Ë' | 'Ï' | 'Ö' | 'Ü'
            | 'á' | 'é' | 'í' | 'ó' | 'ú' | 'ý'
            | 'Á' | 'É' | 'Í' | 'Ó' | 'Ú' | 'Ý'
            | 'À' | 'È' | 'Ì' | 'Ò' | 'Ù'
            | 'ã' | 'õ' | 'Ã' | 'Õ'
    )
}

// Consonants that may follow another consonant without counting toward a
// cluster.
fn is_grouping_consonant(c: char) -> bool {
    matches!(c, 's' | 'c' | 'l' | 'r' | 'm' | 'n')
}

/// Whether `word` reads like an abbreviation: it has a period, no vowel,
/// or a run of three consonants that do not group naturally.
pub fn is_likely_abbreviation(word: &str) -> bool {
    if word.contains('.') {
        return true;
    }
    let mut saw_vowel = false;
    let mut last: Option<char> = None;
    let mut run = 0;
    for c in word.chars() {
        if !c.is_alphanumeric() {
            last = None;
            run = 0;
        } else if is_vowel(c) {
            saw_vowel = true;
            run = 0;
        } else if c != 'h' {
            if last == Some(c) {
                last = None;
            } else if run == 0 || last.is_none_or(|prev| !is_grouping_consonant(prev)) {
                last = Some(c);
                run += 1;
                if run >= 3 {
                    return true;
                }
            }
        }
    }
    !saw_vowel
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::tag_stack::{TagEquivalence, TagStackSnapshot};

    fn scorer() -> HeadingScorer {
        HeadingScorer::new(Arc::new(SegmentConfig::html()))
    }

    fn path(text: &str, names: &[&str]) -> Path {
        let tags = names.iter().map(|name| Rc::new(Tag::new(*name, true))).collect();
        Path::new(text, TagStackSnapshot::new(tags, TagEquivalence::Identity))
    }

    #[test]
    fn tag_strengths_use_attribute_indirection() {
        let scorer = scorer();
        assert_eq!(scorer.tag_strength(&Tag::new("h1", true)), 6);
        assert_eq!(scorer.tag_strength(&Tag::new("p", true)), 0);
        let mut font = Tag::new("font", true);
        assert_eq!(scorer.tag_strength(&font), 0);
        font.set_attribute("size", "+2");
        assert_eq!(scorer.tag_strength(&font), 5);
    }

    #[test]
    fn cumulative_tags_add_up() {
        let config = SegmentConfig::html_with_emphasis();
        let scorer = HeadingScorer::new(Arc::new(config));
        let p = path("x", &["body", "h6", "b", "i"]);
        assert_eq!(scorer.stack_strength(p.tags(), false), 1);
        assert_eq!(scorer.stack_strength(p.tags(), true), 3);
    }

    #[test]
    fn text_shapes() {
        let scorer = scorer();
        assert_eq!(scorer.text_strength("-----"), 6);
        assert_eq!(scorer.text_strength("__--"), 6);
        assert_eq!(scorer.text_strength("---"), 0);
        assert_eq!(scorer.text_strength("CHAPTER one"), 2);
        assert_eq!(scorer.text_strength("Getting Started With Rust"), 1);
        assert_eq!(scorer.text_strength("This is a sentence."), 0);
        assert_eq!(scorer.text_strength("plain lowercase words"), 0);
    }

    #[test]
    fn all_caps_prefix_skips_short_words_and_abbreviations() {
        let scorer = scorer();
        assert!(scorer.is_all_caps_prefix("A NOTICE to readers"));
        assert!(!scorer.is_all_caps_prefix("an Notice"));
        assert!(!scorer.is_all_caps_prefix("NBC news tonight"));
        assert!(scorer.is_all_caps_prefix("HEADLINE parsing"));
        assert!(!scorer.is_all_caps_prefix("HTML parsing"));
        let mut config = SegmentConfig::html();
        config.use_capitalization = false;
        assert!(!HeadingScorer::new(Arc::new(config)).is_all_caps_prefix("NOTICE"));
    }

    #[test]
    fn abbreviations() {
        assert!(is_likely_abbreviation("U.S"));
        assert!(is_likely_abbreviation("NBC"));
        assert!(is_likely_abbreviation("txt"));
        assert!(!is_likely_abbreviation("cat"));
        assert!(!is_likely_abbreviation("string"));
        assert!(!is_likely_abbreviation("school"));
    }

    #[test]
    fn path_strength_falls_back_to_text() {
        let scorer = scorer();
        assert_eq!(scorer.path_strength(&path("whatever", &["body", "h2"])), 5);
        assert_eq!(scorer.path_strength(&path("Big News", &["body", "p"])), 1);
        assert_eq!(scorer.path_strength(&path("small talk", &["body", "p"])), 0);
    }

    #[test]
    fn group_strength_ignores_titles() {
        let scorer = scorer();
        let mut group = PathGroup::new();
        group.add(path("Page", &["html", "head", "title"]));
        group.add(path("Section", &["html", "body", "h3"]));
        assert_eq!(scorer.group_strength(&group), 4);
    }

    #[test]
    fn group_scores_its_paths_like_a_single_path() {
        let scorer = HeadingScorer::new(Arc::new(SegmentConfig::html_with_emphasis()));
        for candidate in [
            path("x", &["body", "h6", "b", "i"]),
            path("Big News", &["body", "p"]),
            path("CHAPTER one", &["body", "div"]),
            path("small talk", &["body", "p"]),
        ] {
            let mut group = PathGroup::new();
            group.add(candidate.clone());
            assert_eq!(scorer.group_strength(&group), scorer.path_strength(&candidate));
        }
        assert_eq!(scorer.path_strength(&path("x", &["body", "h6", "b", "i"])), 3);
    }

    #[test]
    fn tree_strengths() {
        use crate::builder::TreeBuilder;
        use crate::input::MarkupInput;
        let tree = TreeBuilder::html()
            .parse(&mut MarkupInput::new(&b"<div><h2><b>Head</b></h2><p>-----</p></div>"[..]))
            .unwrap()
            .unwrap();
        let root = tree.root();
        let h2 = tree.children(root)[0];
        let b = tree.children(h2)[0];
        let p = tree.children(root)[1];
        let scorer = scorer();
        assert_eq!(scorer.strength_between(&tree, b, root), 5);
        assert_eq!(scorer.strength_between(&tree, b, b), 0);
        assert_eq!(scorer.manual_strength(&tree, p), 6);
        assert_eq!(scorer.manual_strength(&tree, h2), 0);
    }
}
