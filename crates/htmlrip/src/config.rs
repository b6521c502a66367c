//! Immutable lookup tables injected into the lexer, tree builder, tag stacks
//! and segmentation layer.
//!
//! Tables are plain data: built once (from the defaults or a TOML document)
//! and shared behind an `Arc`. Nothing here is mutated after construction.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::RipResult;

const OPTIONAL_END_TAGS: &[&str] = &["br", "dir", "hr", "img", "meta", "input", "option", "link"];

// Opening the key closes the nearest open ancestor named by the first
// listed name that is found.
const SPECIAL_RULE_END_TAGS: &[(&str, &[&str])] = &[
    ("p", &["p"]),
    ("li", &["li"]),
    ("ul", &["li"]),
    ("ol", &["li"]),
    ("menu", &["li"]),
    ("dt", &["dd", "dt"]),
    ("dd", &["dt", "dd"]),
    ("dl", &["dd", "dt"]),
];

const NESTING_QUIRK_TAGS: &[&str] = &["font"];

pub const DEFAULT_IGNORE_TAGS: &[&str] = &[
    "style", "script", "select", "input", "option", "optgroup", "textarea", "button", "iframe",
];

pub const DEFAULT_BLOCK_TAGS: &[&str] = &[
    "address",
    "blockquote",
    "dir",
    "div",
    "dl",
    "fieldset",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "isindex",
    "menu",
    "noframes",
    "noscript",
    "ol",
    "pre",
    "table",
    "ul",
    "html",
    "head",
    "body",
    "frameset",
];

pub const DEFAULT_INLINE_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "basefont", "bdo", "big", "br", "cite", "code", "dfn", "em",
    "font", "i", "img", "input", "kbd", "label", "q", "s", "samp", "select", "small", "span",
    "strike", "strong", "sub", "sup", "textarea", "tt", "u", "var", "nobr",
];

pub const INLINE_BREAK_TAGS: &[&str] = &["br", "hr"];

const CUMULATIVE_HEADING_TAGS: &[&str] = &["em", "b", "strong", "i", "a"];

// Heading values (tag names, or attribute values reached through
// `strength_attributes`) mapped to a strength in 0..=7.
const GRADED_HEADING_STRENGTHS: &[(&str, u8)] = &[
    ("title", 7),
    ("h1", 6),
    ("h2", 5),
    ("h3", 4),
    ("h4", 3),
    ("h5", 2),
    ("h6", 1),
    ("hr", 6),
    ("200%", 6),
    ("150%", 5),
    ("120%", 4),
    ("100%", 0),
    ("80%", 3),
    ("70%", 2),
    ("60%", 1),
    ("+3", 6),
    ("+2", 5),
    ("+1", 4),
    ("1", 0),
    ("-1", 0),
    ("-2", 0),
    ("7", 4),
    ("6", 3),
    ("5", 2),
    ("4", 1),
    ("3", 0),
    ("2", 0),
    ("thead", 0),
    ("th", 0),
    ("em", 0),
    ("i", 0),
    ("strong", 0),
    ("b", 0),
    ("a", 0),
];

// Emphasis variant: inline emphasis and table headers count as weak headings.
const EMPHASIS_HEADING_OVERRIDES: &[(&str, u8)] = &[
    ("thead", 2),
    ("th", 1),
    ("em", 1),
    ("i", 1),
    ("strong", 1),
    ("b", 1),
    ("a", 1),
];

fn set_of(names: &[&str]) -> HashSet<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

/// Tag-nesting quirks applied by the tree builder and the HTML stack flavor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupTables {
    /// Tags that never take children; they are self-terminating on open.
    pub optional_end_tags: HashSet<String>,
    /// Opening a key tag implicitly closes an open ancestor named in its list.
    pub special_rule_end_tags: HashMap<String, Vec<String>>,
    /// Tags that become self-terminating when opened under a same-named
    /// ancestor.
    pub nesting_quirk_tags: HashSet<String>,
}

impl MarkupTables {
    pub fn html() -> Self {
        Self {
            optional_end_tags: set_of(OPTIONAL_END_TAGS),
            special_rule_end_tags: SPECIAL_RULE_END_TAGS
                .iter()
                .map(|(key, closes)| {
                    (
                        (*key).to_string(),
                        closes.iter().map(|name| (*name).to_string()).collect(),
                    )
                })
                .collect(),
            nesting_quirk_tags: set_of(NESTING_QUIRK_TAGS),
        }
    }

    /// No quirks at all: every tag nests until its end tag.
    pub fn xml() -> Self {
        Self {
            optional_end_tags: HashSet::new(),
            special_rule_end_tags: HashMap::new(),
            nesting_quirk_tags: HashSet::new(),
        }
    }

    pub fn from_toml_str(source: &str) -> RipResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn is_optional_end_tag(&self, name: &str) -> bool {
        self.optional_end_tags.contains(name)
            || (name.bytes().any(|b| b.is_ascii_uppercase())
                && self
                    .optional_end_tags
                    .contains(name.to_ascii_lowercase().as_str()))
    }

    pub fn is_special_rule_end_tag(&self, name: &str) -> bool {
        self.special_rule_end_tags.contains_key(name)
    }

    /// Names searched, in order, for the ancestor to close when `name` opens.
    pub fn special_close_targets(&self, name: &str) -> Option<&[String]> {
        self.special_rule_end_tags.get(name).map(Vec::as_slice)
    }

    pub fn is_nesting_quirk(&self, name: &str) -> bool {
        self.nesting_quirk_tags.contains(name)
    }
}

impl Default for MarkupTables {
    fn default() -> Self {
        Self::html()
    }
}

/// Tables driving content-block segmentation and heading strength.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub block_tags: HashSet<String>,
    pub inline_tags: HashSet<String>,
    pub inline_break_tags: HashSet<String>,
    /// Text found under these tags is never ripped.
    pub ignore_tags: HashSet<String>,
    /// Tags collected while ripping (e.g. `meta` out of `head`).
    pub save_tags: HashSet<String>,
    pub heading_strengths: HashMap<String, u8>,
    /// Tags whose strength is looked up through an attribute value instead
    /// of the tag name (`font` -> `size`).
    pub strength_attributes: HashMap<String, String>,
    /// Tags whose strengths add up along a stack instead of taking the max.
    pub cumulative_tags: HashSet<String>,
    /// Score short capitalized lines as weak headings.
    pub use_capitalization: bool,
}

impl SegmentConfig {
    pub fn html() -> Self {
        Self {
            block_tags: set_of(DEFAULT_BLOCK_TAGS),
            inline_tags: set_of(DEFAULT_INLINE_TAGS),
            inline_break_tags: set_of(INLINE_BREAK_TAGS),
            ignore_tags: set_of(DEFAULT_IGNORE_TAGS),
            save_tags: set_of(&["meta"]),
            heading_strengths: GRADED_HEADING_STRENGTHS
                .iter()
                .map(|(value, strength)| ((*value).to_string(), *strength))
                .collect(),
            strength_attributes: HashMap::from([("font".to_string(), "size".to_string())]),
            cumulative_tags: set_of(CUMULATIVE_HEADING_TAGS),
            use_capitalization: true,
        }
    }

    /// Like [`SegmentConfig::html`], but emphasis and table header tags
    /// carry a small heading strength of their own.
    pub fn html_with_emphasis() -> Self {
        let mut config = Self::html();
        for (value, strength) in EMPHASIS_HEADING_OVERRIDES {
            config.heading_strengths.insert((*value).to_string(), *strength);
        }
        config
    }

    pub fn from_toml_str(source: &str) -> RipResult<Self> {
        Ok(toml::from_str(source)?)
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self::html()
    }
}
