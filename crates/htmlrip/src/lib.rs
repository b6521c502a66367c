pub mod builder;
pub mod config;
pub mod entities;
pub mod error;
pub mod input;
pub mod leaves;
pub mod lexer;
pub mod rippers;
pub mod segment;
pub mod serialize;
pub mod tag_stack;
pub mod tree;
pub mod types;

#[cfg(test)]
mod streaming_parity;

pub use builder::{Applied, Boundary, TreeBuilder};
pub use config::{MarkupTables, SegmentConfig};
pub use entities::{decode_entities, hypertrim};
pub use error::{RipError, RipResult};
pub use input::MarkupInput;
pub use leaves::{all_text, dive_for_text, gather_leaves};
pub use lexer::{LexerOptions, TagEvent, TagLexer};
pub use rippers::{
    DataRipper, DataUnit, NodeRipper, NodeUnit, RippedUnit, TagRipper, TagUnit, TextRipper,
    TextRipperOptions, TextUnit, UnitSource,
};
pub use segment::{
    BlockComparator, BlockSummary, ContentBlockRipper, HeadingScorer, Path, PathGroup, WordStats,
};
pub use serialize::{XML_HEADER, as_xml, as_xml_all};
pub use tag_stack::{PopMode, StackPolicy, StackView, TagEquivalence, TagStack, TagStackSnapshot};
pub use tree::Tree;
pub use types::{Comment, Data, NodeId, Script, Style, Tag, Text};

use memchr::memmem;

/// Parse a complete HTML document held in memory.
pub fn parse_html_str(source: &str) -> RipResult<Option<Tree>> {
    TreeBuilder::html().parse(&mut MarkupInput::new(source.as_bytes()))
}

/// Parse a complete XML document held in memory, preserving case.
pub fn parse_xml_str(source: &str) -> RipResult<Option<Tree>> {
    TreeBuilder::xml().parse(&mut MarkupInput::new(source.as_bytes()))
}

/// Whether a `Content-Type` value names a markup format this crate reads.
pub fn is_markup(content_type: Option<&str>) -> bool {
    let Some(value) = content_type else {
        return false;
    };
    let lower = value.to_ascii_lowercase();
    ["text/html", "application/xhtml", "text/xml", "application/xml", "+xml"]
        .iter()
        .any(|needle| memmem::find(lower.as_bytes(), needle.as_bytes()).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_content_types() {
        assert!(is_markup(Some("text/html; charset=utf-8")));
        assert!(is_markup(Some("Application/XHTML+xml")));
        assert!(is_markup(Some("image/svg+xml")));
        assert!(!is_markup(Some("text/plain")));
        assert!(!is_markup(None));
    }

    #[test]
    fn string_helpers_parse_both_modes() {
        let tree = parse_html_str("<P>Hi</P>").unwrap().unwrap();
        assert_eq!(as_xml(&tree, tree.root(), false), "<p>Hi</p>\n");
        let tree = parse_xml_str("<Doc><Item/></Doc>").unwrap().unwrap();
        assert_eq!(as_xml(&tree, tree.root(), false), "<Doc><Item/></Doc>\n");
        assert!(parse_html_str("").unwrap().is_none());
    }
}
