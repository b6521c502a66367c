use std::rc::Rc;

use crate::error::RipResult;
use crate::rippers::{RippedUnit, UnitSource};
use crate::tag_stack::{StackView, TagStackSnapshot};
use crate::types::Tag;

/// A ripped unit paired with the block it starts or continues.
#[derive(Clone, Debug)]
pub struct DataUnit<U> {
    pub unit: U,
    /// Tag at `block_index` in the unit's stack, if the stack is that deep.
    pub block_tag: Option<Rc<Tag>>,
    /// Index of the first tag this unit does not share with the previous
    /// unit, clamped to the deepest tag.
    pub block_index: usize,
}

impl<U: RippedUnit> RippedUnit for DataUnit<U> {
    fn tags(&self) -> &TagStackSnapshot {
        self.unit.tags()
    }

    fn encoding_error(&self) -> bool {
        self.unit.encoding_error()
    }
}

/// Annotates each unit of an inner ripper with the tag where its ancestry
/// departs from the previous unit's.
pub struct DataRipper<S: UnitSource> {
    source: S,
    previous: Option<TagStackSnapshot>,
}

impl<S: UnitSource> DataRipper<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            previous: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn annotate(&mut self, unit: S::Unit) -> DataUnit<S::Unit> {
        let tags = unit.tags();
        let block_index = match &self.previous {
            None => 0,
            Some(previous) => match tags.find_first_divergent_tag(previous) {
                None => 0,
                Some(index) => index.min(tags.depth().saturating_sub(1)),
            },
        };
        let block_tag = tags.tag(block_index).cloned();
        self.previous = Some(tags.clone());
        DataUnit {
            unit,
            block_tag,
            block_index,
        }
    }
}

impl<S: UnitSource> UnitSource for DataRipper<S> {
    type Unit = DataUnit<S::Unit>;

    fn next_unit(&mut self) -> Option<RipResult<Self::Unit>> {
        match self.source.next_unit()? {
            Ok(unit) => Some(Ok(self.annotate(unit))),
            Err(err) => Some(Err(err)),
        }
    }

    fn index(&self) -> Option<usize> {
        self.source.index()
    }

    fn close(&mut self) {
        self.source.close();
    }
}

impl<S: UnitSource> Iterator for DataRipper<S> {
    type Item = RipResult<DataUnit<S::Unit>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rippers::TextRipper;

    fn blocks(html: &str) -> Vec<(String, usize, Option<String>)> {
        DataRipper::new(TextRipper::html(html.as_bytes()))
            .map(|unit| {
                let unit = unit.unwrap();
                (
                    unit.unit.text.clone(),
                    unit.block_index,
                    unit.block_tag.map(|tag| tag.name().to_string()),
                )
            })
            .collect()
    }

    #[test]
    fn block_tag_is_where_ancestry_departs() {
        let got = blocks("<body><div><p>a</p><p>b</p></div><table><tr><td>c</td></tr></table></body>");
        assert_eq!(
            got,
            vec![
                ("a".to_string(), 0, Some("body".to_string())),
                ("b".to_string(), 2, Some("p".to_string())),
                ("c".to_string(), 1, Some("table".to_string())),
            ]
        );
    }

    #[test]
    fn shared_stack_clamps_to_deepest_tag() {
        let got = blocks("<div>one<b>bold</b>three</div>");
        assert_eq!(got[0].1, 0);
        // One stack is a prefix of the other: the shorter depth, clamped
        // into the unit's own stack.
        assert_eq!(got[1], ("bold".to_string(), 1, Some("b".to_string())));
        assert_eq!(got[2], ("three".to_string(), 0, Some("div".to_string())));
    }

    #[test]
    fn unrelated_roots_restart_at_zero() {
        let got = blocks("<p>a</p><div>b</div>");
        assert_eq!(got[1], ("b".to_string(), 0, Some("div".to_string())));
    }
}
