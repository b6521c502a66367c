//! Forward-only streaming rippers.
//!
//! Each ripper owns one [`MarkupInput`](crate::MarkupInput) and a
//! [`TagStack`](crate::TagStack) and yields one unit per step without ever
//! materializing the whole document. Every unit carries a frozen snapshot
//! of its ancestor tags, taken when the unit was read, so looking ahead with
//! `has_next` never changes what an already returned unit reports.
//!
//! The input is released on `close()`, when the stream is exhausted, after
//! an I/O error, and on drop.

mod data;
mod node;
mod tag;
mod text;

pub use data::{DataRipper, DataUnit};
pub use node::{NodeRipper, NodeUnit};
pub use tag::{TagRipper, TagUnit};
pub use text::{TextRipper, TextRipperOptions, TextUnit};

use crate::error::RipResult;
use crate::tag_stack::{TagStack, TagStackSnapshot};

/// A unit produced by a ripper.
pub trait RippedUnit {
    /// Ancestor tags at the point the unit was read.
    fn tags(&self) -> &TagStackSnapshot;

    /// Whether invalid input bytes were replaced while reading this unit.
    fn encoding_error(&self) -> bool;
}

/// Pull-based source of ripped units.
pub trait UnitSource {
    type Unit: RippedUnit;

    fn next_unit(&mut self) -> Option<RipResult<Self::Unit>>;

    /// 0-based ordinal of the unit most recently returned.
    fn index(&self) -> Option<usize>;

    fn close(&mut self);
}

// Pop an end tag, logging rather than failing on a miss so malformed input
// never aborts a rip.
pub(crate) fn pop_logged(stack: &mut TagStack, name: &str) {
    match stack.pop_tag(name) {
        Ok(Some(_)) => {}
        Ok(None) => {
            log::debug!(target: "htmlrip.rippers", "end tag </{name}> matched no open tag");
        }
        Err(err) => log::debug!(target: "htmlrip.rippers", "{err}"),
    }
}

pub(crate) fn bump(index: &mut Option<usize>) {
    *index = Some(index.map_or(0, |i| i + 1));
}
