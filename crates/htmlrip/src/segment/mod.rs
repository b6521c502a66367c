//! Content-block segmentation over ripped paths.
//!
//! Leaves pulled from a ripper become [`Path`]s, and consecutive paths are
//! grown greedily into [`PathGroup`]s while [`BlockComparator::belongs`]
//! holds. The first path that does not belong closes the group and seeds
//! the next one.

mod block;
mod heading;
mod path;
mod path_group;

pub use block::BlockComparator;
pub use heading::{HeadingScorer, MAX_STRENGTH, MIN_USABLE_STRENGTH, is_likely_abbreviation, is_manual_divider};
pub use path::Path;
pub use path_group::{BlockSummary, PathGroup, WordStats};

use std::io::Read;
use std::sync::Arc;

use crate::config::SegmentConfig;
use crate::error::RipResult;
use crate::rippers::{TextRipper, TextRipperOptions, UnitSource};

/// Streams content blocks from any ripper whose units convert to paths.
pub struct ContentBlockRipper<S> {
    source: S,
    comparator: BlockComparator,
    // Seeded by the path that ended the previous group.
    in_progress: Option<PathGroup>,
}

impl<S> ContentBlockRipper<S>
where
    S: UnitSource,
    S::Unit: Into<Path>,
{
    pub fn new(source: S, config: Arc<SegmentConfig>) -> Self {
        Self {
            source,
            comparator: BlockComparator::new(config),
            in_progress: None,
        }
    }

    pub fn comparator(&self) -> &BlockComparator {
        &self.comparator
    }

    /// Strongest heading among the group's paths, ignoring titles.
    pub fn group_heading_strength(&self, group: &PathGroup) -> u32 {
        self.comparator.scorer().group_strength(group)
    }

    pub fn close(&mut self) {
        self.source.close();
    }

    fn next_group(&mut self) -> Option<RipResult<PathGroup>> {
        let mut group = self.in_progress.take();
        while let Some(unit) = self.source.next_unit() {
            let path: Path = match unit {
                Ok(unit) => unit.into(),
                Err(err) => {
                    self.in_progress = group;
                    return Some(Err(err));
                }
            };
            if !path.has_text() {
                continue;
            }
            let current = group.get_or_insert_with(PathGroup::new);
            if self.comparator.belongs(&path, current) {
                current.add(path);
            } else {
                log::debug!(target: "htmlrip.segment", "block closed: {current}");
                let mut next = PathGroup::new();
                next.add(path);
                self.in_progress = Some(next);
                break;
            }
        }
        group.map(|mut group| {
            group.terminate();
            Ok(group)
        })
    }
}

impl<R: Read> ContentBlockRipper<TextRipper<R>> {
    /// Segment an HTML document with the default tables.
    pub fn html(reader: R) -> Self {
        Self::html_with(reader, Arc::new(SegmentConfig::html()))
    }

    pub fn html_with(reader: R, config: Arc<SegmentConfig>) -> Self {
        let options = TextRipperOptions {
            keep_empties: false,
            ignore_tags: config.ignore_tags.clone(),
            save_tags: config.save_tags.clone(),
            copy_snapshots: false,
        };
        Self::new(TextRipper::html_with(reader, options), config)
    }
}

impl<S> Iterator for ContentBlockRipper<S>
where
    S: UnitSource,
    S::Unit: Into<Path>,
{
    type Item = RipResult<PathGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_group()
    }
}
