use std::sync::Arc;

use crate::config::SegmentConfig;
use crate::segment::heading::HeadingScorer;
use crate::segment::path::Path;
use crate::segment::path_group::PathGroup;

/// Decides whether a path continues a group.
///
/// Two signals are combined. Block alignment: the path must sit in the same
/// block container as the group's last path. Heading strength: unless the
/// two paths are inline with each other, a path that looks more like a
/// heading than the group does starts a new group regardless of alignment.
#[derive(Clone, Debug)]
pub struct BlockComparator {
    config: Arc<SegmentConfig>,
    scorer: HeadingScorer,
}

impl BlockComparator {
    pub fn new(config: Arc<SegmentConfig>) -> Self {
        Self {
            scorer: HeadingScorer::new(Arc::clone(&config)),
            config,
        }
    }

    pub fn scorer(&self) -> &HeadingScorer {
        &self.scorer
    }

    pub fn belongs(&self, path: &Path, group: &PathGroup) -> bool {
        let Some(last) = group.last_path(true) else {
            return true;
        };

        let aligned = self.block_aligned(path, last, group);

        if self.inline_paths(last, path) {
            return aligned;
        }
        if self.scorer.path_strength(path) > self.scorer.group_strength(group) {
            log::trace!(target: "htmlrip.segment", "stronger heading splits at '{}'", path.text());
            return false;
        }
        aligned
    }

    // Same block container: the last path's deepest block tag lies within
    // the shared part of the two stacks, or neither path has a block tag.
    fn block_aligned(&self, path: &Path, last: &Path, group: &PathGroup) -> bool {
        let Some(common) = group.compute_common_path_index(path) else {
            return false;
        };
        match last.last_index_of_tag(&self.config.block_tags) {
            None => path.index_of_tag(&self.config.block_tags).is_none(),
            Some(block) => block <= common,
        }
    }

    /// Whether the two paths share their block containers; a break always
    /// ends an inline run.
    pub fn inline_paths(&self, first: &Path, second: &Path) -> bool {
        first.is_inline(second, &self.config)
            && second.is_inline(first, &self.config)
            && !first.is_break(&self.config)
    }
}
