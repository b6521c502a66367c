use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::segment::path::{Path, word_count};
use crate::tag_stack::StackView;

/// Running word-count statistics over a group's paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct WordStats {
    pub n: usize,
    pub sum: usize,
    pub min: usize,
    pub max: usize,
}

impl WordStats {
    pub fn add(&mut self, count: usize) {
        if self.n == 0 {
            self.min = count;
            self.max = count;
        } else {
            self.min = self.min.min(count);
            self.max = self.max.max(count);
        }
        self.n += 1;
        self.sum += count;
    }

    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.sum as f64 / self.n as f64
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Serializable digest of a finished group.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockSummary {
    pub paths: usize,
    pub common_path: Option<String>,
    pub text: String,
    pub words: WordStats,
}

/// A run of paths judged to form one content block.
#[derive(Clone, Debug, Default)]
pub struct PathGroup {
    paths: Vec<Path>,
    common_path_index: Option<usize>,
    text: String,
    word_counts: WordStats,
    terminated: bool,
}

impl PathGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Deepest stack index shared by every path in the group.
    pub fn common_path_index(&self) -> Option<usize> {
        self.common_path_index
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn add(&mut self, path: Path) {
        let index = self.compute_common_path_index(&path);
        self.track_common(index);
        self.add_text(&path);
        self.paths.push(path);
    }

    // Once the common index has been lost it restarts from the next path.
    fn track_common(&mut self, index: Option<usize>) {
        self.common_path_index = match (self.common_path_index, index) {
            (Some(current), Some(index)) => Some(current.min(index)),
            (Some(_), None) => None,
            (None, index) => index,
        };
    }

    /// Deepest index `path` would share with the group's last path: one
    /// before their divergence point. For an empty group, the path's own
    /// deepest index.
    pub fn compute_common_path_index(&self, path: &Path) -> Option<usize> {
        match self.last_path(true) {
            None => path.tags().depth().checked_sub(1),
            Some(last) => last
                .tags()
                .find_first_divergent_tag(path.tags())
                .and_then(|divergence| divergence.checked_sub(1)),
        }
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn first_path(&self) -> Option<&Path> {
        self.paths.first()
    }

    /// The last path, or the last one with text when `include_empties` is
    /// false.
    pub fn last_path(&self, include_empties: bool) -> Option<&Path> {
        self.paths
            .iter()
            .rev()
            .find(|path| include_empties || path.has_text())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.paths.iter().any(|path| path.tags().has_tag(name).is_some())
    }

    pub fn has_any_tag(&self, names: &HashSet<String>) -> bool {
        self.paths
            .iter()
            .any(|path| path.tags().has_any_tag(names).is_some())
    }

    /// Mean words per path with text.
    pub fn bulk(&self) -> f64 {
        self.word_counts.mean()
    }

    pub fn word_counts(&self) -> &WordStats {
        &self.word_counts
    }

    /// Recompute text, statistics and the common index from the paths.
    pub fn rebuild_text(&mut self) {
        let paths = std::mem::take(&mut self.paths);
        self.text.clear();
        self.word_counts.clear();
        self.common_path_index = None;
        for path in paths {
            self.add(path);
        }
    }

    /// The shared ancestry as a key, optionally with child ordinals, or
    /// `<empty>` when the paths share nothing.
    pub fn common_path_string(&self, with_ordinals: bool) -> String {
        match (self.common_path_index, self.first_path()) {
            (Some(index), Some(first)) if with_ordinals => {
                first.tags().path_key_with_ordinals(index + 1)
            }
            (Some(index), Some(first)) => first.key_to(index + 1),
            _ => "<empty>".to_string(),
        }
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            paths: self.paths.len(),
            common_path: self.common_path_index.map(|_| self.common_path_string(false)),
            text: self.text.clone(),
            words: self.word_counts,
        }
    }

    fn add_text(&mut self, path: &Path) {
        if !path.has_text() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(path.text());
        self.word_counts.add(word_count(path.text()));
    }
}

impl fmt::Display for PathGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})={}",
            self.common_path_string(true),
            self.paths.len(),
            self.text
        )
    }
}
