//! Catalog retrieval and reconstruction.
//!
//! - [`fetch`] - Concurrent retrieval of the four level endpoints
//! - [`normalize`] - Raw JSON records to [`Node`] values
//! - [`hierarchy`] - Parent-reference linking into a Person-rooted tree
//! - [`flatten`] - Tree (or page list) to flat rows

pub mod fetch;
pub mod flatten;
pub mod hierarchy;
pub mod normalize;

pub use fetch::NodeFetcher;
pub use flatten::{PageRow, flatten, select_flat_pages};
pub use hierarchy::{Hierarchy, HierarchyStats, build_hierarchy};
pub use normalize::{NormalizedLevel, normalize_document};

use crate::types::{Level, Node};

/// The four level collections of one fetch cycle, each in source order
///
/// Ids are expected to be unique within a level; [`normalize_document`] enforces this
/// for fetched data.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    levels: [Vec<Node>; 4],
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from per-level node lists
    pub fn from_levels(
        persons: Vec<Node>,
        letters: Vec<Node>,
        sheets: Vec<Node>,
        pages: Vec<Node>,
    ) -> Self {
        Self {
            levels: [persons, letters, sheets, pages],
        }
    }

    /// Replace one level's nodes
    pub fn set_level(&mut self, level: Level, nodes: Vec<Node>) {
        self.levels[level.index()] = nodes;
    }

    /// Nodes of one level
    pub fn level(&self, level: Level) -> &[Node] {
        &self.levels[level.index()]
    }

    /// Total nodes across all levels
    pub fn total_nodes(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub(crate) fn into_levels(self) -> [Vec<Node>; 4] {
        self.levels
    }
}
