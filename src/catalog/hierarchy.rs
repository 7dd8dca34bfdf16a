//! Parent-reference linking of the four levels into Person-rooted trees.
//!
//! Each level below Person is indexed once by parent id (arena + index), then the
//! tree is assembled top-down. A node whose parent reference does not resolve one
//! level up is an orphan: it is left out, counted, and never attached elsewhere.
//! Descendants of an orphan are unreachable and are counted as detached.

use super::Catalog;
use super::flatten::{PageRow, flatten};
use crate::error::OrphanReferenceError;
use crate::types::{HierarchyNode, Level, Node, NodeId};
use std::collections::{HashMap, HashSet};

/// Node counts describing how much of a catalog made it into the tree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HierarchyStats {
    /// Nodes across all four levels
    pub total_nodes: usize,
    /// Nodes reachable from a Person root (roots included)
    pub attached_nodes: usize,
    /// Nodes whose own parent reference did not resolve
    pub orphaned: usize,
    /// Nodes whose parent resolved but sits below an orphan
    pub detached: usize,
}

impl HierarchyStats {
    /// Every node left out of the tree: `total_nodes - attached_nodes`
    pub fn orphan_count(&self) -> usize {
        self.total_nodes - self.attached_nodes
    }
}

/// The reconstructed catalog; immutable once built
#[derive(Clone, Debug, Default)]
pub struct Hierarchy {
    /// One root per Person, in source order
    pub roots: Vec<HierarchyNode>,
    /// Nodes excluded because their parent did not resolve
    pub orphans: Vec<OrphanReferenceError>,
    /// Attachment counts
    pub stats: HierarchyStats,
}

impl Hierarchy {
    /// Flat rows, one per reachable Page, depth-first in source order
    pub fn rows(&self) -> impl Iterator<Item = PageRow<'_>> + '_ {
        flatten(&self.roots)
    }
}

/// Link the catalog's levels into a forest of Person roots
pub fn build_hierarchy(catalog: Catalog) -> Hierarchy {
    let total_nodes = catalog.total_nodes();
    let levels = catalog.into_levels();

    let mut orphans = Vec::new();
    // children_of[i] maps a node id at level i to the positions of its children at level i + 1
    let mut children_of: [HashMap<NodeId, Vec<usize>>; 3] = Default::default();

    for child_level in [Level::Letter, Level::Sheet, Level::Page] {
        let depth = child_level.index();
        let parents: HashSet<&NodeId> = levels[depth - 1].iter().map(|n| &n.id).collect();
        let index = &mut children_of[depth - 1];

        for (position, node) in levels[depth].iter().enumerate() {
            match &node.parent_id {
                Some(parent) if parents.contains(parent) => {
                    index.entry(parent.clone()).or_default().push(position);
                }
                unresolved => orphans.push(OrphanReferenceError {
                    level: child_level,
                    id: node.id.clone(),
                    parent: unresolved.clone(),
                }),
            }
        }
    }

    let mut arena: [Vec<Option<Node>>; 4] = levels.map(|nodes| nodes.into_iter().map(Some).collect());

    let person_count = arena[0].len();
    let roots: Vec<HierarchyNode> = (0..person_count)
        .filter_map(|position| attach(&mut arena, &children_of, Level::Person, position))
        .collect();

    let attached_nodes = roots.iter().map(HierarchyNode::subtree_len).sum();
    let stats = HierarchyStats {
        total_nodes,
        attached_nodes,
        orphaned: orphans.len(),
        detached: total_nodes - attached_nodes - orphans.len(),
    };

    if !orphans.is_empty() {
        tracing::warn!(
            orphaned = stats.orphaned,
            detached = stats.detached,
            "Catalog nodes with unresolved parents were left out of the hierarchy"
        );
        for orphan in &orphans {
            tracing::debug!(%orphan, "Orphaned node");
        }
    }
    tracing::info!(
        roots = roots.len(),
        attached = stats.attached_nodes,
        total = stats.total_nodes,
        "Hierarchy built"
    );

    Hierarchy {
        roots,
        orphans,
        stats,
    }
}

/// Move the node at `position` out of the arena together with its indexed descendants
fn attach(
    arena: &mut [Vec<Option<Node>>; 4],
    children_of: &[HashMap<NodeId, Vec<usize>>; 3],
    level: Level,
    position: usize,
) -> Option<HierarchyNode> {
    let node = arena[level.index()].get_mut(position)?.take()?;

    let children = match level.child() {
        Some(child_level) => children_of[level.index()]
            .get(&node.id)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|&child| attach(arena, children_of, child_level, child))
                    .collect()
            })
            .unwrap_or_default(),
        None => Vec::new(),
    };

    Some(HierarchyNode { node, children })
}
