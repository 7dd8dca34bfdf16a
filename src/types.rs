//! Core types for catalog-harvest

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One of the four catalog levels, outermost first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Root level
    Person,
    /// Letters written by a person
    Letter,
    /// Sheets of a letter
    Sheet,
    /// Scanned pages of a sheet (leaves)
    Page,
}

impl Level {
    /// All levels in hierarchy order
    pub const ALL: [Level; 4] = [Level::Person, Level::Letter, Level::Sheet, Level::Page];

    /// Position in [`Level::ALL`]
    pub fn index(self) -> usize {
        match self {
            Level::Person => 0,
            Level::Letter => 1,
            Level::Sheet => 2,
            Level::Page => 3,
        }
    }

    /// The enclosed level, `None` for leaves
    pub fn child(self) -> Option<Level> {
        match self {
            Level::Person => Some(Level::Letter),
            Level::Letter => Some(Level::Sheet),
            Level::Sheet => Some(Level::Page),
            Level::Page => None,
        }
    }

    /// Collection name used in logs and messages
    pub fn name(self) -> &'static str {
        match self {
            Level::Person => "person",
            Level::Letter => "letters",
            Level::Sheet => "sheets",
            Level::Page => "pages",
        }
    }

    /// Prefix of this level's columns in the combined export
    pub fn column_prefix(self) -> &'static str {
        match self {
            Level::Person => "person",
            Level::Letter => "letter",
            Level::Sheet => "sheet",
            Level::Page => "page",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque node identifier, unique within its level
///
/// The API serves ids as JSON strings or numbers; both normalize to their textual form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new NodeId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `info2` entry: a key with an optional value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoPair {
    /// Entry key
    pub key: String,
    /// Entry value; `None` renders as the bare key
    pub value: Option<String>,
}

impl InfoPair {
    /// Create a new pair
    pub fn new(key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            key: key.into(),
            value: value.map(Into::into),
        }
    }
}

/// Render info pairs as `key: value` (or bare `key`), joined by `, `
///
/// Order is preserved and duplicates are kept.
pub fn render_info_pairs(pairs: &[InfoPair]) -> String {
    pairs
        .iter()
        .map(|pair| match &pair.value {
            Some(value) => format!("{}: {}", pair.key, value),
            None => pair.key.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One catalog entry at one level
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique within `level`
    pub id: NodeId,
    /// Human-readable label, not unique
    pub signature: Option<String>,
    /// Level this node belongs to
    pub level: Level,
    /// Reference to the enclosing node one level up
    ///
    /// Never consulted for [`Level::Person`], which is the root.
    pub parent_id: Option<NodeId>,
    /// Supplementary label
    pub sig3: Option<String>,
    /// Numeric image id, source of the hex filename
    pub image_digital_id: Option<u64>,
    /// External cross-reference id
    pub wossig_id: Option<String>,
    /// Ordered `info2` entries
    pub info_pairs: Vec<InfoPair>,
}

impl Node {
    /// Create a node with only an id and level set
    pub fn new(level: Level, id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            signature: None,
            level,
            parent_id: None,
            sig3: None,
            image_digital_id: None,
            wossig_id: None,
            info_pairs: Vec::new(),
        }
    }

    /// Builder-style parent setter
    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Builder-style image id setter
    pub fn with_image(mut self, image_digital_id: u64) -> Self {
        self.image_digital_id = Some(image_digital_id);
        self
    }

    /// Builder-style signature setter
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// `info2` rendered for tabular export
    pub fn info2(&self) -> String {
        render_info_pairs(&self.info_pairs)
    }
}

/// A node plus its ordered children
///
/// Person holds Letters, Letter holds Sheets, Sheet holds Pages; Pages hold nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    /// The node itself
    pub node: Node,
    /// Children in source fetch order
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Number of nodes in this subtree, including itself
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(HierarchyNode::subtree_len)
            .sum::<usize>()
    }
}

/// Letter case of rendered hex identifiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HexCase {
    /// `deadbeef`
    #[default]
    Lower,
    /// `DEADBEEF`
    Upper,
}

impl std::str::FromStr for HexCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lower" | "lowercase" => Ok(HexCase::Lower),
            "upper" | "uppercase" => Ok(HexCase::Upper),
            other => Err(format!("unknown hex case '{other}', expected lower or upper")),
        }
    }
}

/// On-disk image layout, selected by entry point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageLayout {
    /// `<root>/<letter_id>/<sheet_id>/<hex>.jpg`, driven by the reconstructed hierarchy
    Nested,
    /// `<root>/<parent_id>/<hex>.jpg`, driven by the page list alone
    Flat,
}

impl ImageLayout {
    /// Hex case each layout has always used
    pub fn default_hex_case(self) -> HexCase {
        match self {
            ImageLayout::Nested => HexCase::Lower,
            ImageLayout::Flat => HexCase::Upper,
        }
    }
}

/// Events emitted during a run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One endpoint was fetched and normalized
    LevelFetched {
        /// Level fetched
        level: Level,
        /// Records kept after normalization
        records: usize,
        /// Records skipped as malformed
        skipped: usize,
    },

    /// The hierarchy was reconstructed
    HierarchyBuilt {
        /// Number of Person roots
        roots: usize,
        /// Nodes attached to the tree
        attached: usize,
        /// Nodes left out of the tree
        orphaned: usize,
    },

    /// An image was written
    ImageSaved {
        /// Hex identifier
        hex: String,
        /// Final destination
        path: PathBuf,
    },

    /// An image download failed
    ImageFailed {
        /// Hex identifier
        hex: String,
        /// Requested URL
        url: String,
        /// Error message
        error: String,
    },

    /// A tabular export was written
    ExportWritten {
        /// Output file
        path: PathBuf,
        /// Data rows written (header excluded)
        rows: usize,
    },
}
