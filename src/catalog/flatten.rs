//! Flat views over the catalog.
//!
//! [`flatten`] walks a reconstructed hierarchy lazily, yielding one [`PageRow`] per
//! reachable Page with its full ancestor chain. [`select_flat_pages`] is the page-list
//! view used by the flat download mode, which never builds a hierarchy.

use crate::config::DownloadConfig;
use crate::types::{HexCase, HierarchyNode, Node};
use crate::utils::hex_identifier;

/// One Page with the unique path to its Person root
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRow<'a> {
    /// Root ancestor
    pub person: &'a Node,
    /// Enclosing letter
    pub letter: &'a Node,
    /// Enclosing sheet
    pub sheet: &'a Node,
    /// The page itself
    pub page: &'a Node,
}

impl PageRow<'_> {
    /// Hex filename stem of the page image, if the page has an image id
    pub fn page_hex(&self, case: HexCase) -> Option<String> {
        self.page
            .image_digital_id
            .map(|image_id| hex_identifier(image_id, case))
    }
}

/// Depth-first rows over Person roots, children visited in stored order
///
/// The iterator is lazy and borrows the hierarchy; walking the same hierarchy twice
/// yields identical sequences.
pub fn flatten(roots: &[HierarchyNode]) -> impl Iterator<Item = PageRow<'_>> + '_ {
    roots.iter().flat_map(|person| {
        person.children.iter().flat_map(move |letter| {
            letter.children.iter().flat_map(move |sheet| {
                sheet.children.iter().map(move |page| PageRow {
                    person: &person.node,
                    letter: &letter.node,
                    sheet: &sheet.node,
                    page: &page.node,
                })
            })
        })
    })
}

/// Pages for the flat export and download, sorted by `(parent, sig3)`
///
/// Missing values sort as empty strings; the sort is stable so ties keep source order.
/// A non-empty allow-list restricts the selection to the listed parents.
pub fn select_flat_pages<'a>(pages: &'a [Node], config: &DownloadConfig) -> Vec<&'a Node> {
    let mut selected: Vec<&Node> = pages
        .iter()
        .filter(|page| {
            config.parent_allow_list.is_empty()
                || page
                    .parent_id
                    .as_ref()
                    .is_some_and(|parent| config.allows_parent(parent.as_str()))
        })
        .collect();

    selected.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    selected
}

fn sort_key(page: &Node) -> (&str, &str) {
    (
        page.parent_id.as_ref().map(|p| p.as_str()).unwrap_or(""),
        page.sig3.as_deref().unwrap_or(""),
    )
}
