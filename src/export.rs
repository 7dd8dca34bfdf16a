//! Tabular export of flattened catalog rows.
//!
//! Column sets are fixed: a node lacking an optional attribute yields an empty cell,
//! never a missing column. Text is written as UTF-8 unchanged.

use crate::catalog::{Hierarchy, PageRow};
use crate::error::Result;
use crate::types::{HexCase, Level, Node};
use crate::utils::{ensure_parent_dir, hex_identifier};
use std::io::Write;
use std::path::Path;

/// Header of the combined hierarchy export, ancestors first
pub const HIERARCHY_COLUMNS: [&str; 25] = [
    "person_id",
    "person_signature",
    "person_imagedigital",
    "person_wossig",
    "person_info2",
    "person_sig3",
    "letter_id",
    "letter_signature",
    "letter_imagedigital",
    "letter_wossig",
    "letter_info2",
    "letter_sig3",
    "sheet_id",
    "sheet_signature",
    "sheet_imagedigital",
    "sheet_wossig",
    "sheet_info2",
    "sheet_sig3",
    "page_id",
    "page_signature",
    "page_imagedigital",
    "page_imagedigital_hex",
    "page_wossig",
    "page_info2",
    "page_sig3",
];

/// Header of the page-list export used by the flat download mode
pub const FLAT_COLUMNS: [&str; 8] = [
    "id",
    "signature",
    "parent",
    "sig3",
    "imagedigital",
    "imagedigital_hex",
    "wossig",
    "info2",
];

fn ancestor_cells(node: &Node) -> [String; 6] {
    [
        node.id.to_string(),
        node.signature.clone().unwrap_or_default(),
        image_cell(node),
        node.wossig_id.clone().unwrap_or_default(),
        node.info2(),
        node.sig3.clone().unwrap_or_default(),
    ]
}

fn image_cell(node: &Node) -> String {
    node.image_digital_id
        .map(|image_id| image_id.to_string())
        .unwrap_or_default()
}

fn hex_cell(node: &Node, case: HexCase) -> String {
    node.image_digital_id
        .map(|image_id| hex_identifier(image_id, case))
        .unwrap_or_default()
}

fn hierarchy_record(row: &PageRow<'_>, case: HexCase) -> Vec<String> {
    let mut record = Vec::with_capacity(HIERARCHY_COLUMNS.len());
    for ancestor in [row.person, row.letter, row.sheet] {
        record.extend(ancestor_cells(ancestor));
    }

    let page = row.page;
    record.extend([
        page.id.to_string(),
        page.signature.clone().unwrap_or_default(),
        image_cell(page),
        hex_cell(page, case),
        page.wossig_id.clone().unwrap_or_default(),
        page.info2(),
        page.sig3.clone().unwrap_or_default(),
    ]);
    record
}

fn flat_record(page: &Node, case: HexCase) -> [String; 8] {
    [
        page.id.to_string(),
        page.signature.clone().unwrap_or_default(),
        page.parent_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        page.sig3.clone().unwrap_or_default(),
        image_cell(page),
        hex_cell(page, case),
        page.wossig_id.clone().unwrap_or_default(),
        page.info2(),
    ]
}

/// Write the header and one record per row; returns the number of data rows
pub fn write_hierarchy_rows<'a, W: Write>(
    writer: W,
    rows: impl IntoIterator<Item = PageRow<'a>>,
    case: HexCase,
) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HIERARCHY_COLUMNS)?;

    let mut written = 0;
    for row in rows {
        csv_writer.write_record(hierarchy_record(&row, case))?;
        written += 1;
    }

    csv_writer.flush()?;
    Ok(written)
}

/// Export every reachable page of `hierarchy` to `path`
pub fn export_hierarchy(path: &Path, hierarchy: &Hierarchy, case: HexCase) -> Result<usize> {
    ensure_parent_dir(path)?;
    let file = std::fs::File::create(path)?;
    let rows = write_hierarchy_rows(file, hierarchy.rows(), case)?;

    tracing::info!(path = %path.display(), rows, "Wrote combined export");
    Ok(rows)
}

/// Write the flat page-list header and records; returns the number of data rows
pub fn write_flat_pages<'a, W: Write>(
    writer: W,
    pages: impl IntoIterator<Item = &'a Node>,
    case: HexCase,
) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(FLAT_COLUMNS)?;

    let mut written = 0;
    for page in pages {
        debug_assert_eq!(page.level, Level::Page);
        csv_writer.write_record(flat_record(page, case))?;
        written += 1;
    }

    csv_writer.flush()?;
    Ok(written)
}

/// Export the selected pages to `path`
pub fn export_flat(path: &Path, pages: &[&Node], case: HexCase) -> Result<usize> {
    ensure_parent_dir(path)?;
    let file = std::fs::File::create(path)?;
    let rows = write_flat_pages(file, pages.iter().copied(), case)?;

    tracing::info!(path = %path.display(), rows, "Wrote page list export");
    Ok(rows)
}
