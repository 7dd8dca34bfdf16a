//! Turning catalog rows into image download jobs.

use crate::catalog::PageRow;
use crate::config::DownloadConfig;
use crate::types::{ImageLayout, Node, NodeId};
use crate::utils::{hex_identifier, image_destination};
use std::path::PathBuf;

/// One image to retrieve and where to put it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageJob {
    /// Page the image belongs to
    pub page_id: NodeId,
    /// Hex filename stem
    pub hex: String,
    /// Source URL
    pub url: String,
    /// Final file path
    pub destination: PathBuf,
}

/// Jobs for one run plus the pages that produced none
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Jobs in catalog order
    pub jobs: Vec<ImageJob>,
    /// Pages with no image id
    pub without_image: usize,
    /// Pages excluded by the parent allow-list
    pub out_of_scope: usize,
    /// Pages with no parent to place them under (flat layout only)
    pub without_parent: usize,
    /// Pages whose parent ids are not usable as directory names
    pub invalid_path: usize,
}

impl DownloadPlan {
    fn push(&mut self, page: &Node, hex: String, url: String, destination: Option<PathBuf>) {
        match destination {
            Some(destination) => self.jobs.push(ImageJob {
                page_id: page.id.clone(),
                hex,
                url,
                destination,
            }),
            None => {
                tracing::warn!(
                    page_id = %page.id,
                    parent_id = ?page.parent_id,
                    "Skipping image, a parent id is not a plain directory name"
                );
                self.invalid_path += 1;
            }
        }
    }
}

/// Plan the hierarchy-driven layout: `<root>/<letter_id>/<sheet_id>/<hex>.jpg`
///
/// The allow-list, when set, is matched against the page's sheet id.
pub fn plan_nested<'a>(
    rows: impl IntoIterator<Item = PageRow<'a>>,
    config: &DownloadConfig,
) -> DownloadPlan {
    let case = config.hex_case_for(ImageLayout::Nested);
    let mut plan = DownloadPlan::default();

    for row in rows {
        if !config.allows_parent(row.sheet.id.as_str()) {
            plan.out_of_scope += 1;
            continue;
        }
        let Some(image_id) = row.page.image_digital_id else {
            plan.without_image += 1;
            continue;
        };

        let hex = hex_identifier(image_id, case);
        let destination = image_destination(
            &config.output_dir,
            &[row.letter.id.as_str(), row.sheet.id.as_str()],
            &hex,
        );
        plan.push(row.page, hex.clone(), config.image_url(&hex), destination);
    }

    plan
}

/// Plan the page-list layout: `<root>/<parent_id>/<HEX>.jpg`
///
/// Expects pages already filtered by [`select_flat_pages`](crate::catalog::select_flat_pages).
pub fn plan_flat<'a>(pages: impl IntoIterator<Item = &'a Node>, config: &DownloadConfig) -> DownloadPlan {
    let case = config.hex_case_for(ImageLayout::Flat);
    let mut plan = DownloadPlan::default();

    for page in pages {
        let Some(image_id) = page.image_digital_id else {
            plan.without_image += 1;
            continue;
        };
        let Some(parent) = &page.parent_id else {
            plan.without_parent += 1;
            continue;
        };
        if !config.allows_parent(parent.as_str()) {
            plan.out_of_scope += 1;
            continue;
        }

        let hex = hex_identifier(image_id, case);
        let destination = image_destination(&config.output_dir, &[parent.as_str()], &hex);
        plan.push(page, hex.clone(), config.image_url(&hex), destination);
    }

    plan
}
