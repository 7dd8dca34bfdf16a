//! Utility functions: image identifiers, destination paths and file writes

use crate::types::HexCase;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Extension of downloaded image files
pub const IMAGE_EXTENSION: &str = "jpg";

/// Suffix of the temporary file an image is written to before being moved into place
const PARTIAL_SUFFIX: &str = ".part";

/// Render an image id as its canonical hex filename stem
///
/// Base 16, no sign, no `0x` prefix, no zero padding. The case is chosen by the caller
/// since the two download layouts use different conventions.
///
/// # Examples
///
/// ```
/// use catalog_harvest::types::HexCase;
/// use catalog_harvest::utils::hex_identifier;
///
/// assert_eq!(hex_identifier(3735928559, HexCase::Lower), "deadbeef");
/// assert_eq!(hex_identifier(3735928559, HexCase::Upper), "DEADBEEF");
/// assert_eq!(hex_identifier(4096, HexCase::Upper), "1000");
/// ```
pub fn hex_identifier(image_id: u64, case: HexCase) -> String {
    match case {
        HexCase::Lower => format!("{:x}", image_id),
        HexCase::Upper => format!("{:X}", image_id),
    }
}

/// Whether `segment` names exactly one directory entry
///
/// Rejects empty strings, `.`, `..`, absolute paths, drive prefixes and anything
/// containing a separator, so a catalog id can never move a file out of its root.
pub fn is_plain_segment(segment: &str) -> bool {
    if segment.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// `<root>/<segment>/.../<hex>.jpg`, or `None` if a segment is not a plain name
pub fn image_destination(root: &Path, segments: &[&str], hex: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in segments {
        if !is_plain_segment(segment) {
            return None;
        }
        path.push(segment);
    }
    path.push(format!("{}.{}", hex, IMAGE_EXTENSION));
    Some(path)
}

/// Write `bytes` to `path` so readers never observe a partial file
///
/// Parent directories are created as needed (existing ones are fine). Each call writes
/// to its own temporary file next to `path`, which is then renamed over `path`,
/// replacing any earlier download. Concurrent writes to one destination never share a
/// temporary file; the last rename wins. On failure the temporary file is removed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await?;

    let path = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix(".")
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(&dir)?;
        file.write_all(&bytes)?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

/// Create the parent directory of a file path if it has one
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
