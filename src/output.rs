//! Output path templating and format inference.

use crate::error::SnapError;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// `png` → PNG, `jpg`/`jpeg` → JPEG (case-insensitive); anything else,
    /// including no extension, falls back to PNG.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("jpg") | Some("jpeg") => ImageFormat::Jpeg,
            _ => ImageFormat::Png,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub page: u32,
    pub path: PathBuf,
    pub format: ImageFormat,
}

/// One target per requested page, in request order. A single page writes
/// to `base` unchanged; several pages get `-{page}` before the file name's
/// final extension. Two pages landing on the same path is an
/// `InvalidArgument`.
pub fn expand_output_paths(base: &Path, pages: &[u32]) -> Result<Vec<OutputTarget>, SnapError> {
    let targets: Vec<OutputTarget> = if pages.len() == 1 {
        vec![OutputTarget {
            page: pages[0],
            path: base.to_path_buf(),
            format: ImageFormat::from_path(base),
        }]
    } else {
        pages
            .iter()
            .map(|&page| {
                let path = page_path(base, page);
                let format = ImageFormat::from_path(&path);
                OutputTarget { page, path, format }
            })
            .collect()
    };

    let mut seen = HashSet::new();
    for target in &targets {
        if !seen.insert(target.path.as_path()) {
            return Err(SnapError::InvalidArgument(format!(
                "output path {} would be written more than once (page {} requested twice?)",
                target.path.display(),
                target.page
            )));
        }
    }
    Ok(targets)
}

fn page_path(base: &Path, page: u32) -> PathBuf {
    let Some(file_name) = base.file_name() else {
        // `base` ends in `..` or is a root; suffix the whole thing.
        let mut raw = base.as_os_str().to_owned();
        raw.push(format!("-{page}"));
        return PathBuf::from(raw);
    };
    let name: OsString = match (base.file_stem(), base.extension()) {
        (Some(stem), Some(ext)) => {
            let mut name = stem.to_owned();
            name.push(format!("-{page}."));
            name.push(ext);
            name
        }
        _ => {
            let mut name = file_name.to_owned();
            name.push(format!("-{page}"));
            name
        }
    };
    base.with_file_name(name)
}
