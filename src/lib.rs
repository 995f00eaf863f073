//! Inspect PDF documents and rasterize their pages to PNG or JPEG.
//!
//! ```no_run
//! use pagesnap::{CaptureOptions, PdfDocument, capture_pages};
//! use std::path::Path;
//!
//! let doc = PdfDocument::open_path(Path::new("report.pdf"))?;
//! let report = capture_pages(&doc, &[1, 3], Path::new("shot.png"), &CaptureOptions::default())?;
//! for outcome in &report.outcomes {
//!     println!("page {}: {:?}", outcome.page, outcome.result.as_ref().map(|p| &p.path));
//! }
//! # Ok::<(), pagesnap::SnapError>(())
//! ```

mod capture;
mod cmap;
mod colors;
pub mod diagnostics;
mod display;
mod document;
mod encode;
mod encoding;
mod error;
mod filters;
mod fonts;
mod functions;
mod geometry;
mod images;
mod interpret;
mod metadata;
mod metrics;
mod objects;
mod output;
mod raster;
mod shading;
mod surface;
mod system_fonts;
#[cfg(test)]
mod testing;
mod types;

pub use capture::{
    CaptureOptions, CaptureReport, CapturedPage, DocumentInfo, PageInfo, PageOutcome,
    capture_pages, inspect_document, parse_page_list,
};
pub use document::{PageHandle, PdfDocument};
pub use encode::{DEFAULT_JPEG_QUALITY, EncodeOptions, encode_surface};
pub use error::{RenderError, SnapError};
pub use geometry::{Viewport, resolve_viewport};
pub use metadata::{Metadata, MetadataKey, extract_metadata};
pub use metrics::{CaptureSummary, PageMetrics};
pub use output::{ImageFormat, OutputTarget, expand_output_paths};
pub use raster::{RenderOptions, render_page};
pub use surface::PixelSurface;
pub use system_fonts::FONT_DIR_ENV;
pub use types::{Color, Matrix, Pt, Size};
