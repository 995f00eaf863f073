//! The capture pipeline: open, then either report document info or, per
//! requested page, resolve → render → template → encode → write.

use crate::document::PdfDocument;
use crate::encode::{EncodeOptions, encode_surface};
use crate::error::SnapError;
use crate::geometry::resolve_viewport;
use crate::metadata::{Metadata, extract_metadata};
use crate::metrics::{CaptureSummary, PageMetrics};
use crate::output::{OutputTarget, expand_output_paths};
use crate::raster::{RenderOptions, render_page_counted};
use crate::types::Pt;
use rayon::prelude::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    pub scale: f32,
    /// 1 renders on the calling thread, 0 uses rayon's global pool, any
    /// other value a dedicated pool of that many threads.
    pub jobs: usize,
    pub render: RenderOptions,
    pub encode: EncodeOptions,
}

impl CaptureOptions {
    pub fn validate(&self) -> Result<(), SnapError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(SnapError::InvalidArgument(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            jobs: 1,
            render: RenderOptions::default(),
            encode: EncodeOptions::default(),
        }
    }
}

/// A page written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub metrics: PageMetrics,
}

#[derive(Debug)]
pub struct PageOutcome {
    pub page: u32,
    pub result: Result<CapturedPage, SnapError>,
}

#[derive(Debug)]
pub struct CaptureReport {
    /// In request order.
    pub outcomes: Vec<PageOutcome>,
    pub summary: CaptureSummary,
}

impl CaptureReport {
    pub fn succeeded(&self) -> bool {
        self.summary.succeeded()
    }
}

/// Parses a comma-separated list of 1-based page numbers. Whitespace around
/// items is allowed; order and duplicates are kept. Zero is accepted here
/// and reported per page as out of range.
pub fn parse_page_list(raw: &str) -> Result<Vec<u32>, SnapError> {
    let invalid = || SnapError::InvalidArgument(format!("invalid page number(s): {raw}"));
    let mut pages = Vec::new();
    for item in raw.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(invalid());
        }
        let value: i64 = item.parse().map_err(|_| invalid())?;
        if value < 0 {
            return Err(SnapError::InvalidArgument(format!(
                "page numbers must not be negative: {value}"
            )));
        }
        pages.push(u32::try_from(value).map_err(|_| invalid())?);
    }
    Ok(pages)
}

/// Renders and writes each requested page. Structural problems (bad scale,
/// colliding output paths, thread pool setup) fail the whole call before
/// anything is written; everything else is reported per page.
pub fn capture_pages(
    doc: &PdfDocument,
    pages: &[u32],
    output: &Path,
    options: &CaptureOptions,
) -> Result<CaptureReport, SnapError> {
    options.validate()?;
    if pages.is_empty() {
        return Err(SnapError::InvalidArgument("no pages requested".to_string()));
    }
    let targets = expand_output_paths(output, pages)?;

    let outcomes: Vec<PageOutcome> = match options.jobs {
        1 => targets.iter().map(|t| capture_outcome(doc, t, options)).collect(),
        0 => targets
            .par_iter()
            .map(|t| capture_outcome(doc, t, options))
            .collect(),
        jobs => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .map_err(|err| {
                    SnapError::InvalidArgument(format!("cannot start {jobs} render threads: {err}"))
                })?;
            pool.install(|| {
                targets
                    .par_iter()
                    .map(|t| capture_outcome(doc, t, options))
                    .collect()
            })
        }
    };

    let mut summary = CaptureSummary::default();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(captured) => summary.record(captured.metrics.clone()),
            Err(err) => {
                log::debug!("capture failed: {err}");
                summary.record_failure(outcome.page);
            }
        }
    }
    log::debug!(
        "captured {}/{} pages in {:.1} ms ({} bytes)",
        summary.pages.len(),
        outcomes.len(),
        summary.total_render_ms,
        summary.total_bytes
    );
    Ok(CaptureReport { outcomes, summary })
}

fn capture_outcome(doc: &PdfDocument, target: &OutputTarget, options: &CaptureOptions) -> PageOutcome {
    PageOutcome {
        page: target.page,
        result: capture_one(doc, target, options),
    }
}

fn capture_one(
    doc: &PdfDocument,
    target: &OutputTarget,
    options: &CaptureOptions,
) -> Result<CapturedPage, SnapError> {
    let number = target.page;
    let started = Instant::now();
    let page = doc.page(number)?;
    let viewport = resolve_viewport(&page, options.scale)?;
    let (surface, command_count) = render_page_counted(&page, &viewport, &options.render)
        .map_err(|source| SnapError::Render {
            page: number,
            source,
        })?;
    let render_ms = started.elapsed().as_secs_f64() * 1000.0;

    let bytes = encode_surface(&surface, target.format, &options.encode, number)?;
    let (width, height) = (surface.width(), surface.height());
    drop(surface);
    std::fs::write(&target.path, &bytes).map_err(|source| SnapError::Io {
        path: target.path.clone(),
        source,
    })?;

    let metrics = PageMetrics {
        page_number: number,
        render_ms,
        command_count,
        encoded_bytes: bytes.len(),
    };
    log::debug!(
        "page {number}: {command_count} commands, {width}x{height}px, rendered in {render_ms:.1} ms, {} bytes",
        metrics.encoded_bytes
    );
    Ok(CapturedPage {
        path: target.path.clone(),
        width,
        height,
        metrics,
    })
}

/// Page size at scale 1, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    pub number: u32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub file_name: String,
    pub version: String,
    pub page_count: u32,
    pub metadata: Metadata,
    pub pages: Vec<PageInfo>,
}

pub fn inspect_document(doc: &PdfDocument, file_name: &str) -> Result<DocumentInfo, SnapError> {
    let pages = doc
        .pages()
        .map(|page| {
            let viewport = resolve_viewport(&page, 1.0)?;
            Ok(PageInfo {
                number: page.number(),
                width: viewport.width,
                height: viewport.height,
            })
        })
        .collect::<Result<Vec<_>, SnapError>>()?;
    Ok(DocumentInfo {
        file_name: file_name.to_string(),
        version: doc.version().to_string(),
        page_count: doc.page_count(),
        metadata: extract_metadata(doc),
        pages,
    })
}

impl DocumentInfo {
    /// The info-mode report, one field per line.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\nFile: {}", self.file_name);
        let _ = writeln!(out, "Pages: {}", self.page_count);
        for (key, value) in self.metadata.iter() {
            let _ = writeln!(out, "{}: {}", key.label(), value);
        }
        let _ = writeln!(out, "\nPage dimensions:");
        for page in &self.pages {
            let _ = writeln!(
                out,
                "  Page {}: {} x {} pt",
                page.number,
                Pt::from_f32(page.width).round_i64(),
                Pt::from_f32(page.height).round_i64()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PdfBuilder, media_box};
    use lopdf::dictionary;

    #[test]
    fn page_lists_allow_whitespace_and_keep_order() {
        assert_eq!(parse_page_list("1").expect("one"), vec![1]);
        assert_eq!(parse_page_list(" 3 , 1,2 ").expect("list"), vec![3, 1, 2]);
        assert_eq!(parse_page_list("0").expect("zero"), vec![0]);
    }

    #[test]
    fn malformed_page_lists_are_invalid_arguments() {
        for raw in ["", "1,,2", "a", "1.5", "2,x", "-1", "99999999999"] {
            let err = parse_page_list(raw).expect_err(raw);
            assert!(matches!(err, SnapError::InvalidArgument(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn report_lists_metadata_and_rounded_dimensions() {
        let mut builder = PdfBuilder::new();
        builder.add_simple_page(b"", 612, 792);
        let mut rotated = media_box(200, 100);
        rotated.set("Rotate", 90);
        builder.add_page(b"", rotated);
        builder.add_page(
            b"",
            dictionary! {
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    lopdf::Object::Real(100.5),
                    lopdf::Object::Real(50.4),
                ],
            },
        );
        builder.set_info(dictionary! {
            "Title" => lopdf::Object::string_literal("Quarterly"),
            "CreationDate" => lopdf::Object::string_literal("D:20240101120000Z"),
        });
        let doc = PdfDocument::open(&builder.finish()).expect("open");
        let info = inspect_document(&doc, "report.pdf").expect("inspect");

        assert_eq!(
            info.render_report(),
            "\nFile: report.pdf\nPages: 3\nTitle: Quarterly\nCreated: D:20240101120000Z\n\
             \nPage dimensions:\n  Page 1: 612 x 792 pt\n  Page 2: 100 x 200 pt\n  Page 3: 101 x 50 pt\n"
        );
    }

    #[test]
    fn invalid_scale_fails_before_any_output() {
        let mut builder = PdfBuilder::new();
        builder.add_simple_page(b"", 10, 10);
        let doc = PdfDocument::open(&builder.finish()).expect("open");
        let options = CaptureOptions {
            scale: 0.0,
            ..CaptureOptions::default()
        };
        let dir = tempfile::tempdir().expect("tempdir");
        let err = capture_pages(&doc, &[1], &dir.path().join("p.png"), &options).expect_err("scale");
        assert!(err.is_fatal());
        assert!(!dir.path().join("p.png").exists());
    }
}
