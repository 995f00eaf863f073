//! Library-level tests of the open → render → encode → write pipeline.

mod common;

use common::{Fixture, PNG_SIGNATURE, media_box, three_color_pages};
use lopdf::{Object, dictionary};
use pagesnap::{
    CaptureOptions, MetadataKey, PdfDocument, RenderOptions, SnapError, capture_pages,
    extract_metadata, inspect_document, render_page, resolve_viewport,
};

#[test]
fn pages_enumerate_in_order_and_out_of_range_numbers_fail() {
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    assert_eq!(doc.page_count(), 3);
    let numbers: Vec<u32> = doc.pages().map(|p| p.number()).collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    for bad in [0, 4] {
        match doc.page(bad) {
            Err(SnapError::OutOfRange { page, page_count }) => {
                assert_eq!((page, page_count), (bad, 3));
            }
            other => panic!("page {bad}: unexpected {other:?}"),
        }
    }
}

#[test]
fn garbage_input_is_a_malformed_document() {
    let err = PdfDocument::open(b"definitely not a pdf").expect_err("garbage");
    assert!(matches!(err, SnapError::MalformedDocument(_)), "{err}");
    assert!(err.is_fatal());
}

#[test]
fn batch_failures_are_isolated_per_page() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    let report = capture_pages(
        &doc,
        &[2, 7],
        &dir.path().join("out.png"),
        &CaptureOptions::default(),
    )
    .expect("capture");

    assert_eq!(report.outcomes.len(), 2);
    let first = report.outcomes[0].result.as_ref().expect("page 2");
    assert_eq!(first.path, dir.path().join("out-2.png"));
    assert_eq!((first.width, first.height), (200, 100));
    assert!(dir.path().join("out-2.png").exists());

    assert_eq!(report.outcomes[1].page, 7);
    assert!(matches!(
        report.outcomes[1].result,
        Err(SnapError::OutOfRange { page: 7, page_count: 3 })
    ));
    assert!(!dir.path().join("out-7.png").exists());
    assert!(!report.succeeded());
    assert_eq!(report.summary.failed_pages, vec![7]);
}

#[test]
fn a_page_that_cannot_render_does_not_stop_its_siblings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pdf = Fixture::new()
        .sized_page("/Im9 Do", 200, 100)
        .sized_page("0 1 0 rg 0 0 200 100 re f", 200, 100)
        .build();
    let doc = PdfDocument::open(&pdf).expect("open");
    let report = capture_pages(
        &doc,
        &[1, 2],
        &dir.path().join("out.png"),
        &CaptureOptions::default(),
    )
    .expect("capture");

    assert_eq!(report.outcomes.len(), 2);
    match &report.outcomes[0].result {
        Err(err @ SnapError::Render { page: 1, .. }) => {
            assert!(!err.is_fatal());
            assert!(err.to_string().contains("Im9"), "{err}");
        }
        other => panic!("page 1: expected a render error, got {other:?}"),
    }
    assert!(!dir.path().join("out-1.png").exists());

    let second = report.outcomes[1].result.as_ref().expect("page 2");
    assert_eq!(second.path, dir.path().join("out-2.png"));
    let img = image::open(&second.path).expect("decode").to_rgba8();
    assert_eq!(img.get_pixel(100, 50).0, [0, 255, 0, 255]);

    assert!(!report.succeeded());
    assert_eq!(report.summary.failed_pages, vec![1]);
}

#[test]
fn solid_fills_survive_png_exactly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    let report = capture_pages(
        &doc,
        &[1, 2, 3],
        &dir.path().join("page.png"),
        &CaptureOptions::default(),
    )
    .expect("capture");
    assert!(report.succeeded());

    for (page, expected) in [(1, [255, 0, 0, 255]), (2, [0, 255, 0, 255]), (3, [0, 0, 255, 255])] {
        let path = dir.path().join(format!("page-{page}.png"));
        let img = image::open(&path).expect("decode").to_rgba8();
        assert_eq!(img.dimensions(), (200, 100));
        assert_eq!(img.get_pixel(100, 50).0, expected, "page {page}");
    }
}

#[test]
fn unknown_extensions_fall_back_to_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    let out = dir.path().join("shot.gif");
    let report = capture_pages(&doc, &[1], &out, &CaptureOptions::default()).expect("capture");
    assert!(report.succeeded());
    let bytes = std::fs::read(&out).expect("read");
    assert!(bytes.starts_with(PNG_SIGNATURE));
}

#[test]
fn jpeg_output_is_selected_by_extension() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    let out = dir.path().join("shot.JPG");
    capture_pages(&doc, &[3], &out, &CaptureOptions::default()).expect("capture");
    let bytes = std::fs::read(&out).expect("read");
    assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]));
}

#[test]
fn rerendering_a_page_is_bit_identical() {
    let content = "0.2 0.4 0.6 rg 10 10 m 190 20 l 100 90 l h f \
                   1 0 0 RG 3 w 20 80 m 180 80 l S";
    let doc = PdfDocument::open(&Fixture::new().sized_page(content, 200, 100).build())
        .expect("open");
    let page = doc.page(1).expect("page");
    let viewport = resolve_viewport(&page, 1.5).expect("viewport");
    let first = render_page(&page, &viewport, &RenderOptions::default()).expect("render");
    let second = render_page(&page, &viewport, &RenderOptions::default()).expect("render");
    assert_eq!(first.to_rgba8().as_raw(), second.to_rgba8().as_raw());
}

#[test]
fn parallel_capture_matches_sequential_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    let options = CaptureOptions {
        jobs: 2,
        ..CaptureOptions::default()
    };
    let report = capture_pages(&doc, &[3, 1, 2], &dir.path().join("p.png"), &options)
        .expect("capture");
    let pages: Vec<u32> = report.outcomes.iter().map(|o| o.page).collect();
    assert_eq!(pages, vec![3, 1, 2]);
    assert!(report.succeeded());
    assert_eq!(report.summary.pages.len(), 3);
}

#[test]
fn scale_multiplies_pixel_dimensions() {
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    let page = doc.page(1).expect("page");
    let viewport = resolve_viewport(&page, 2.0).expect("viewport");
    assert_eq!(viewport.pixel_size(), (400, 200));
    let surface = render_page(&page, &viewport, &RenderOptions::default()).expect("render");
    assert_eq!((surface.width(), surface.height()), (400, 200));
}

#[test]
fn rotation_swaps_viewport_dimensions() {
    let mut extra = media_box(0, 0, 200, 100);
    extra.set("Rotate", 90);
    // Ink in the lower-left corner of the unrotated page.
    let doc = PdfDocument::open(
        &Fixture::new()
            .page("0 0 0 rg 0 0 20 20 re f", extra)
            .build(),
    )
    .expect("open");
    let page = doc.page(1).expect("page");
    let viewport = resolve_viewport(&page, 1.0).expect("viewport");
    assert_eq!(viewport.rotation, 90);
    assert_eq!(viewport.pixel_size(), (100, 200));

    let surface = render_page(&page, &viewport, &RenderOptions::default()).expect("render");
    // Rotated clockwise, the lower-left corner lands top-left.
    assert_eq!(surface.pixel(5, 5), Some([0, 0, 0, 255]));
    assert_eq!(surface.pixel(95, 195), Some([255, 255, 255, 255]));
}

#[test]
fn crop_box_wins_over_media_box() {
    let mut extra = media_box(0, 0, 300, 300);
    extra.set(
        "CropBox",
        vec![50.into(), 50.into(), 150.into(), 200.into()],
    );
    let doc = PdfDocument::open(
        &Fixture::new()
            .page("1 0 0 rg 50 50 10 10 re f", extra)
            .build(),
    )
    .expect("open");
    let page = doc.page(1).expect("page");
    let viewport = resolve_viewport(&page, 1.0).expect("viewport");
    assert_eq!(viewport.pixel_size(), (100, 150));

    let surface = render_page(&page, &viewport, &RenderOptions::default()).expect("render");
    // The crop origin maps to the bottom-left pixel.
    assert_eq!(surface.pixel(5, 145), Some([255, 0, 0, 255]));
    assert_eq!(surface.pixel(50, 75), Some([255, 255, 255, 255]));
}

#[test]
fn absent_metadata_is_empty_not_an_error() {
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    assert!(extract_metadata(&doc).is_empty());
    let report = inspect_document(&doc, "plain.pdf").expect("inspect").render_report();
    assert!(report.contains("Pages: 3"));
    assert!(!report.contains("Title:"));
    assert!(report.contains("  Page 3: 200 x 100 pt"));
}

#[test]
fn present_metadata_is_reported() {
    let doc = PdfDocument::open(
        &three_color_pages()
            .info(dictionary! {
                "Author" => Object::string_literal("A. Writer"),
                "ModDate" => Object::string_literal("D:20230405060708Z"),
            })
            .build(),
    )
    .expect("open");
    let meta = extract_metadata(&doc);
    assert_eq!(meta.get(MetadataKey::Author), Some("A. Writer"));
    assert_eq!(meta.get(MetadataKey::Title), None);
    let report = inspect_document(&doc, "meta.pdf").expect("inspect").render_report();
    assert!(report.contains("Author: A. Writer\nModified: D:20230405060708Z\n"));
}

#[test]
fn duplicate_pages_are_rejected_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    let err = capture_pages(
        &doc,
        &[1, 1],
        &dir.path().join("dup.png"),
        &CaptureOptions::default(),
    )
    .expect_err("collision");
    assert!(err.is_fatal());
    assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
}

#[test]
fn unwritable_output_is_a_per_page_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let doc = PdfDocument::open(&three_color_pages().build()).expect("open");
    let out = dir.path().join("missing-dir").join("p.png");
    let report = capture_pages(&doc, &[1], &out, &CaptureOptions::default()).expect("capture");
    assert!(matches!(report.outcomes[0].result, Err(SnapError::Io { .. })));
    assert!(!report.succeeded());
}
