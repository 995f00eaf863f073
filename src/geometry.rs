use crate::document::PageHandle;
use crate::error::SnapError;
use crate::objects::{obj_to_f32, parse_rect_object, resolve_object};
use crate::types::{Matrix, Pt, Size};
use lopdf::{Dictionary as LoDictionary, Document as LoDocument, Object as LoObject, ObjectId};

const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Page dimensions in device pixels for one scale factor, plus the transform
/// from PDF user space (y up) to device space (y down, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    /// Effective clockwise rotation: 0, 90, 180 or 270.
    pub rotation: u16,
    pub transform: Matrix,
    /// The visible region of user space, `[x0 y0 x1 y1]`.
    pub view_box: [f32; 4],
}

impl Viewport {
    /// Surface size: each dimension rounded half away from zero, at least 1.
    pub fn pixel_size(&self) -> (u32, u32) {
        (round_dimension(self.width), round_dimension(self.height))
    }

    /// Dimensions in points, i.e. with the scale factor removed.
    pub fn size_pt(&self) -> Size {
        Size {
            width: Pt::from_f32(self.width / self.scale),
            height: Pt::from_f32(self.height / self.scale),
        }
    }
}

fn round_dimension(value: f32) -> u32 {
    Pt::from_f32(value).round_i64().clamp(1, u32::MAX as i64) as u32
}

pub fn resolve_viewport(page: &PageHandle<'_>, scale: f32) -> Result<Viewport, SnapError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(SnapError::InvalidArgument(format!(
            "scale must be a positive number, got {scale}"
        )));
    }
    let doc = page.lo();
    let page_id = page.object_id();
    let view_box = effective_view_box(doc, page_id);
    let user_unit = page_dict(doc, page_id)
        .and_then(|dict| dict.get(b"UserUnit").ok())
        .and_then(|obj| resolve_object(doc, obj).ok())
        .and_then(obj_to_f32)
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(1.0);
    let rotation = effective_rotation(doc, page_id);
    let viewport = viewport_for_box(view_box, scale * user_unit, rotation);
    if !(viewport.width > 0.0 && viewport.height > 0.0) {
        return Err(SnapError::MalformedDocument(format!(
            "page {} has an empty page box",
            page.number()
        )));
    }
    Ok(Viewport { scale, ..viewport })
}

/// Builds the viewport for a `[x0 y0 x1 y1]` box. `scale` already includes
/// any user unit.
pub(crate) fn viewport_for_box(view_box: [f32; 4], scale: f32, rotation: u16) -> Viewport {
    let [x0, y0, x1, y1] = view_box;
    let center_x = (x0 + x1) / 2.0;
    let center_y = (y0 + y1) / 2.0;
    let (rotate_a, rotate_b, rotate_c, rotate_d) = match rotation {
        90 => (0.0, 1.0, 1.0, 0.0),
        180 => (-1.0, 0.0, 0.0, 1.0),
        270 => (0.0, -1.0, -1.0, 0.0),
        _ => (1.0, 0.0, 0.0, -1.0),
    };

    let (offset_x, offset_y, width, height) = if rotate_a == 0.0 {
        (
            (center_y - y0).abs() * scale,
            (center_x - x0).abs() * scale,
            (y1 - y0) * scale,
            (x1 - x0) * scale,
        )
    } else {
        (
            (center_x - x0).abs() * scale,
            (center_y - y0).abs() * scale,
            (x1 - x0) * scale,
            (y1 - y0) * scale,
        )
    };

    let transform = Matrix::from_operands(
        rotate_a * scale,
        rotate_b * scale,
        rotate_c * scale,
        rotate_d * scale,
        offset_x - rotate_a * scale * center_x - rotate_c * scale * center_y,
        offset_y - rotate_b * scale * center_x - rotate_d * scale * center_y,
    );
    Viewport {
        width,
        height,
        scale,
        rotation,
        transform,
        view_box,
    }
}

pub(crate) fn page_dict(doc: &LoDocument, id: ObjectId) -> Option<&LoDictionary> {
    match doc.get_object(id).ok()? {
        LoObject::Dictionary(dict) => Some(dict),
        LoObject::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Looks `key` up on the page, then on each ancestor in the page tree.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a LoDocument,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a LoObject> {
    let mut id = page_id;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let dict = page_dict(doc, id)?;
        if let Ok(value) = dict.get(key) {
            return resolve_object(doc, value).ok();
        }
        id = dict.get(b"Parent").and_then(LoObject::as_reference).ok()?;
    }
    None
}

fn usable_box(doc: &LoDocument, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let rect = parse_rect_object(doc, inherited_attribute(doc, page_id, key)?)?;
    let finite = rect.iter().all(|v| v.is_finite());
    (finite && rect[2] > rect[0] && rect[3] > rect[1]).then_some(rect)
}

/// The crop box clipped to the media box, falling back to the media box and
/// then to US Letter.
pub(crate) fn effective_view_box(doc: &LoDocument, page_id: ObjectId) -> [f32; 4] {
    let letter = Size::letter();
    let media = usable_box(doc, page_id, b"MediaBox").unwrap_or([
        0.0,
        0.0,
        letter.width.to_f32(),
        letter.height.to_f32(),
    ]);
    let Some(crop) = usable_box(doc, page_id, b"CropBox") else {
        return media;
    };
    let clipped = [
        crop[0].max(media[0]),
        crop[1].max(media[1]),
        crop[2].min(media[2]),
        crop[3].min(media[3]),
    ];
    if clipped[2] > clipped[0] && clipped[3] > clipped[1] {
        clipped
    } else {
        log::debug!("crop box does not intersect media box; using media box");
        media
    }
}

pub(crate) fn effective_rotation(doc: &LoDocument, page_id: ObjectId) -> u16 {
    let Some(raw) = inherited_attribute(doc, page_id, b"Rotate").and_then(|obj| {
        obj.as_i64()
            .ok()
            .or_else(|| obj_to_f32(obj).map(|v| v.round() as i64))
    }) else {
        return 0;
    };
    if raw % 90 != 0 {
        log::warn!("ignoring /Rotate {raw}: not a multiple of 90");
        return 0;
    }
    raw.rem_euclid(360) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfDocument;
    use crate::testing::{PdfBuilder, media_box};

    fn doc_with_page(extra: LoDictionary) -> PdfDocument {
        let mut builder = PdfBuilder::new();
        builder.add_page(b"", extra);
        PdfDocument::open(&builder.finish()).expect("open")
    }

    #[test]
    fn scale_multiplies_media_box() {
        let doc = doc_with_page(media_box(612, 792));
        let page = doc.page(1).expect("page");
        let vp = resolve_viewport(&page, 1.5).expect("viewport");
        assert_eq!((vp.width, vp.height), (918.0, 1188.0));
        assert_eq!(vp.pixel_size(), (918, 1188));
        let (x, y) = vp.transform.transform_point(0.0, 792.0);
        assert_eq!((x, y), (0.0, 0.0));
    }

    #[test]
    fn rejects_non_positive_scale() {
        let doc = doc_with_page(media_box(100, 100));
        let page = doc.page(1).expect("page");
        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                resolve_viewport(&page, scale),
                Err(SnapError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn rotation_swaps_dimensions() {
        let mut extra = media_box(200, 100);
        extra.set("Rotate", 90);
        let doc = doc_with_page(extra);
        let page = doc.page(1).expect("page");
        let vp = resolve_viewport(&page, 1.0).expect("viewport");
        assert_eq!(vp.rotation, 90);
        assert_eq!((vp.width, vp.height), (100.0, 200.0));
        // The page origin lands in the top-left corner after a quarter turn.
        let (x, y) = vp.transform.transform_point(0.0, 0.0);
        assert_eq!((x, y), (0.0, 0.0));
        let (x, y) = vp.transform.transform_point(200.0, 100.0);
        assert_eq!((x, y), (100.0, 200.0));
    }

    #[test]
    fn negative_rotation_is_normalized() {
        let mut extra = media_box(200, 100);
        extra.set("Rotate", -90);
        let doc = doc_with_page(extra);
        let vp = resolve_viewport(&doc.page(1).expect("page"), 1.0).expect("viewport");
        assert_eq!(vp.rotation, 270);
        assert_eq!((vp.width, vp.height), (100.0, 200.0));
    }

    #[test]
    fn crop_box_wins_over_media_box() {
        let mut extra = media_box(600, 800);
        extra.set(
            "CropBox",
            vec![50.into(), 100.into(), 350.into(), 500.into()],
        );
        let doc = doc_with_page(extra);
        let vp = resolve_viewport(&doc.page(1).expect("page"), 1.0).expect("viewport");
        assert_eq!((vp.width, vp.height), (300.0, 400.0));
        let (x, y) = vp.transform.transform_point(50.0, 500.0);
        assert_eq!((x, y), (0.0, 0.0));
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let mut builder = PdfBuilder::new();
        builder.add_page(b"", LoDictionary::new());
        // Attach the box to the Pages node once it is built.
        let bytes = {
            let bytes = builder.finish();
            let mut doc = lopdf::Document::load_mem(&bytes).expect("reload");
            let pages_id = doc
                .catalog()
                .and_then(|c| c.get(b"Pages"))
                .and_then(LoObject::as_reference)
                .expect("pages ref");
            if let Ok(LoObject::Dictionary(pages)) = doc.get_object_mut(pages_id) {
                pages.set("MediaBox", vec![0.into(), 0.into(), 300.into(), 144.into()]);
            }
            let mut out = Vec::new();
            doc.save_to(&mut out).expect("save");
            out
        };
        let doc = PdfDocument::open(&bytes).expect("open");
        let vp = resolve_viewport(&doc.page(1).expect("page"), 1.0).expect("viewport");
        assert_eq!((vp.width, vp.height), (300.0, 144.0));
    }

    #[test]
    fn missing_media_box_falls_back_to_letter() {
        let doc = doc_with_page(LoDictionary::new());
        let vp = resolve_viewport(&doc.page(1).expect("page"), 1.0).expect("viewport");
        assert_eq!((vp.width, vp.height), (612.0, 792.0));
    }

    #[test]
    fn user_unit_scales_the_page() {
        let mut extra = media_box(100, 50);
        extra.set("UserUnit", 2);
        let doc = doc_with_page(extra);
        let vp = resolve_viewport(&doc.page(1).expect("page"), 1.0).expect("viewport");
        assert_eq!((vp.width, vp.height), (200.0, 100.0));
        assert_eq!(vp.scale, 1.0);
    }

    #[test]
    fn fractional_sizes_round_half_away_from_zero() {
        let vp = viewport_for_box([0.0, 0.0, 100.5, 10.25], 1.0, 0);
        assert_eq!(vp.width, 100.5);
        assert_eq!(vp.pixel_size(), (101, 10));
        let tiny = viewport_for_box([0.0, 0.0, 0.2, 0.2], 1.0, 0);
        assert_eq!(tiny.pixel_size(), (1, 1));
    }
}
