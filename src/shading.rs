//! Axial and radial shading dictionaries, pre-sampled into color stops.

use crate::colors::ColorSpace;
use crate::functions::Function;
use crate::objects::{dict_f32_array, dict_get, dict_i64, parse_rect_object, resolve_dict};
use crate::types::Color;
use lopdf::{Document as LoDocument, Object as LoObject};

/// Stops sampled across the function domain.
const SHADING_SAMPLES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShadingStop {
    pub(crate) offset: f32,
    pub(crate) color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ShadingGeometry {
    Axial {
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
    },
    Radial {
        x0: f32,
        y0: f32,
        r0: f32,
        x1: f32,
        y1: f32,
        r1: f32,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Shading {
    pub(crate) geometry: ShadingGeometry,
    /// Offsets are the normalized parameter `t` of the shading, 0..=1.
    pub(crate) stops: Vec<ShadingStop>,
    pub(crate) extend: [bool; 2],
    pub(crate) background: Option<Color>,
    pub(crate) bbox: Option<[f32; 4]>,
}

impl Shading {
    /// Returns `None` (after logging) for shading types other than 2 and 3
    /// or dictionaries missing required entries.
    pub(crate) fn parse(doc: &LoDocument, obj: &LoObject) -> Option<Shading> {
        let dict = resolve_dict(doc, obj)?;
        let shading_type = dict_i64(doc, dict, b"ShadingType").unwrap_or(0);
        if !matches!(shading_type, 2 | 3) {
            log::warn!("shading type {shading_type} is not supported; skipped");
            return None;
        }
        let cs = dict_get(doc, dict, b"ColorSpace").and_then(|o| ColorSpace::parse(doc, o))?;
        let coords = dict_f32_array(doc, dict, b"Coords")?;
        let geometry = match (shading_type, coords.as_slice()) {
            (2, [x0, y0, x1, y1, ..]) => ShadingGeometry::Axial {
                x0: *x0,
                y0: *y0,
                x1: *x1,
                y1: *y1,
            },
            (3, [x0, y0, r0, x1, y1, r1, ..]) => ShadingGeometry::Radial {
                x0: *x0,
                y0: *y0,
                r0: r0.max(0.0),
                x1: *x1,
                y1: *y1,
                r1: r1.max(0.0),
            },
            _ => {
                log::warn!("shading Coords too short");
                return None;
            }
        };
        let function = dict_get(doc, dict, b"Function").and_then(|o| Function::parse(doc, o))?;
        let domain = dict_f32_array(doc, dict, b"Domain")
            .filter(|d| d.len() >= 2)
            .map(|d| [d[0], d[1]])
            .unwrap_or([0.0, 1.0]);

        let stops = (0..=SHADING_SAMPLES)
            .map(|idx| {
                let offset = idx as f32 / SHADING_SAMPLES as f32;
                let t = domain[0] + offset * (domain[1] - domain[0]);
                ShadingStop {
                    offset,
                    color: cs.to_rgb(&function.evaluate(&[t])),
                }
            })
            .collect();

        let extend = match dict_get(doc, dict, b"Extend").and_then(|o| o.as_array().ok()) {
            Some(items) => [
                items.first().and_then(|o| o.as_bool().ok()).unwrap_or(false),
                items.get(1).and_then(|o| o.as_bool().ok()).unwrap_or(false),
            ],
            None => [false, false],
        };
        let background = dict_f32_array(doc, dict, b"Background").map(|comps| cs.to_rgb(&comps));
        let bbox = dict
            .get(b"BBox")
            .ok()
            .and_then(|o| parse_rect_object(doc, o));

        Some(Shading {
            geometry,
            stops,
            extend,
            background,
            bbox,
        })
    }
}
