use crate::filters::decode_stream;
use crate::functions::Function;
use crate::objects::{dict_f32_array, dict_get, dict_i64, resolve_object};
use crate::types::Color;
use lopdf::{Document as LoDocument, Object as LoObject};
use std::sync::Arc;

const MAX_COLOR_SPACE_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub(crate) enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Lab {
        white: [f32; 3],
        range: [f32; 4],
    },
    Indexed {
        base: Box<ColorSpace>,
        hival: u32,
        lookup: Arc<Vec<u8>>,
    },
    /// Separation and DeviceN: `n` tint components mapped into the
    /// alternate space.
    Tinted {
        n: usize,
        alternate: Box<ColorSpace>,
        tint: Arc<Function>,
    },
    Pattern {
        underlying: Option<Box<ColorSpace>>,
    },
}

impl ColorSpace {
    /// Parses a device name or a color space array. Resource names must be
    /// resolved by the caller.
    pub(crate) fn parse(doc: &LoDocument, obj: &LoObject) -> Option<ColorSpace> {
        parse_color_space(doc, obj, 0)
    }

    pub(crate) fn from_name(name: &[u8]) -> Option<ColorSpace> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Some(ColorSpace::DeviceGray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(ColorSpace::DeviceRgb),
            b"DeviceCMYK" | b"CMYK" => Some(ColorSpace::DeviceCmyk),
            b"Pattern" => Some(ColorSpace::Pattern { underlying: None }),
            _ => None,
        }
    }

    pub(crate) fn components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRgb | ColorSpace::Lab { .. } => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::Indexed { .. } => 1,
            ColorSpace::Tinted { n, .. } => *n,
            ColorSpace::Pattern { underlying } => {
                underlying.as_ref().map(|cs| cs.components()).unwrap_or(0)
            }
        }
    }

    pub(crate) fn initial_components(&self) -> Vec<f32> {
        match self {
            ColorSpace::DeviceGray | ColorSpace::Indexed { .. } => vec![0.0],
            ColorSpace::DeviceRgb => vec![0.0; 3],
            ColorSpace::DeviceCmyk => vec![0.0, 0.0, 0.0, 1.0],
            ColorSpace::Lab { range, .. } => vec![
                0.0,
                0.0f32.clamp(range[0], range[1]),
                0.0f32.clamp(range[2], range[3]),
            ],
            ColorSpace::Tinted { n, .. } => vec![1.0; *n],
            ColorSpace::Pattern { .. } => Vec::new(),
        }
    }

    /// Default `/Decode` ranges for image samples of `bpc` bits.
    pub(crate) fn default_decode(&self, bpc: u32) -> Vec<[f32; 2]> {
        match self {
            ColorSpace::Indexed { .. } => vec![[0.0, ((1u32 << bpc.min(16)) - 1) as f32]],
            ColorSpace::Lab { range, .. } => {
                vec![[0.0, 100.0], [range[0], range[1]], [range[2], range[3]]]
            }
            other => vec![[0.0, 1.0]; other.components().max(1)],
        }
    }

    pub(crate) fn to_rgb(&self, comps: &[f32]) -> Color {
        let c = |idx: usize| comps.get(idx).copied().unwrap_or(0.0);
        match self {
            ColorSpace::DeviceGray => Color::gray(c(0)),
            ColorSpace::DeviceRgb => Color::rgb(c(0), c(1), c(2)),
            ColorSpace::DeviceCmyk => {
                let (r, g, b) = cmyk_to_rgb(c(0), c(1), c(2), c(3));
                Color::rgb(r, g, b)
            }
            ColorSpace::Lab { white, range } => lab_to_rgb(
                c(0).clamp(0.0, 100.0),
                c(1).clamp(range[0], range[1]),
                c(2).clamp(range[2], range[3]),
                *white,
            ),
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let idx = (c(0).round().max(0.0) as u32).min(*hival) as usize;
                let n = base.components();
                let start = idx * n;
                let Some(entry) = lookup.get(start..start + n) else {
                    return Color::BLACK;
                };
                let base_comps: Vec<f32> = entry
                    .iter()
                    .zip(base.default_decode(8))
                    .map(|(v, [lo, hi])| lo + (*v as f32 / 255.0) * (hi - lo))
                    .collect();
                base.to_rgb(&base_comps)
            }
            ColorSpace::Tinted {
                alternate, tint, ..
            } => {
                let out = tint.evaluate(comps);
                alternate.to_rgb(&out)
            }
            ColorSpace::Pattern { underlying } => underlying
                .as_ref()
                .map(|cs| cs.to_rgb(comps))
                .unwrap_or(Color::BLACK),
        }
    }
}

fn parse_color_space(doc: &LoDocument, obj: &LoObject, depth: usize) -> Option<ColorSpace> {
    if depth > MAX_COLOR_SPACE_DEPTH {
        return None;
    }
    let resolved = resolve_object(doc, obj).ok()?;
    let arr = match resolved {
        LoObject::Name(name) => return ColorSpace::from_name(name),
        LoObject::Array(arr) => arr,
        _ => return None,
    };
    let family = resolve_object(doc, arr.first()?).ok()?.as_name().ok()?;
    match family {
        b"DeviceGray" | b"DeviceRGB" | b"DeviceCMYK" | b"CalGray" | b"CalRGB" | b"G"
        | b"RGB" | b"CMYK" => ColorSpace::from_name(family),
        b"ICCBased" => {
            let stream = resolve_object(doc, arr.get(1)?).ok()?.as_stream().ok()?;
            if let Some(alt) = dict_get(doc, &stream.dict, b"Alternate")
                .and_then(|alt| parse_color_space(doc, alt, depth + 1))
            {
                return Some(alt);
            }
            match dict_i64(doc, &stream.dict, b"N") {
                Some(1) => Some(ColorSpace::DeviceGray),
                Some(4) => Some(ColorSpace::DeviceCmyk),
                _ => Some(ColorSpace::DeviceRgb),
            }
        }
        b"Lab" => {
            let dict = resolve_object(doc, arr.get(1)?).ok()?.as_dict().ok()?;
            let white = dict_f32_array(doc, dict, b"WhitePoint")
                .filter(|v| v.len() >= 3)
                .map(|v| [v[0], v[1], v[2]])
                .unwrap_or([0.9505, 1.0, 1.089]);
            let range = dict_f32_array(doc, dict, b"Range")
                .filter(|v| v.len() >= 4)
                .map(|v| [v[0], v[1], v[2], v[3]])
                .unwrap_or([-100.0, 100.0, -100.0, 100.0]);
            Some(ColorSpace::Lab { white, range })
        }
        b"Indexed" | b"I" => {
            let base = parse_color_space(doc, arr.get(1)?, depth + 1)?;
            let hival = resolve_object(doc, arr.get(2)?).ok()?.as_i64().ok()?;
            let lookup = match resolve_object(doc, arr.get(3)?).ok()? {
                LoObject::String(bytes, _) => bytes.clone(),
                LoObject::Stream(stream) => decode_stream(stream).ok()?,
                _ => return None,
            };
            Some(ColorSpace::Indexed {
                base: Box::new(base),
                hival: hival.clamp(0, 255) as u32,
                lookup: Arc::new(lookup),
            })
        }
        b"Separation" => {
            let alternate = parse_color_space(doc, arr.get(2)?, depth + 1)?;
            let tint = Function::parse(doc, arr.get(3)?)?;
            Some(ColorSpace::Tinted {
                n: 1,
                alternate: Box::new(alternate),
                tint: Arc::new(tint),
            })
        }
        b"DeviceN" => {
            let names = resolve_object(doc, arr.get(1)?).ok()?.as_array().ok()?;
            let alternate = parse_color_space(doc, arr.get(2)?, depth + 1)?;
            let tint = Function::parse(doc, arr.get(3)?)?;
            Some(ColorSpace::Tinted {
                n: names.len().max(1),
                alternate: Box::new(alternate),
                tint: Arc::new(tint),
            })
        }
        b"Pattern" => {
            let underlying = arr
                .get(1)
                .and_then(|base| parse_color_space(doc, base, depth + 1))
                .map(Box::new);
            Some(ColorSpace::Pattern { underlying })
        }
        other => {
            log::warn!(
                "unsupported color space {}",
                String::from_utf8_lossy(other)
            );
            None
        }
    }
}

pub(crate) fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> (f32, f32, f32) {
    let c = c.clamp(0.0, 1.0);
    let m = m.clamp(0.0, 1.0);
    let y = y.clamp(0.0, 1.0);
    let k = k.clamp(0.0, 1.0);
    let r = (1.0 - c) * (1.0 - k);
    let g = (1.0 - m) * (1.0 - k);
    let b = (1.0 - y) * (1.0 - k);
    (r, g, b)
}

fn lab_to_rgb(l: f32, a: f32, b: f32, white: [f32; 3]) -> Color {
    fn g(x: f32) -> f32 {
        if x >= 6.0 / 29.0 {
            x * x * x
        } else {
            (108.0 / 841.0) * (x - 4.0 / 29.0)
        }
    }
    let m = (l + 16.0) / 116.0;
    let x = white[0] * g(m + a / 500.0);
    let y = white[1] * g(m);
    let z = white[2] * g(m - b / 200.0);

    // XYZ to linear sRGB.
    let r = 3.2406 * x - 1.5372 * y - 0.4986 * z;
    let gr = -0.9689 * x + 1.8758 * y + 0.0415 * z;
    let bl = 0.0557 * x - 0.2040 * y + 1.0570 * z;
    Color::rgb(srgb_gamma(r), srgb_gamma(gr), srgb_gamma(bl))
}

fn srgb_gamma(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}
