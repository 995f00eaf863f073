//! Image XObject and inline image decoding into premultiplied pixmaps.

use crate::colors::ColorSpace;
use crate::error::RenderError;
use crate::filters::{decode_stream, full_filter_name};
use crate::functions::BitReader;
use crate::objects::{dict_bool, dict_f32_array, dict_get, dict_i64, resolve_object};
use crate::types::{Color, unit_to_u8};
use lopdf::{Dictionary as LoDictionary, Document as LoDocument, Object as LoObject, Stream as LoStream};
use tiny_skia::Pixmap;

const MAX_IMAGE_PIXELS: u64 = 1 << 26;

/// Decodes an image stream. `color_space` is the already-resolved
/// `/ColorSpace`; stencil masks (`/ImageMask true`) are painted with `fill`.
pub(crate) fn decode_image(
    doc: &LoDocument,
    stream: &LoStream,
    color_space: Option<&ColorSpace>,
    fill: Color,
) -> Result<Pixmap, RenderError> {
    let dict = &stream.dict;
    let (width, height) = image_size(doc, dict)?;
    let is_mask = dict_bool(doc, dict, b"ImageMask").unwrap_or(false);
    let dct = !is_mask && is_dct(stream)?;

    let mut rgba = if is_mask {
        let data = plain_samples(stream)?;
        let coverage = stencil_coverage(doc, dict, &data, width, height)?;
        let [r, g, b] = fill.to_rgb8();
        let mut out = Vec::with_capacity(coverage.len() * 4);
        for a in coverage {
            out.extend_from_slice(&[r, g, b, a]);
        }
        out
    } else if dct {
        decode_dct(&stream.content, width, height)?
    } else {
        let data = plain_samples(stream)?;
        let default_cs = ColorSpace::DeviceGray;
        let cs = color_space.unwrap_or_else(|| {
            log::debug!("image without /ColorSpace; assuming DeviceGray");
            &default_cs
        });
        decode_samples(doc, dict, cs, &data, width, height)?
    };

    if let Some(smask) = dict_get(doc, dict, b"SMask").and_then(|o| o.as_stream().ok()) {
        let (mw, mh) = image_size(doc, &smask.dict)?;
        let alpha = if is_dct(smask)? {
            decode_dct(&smask.content, mw, mh)?
                .chunks_exact(4)
                .map(|px| px[0])
                .collect()
        } else {
            let data = plain_samples(smask)?;
            gray_samples(doc, &smask.dict, &data, mw, mh)?
        };
        apply_alpha(&mut rgba, width, height, &alpha, mw, mh);
    } else if let Some(mask) = dict_get(doc, dict, b"Mask") {
        match mask {
            LoObject::Stream(mask_stream) => {
                let (mw, mh) = image_size(doc, &mask_stream.dict)?;
                let data = plain_samples(mask_stream)?;
                let alpha = stencil_coverage(doc, &mask_stream.dict, &data, mw, mh)?;
                apply_alpha(&mut rgba, width, height, &alpha, mw, mh);
            }
            LoObject::Array(ranges) if !dct => {
                let ranges: Vec<u32> = ranges
                    .iter()
                    .filter_map(|o| resolve_object(doc, o).ok()?.as_i64().ok())
                    .map(|v| v.max(0) as u32)
                    .collect();
                let data = plain_samples(stream)?;
                let cs = color_space.cloned().unwrap_or(ColorSpace::DeviceGray);
                apply_color_key(doc, dict, &cs, &data, width, height, &ranges, &mut rgba);
            }
            _ => {}
        }
    }

    rgba_to_pixmap(&rgba, width, height)
}

fn image_size(doc: &LoDocument, dict: &LoDictionary) -> Result<(u32, u32), RenderError> {
    let width = dict_i64(doc, dict, b"Width").unwrap_or(0);
    let height = dict_i64(doc, dict, b"Height").unwrap_or(0);
    if width <= 0 || height <= 0 {
        return Err(RenderError::new(format!("invalid image size {width}x{height}")));
    }
    if (width as u64) * (height as u64) > MAX_IMAGE_PIXELS {
        return Err(RenderError::new(format!("image too large: {width}x{height}")));
    }
    Ok((width as u32, height as u32))
}

fn is_dct(stream: &LoStream) -> Result<bool, RenderError> {
    let filters = stream.filters().unwrap_or_default();
    for filter in &filters {
        match *filter {
            b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode" => {
                return Err(RenderError::new(format!(
                    "unsupported image filter {}",
                    String::from_utf8_lossy(filter)
                )));
            }
            _ => {}
        }
    }
    match filters.iter().position(|f| *f == b"DCTDecode") {
        None => Ok(false),
        Some(idx) if idx == 0 && filters.len() == 1 => Ok(true),
        Some(_) => Err(RenderError::new("DCTDecode must be the only image filter")),
    }
}

fn plain_samples(stream: &LoStream) -> Result<Vec<u8>, RenderError> {
    if stream.filters().map(|f| f.is_empty()).unwrap_or(true) {
        return Ok(stream.content.clone());
    }
    decode_stream(stream)
        .map_err(|err| RenderError::new(format!("image data could not be decoded: {}", err.message)))
}

fn decode_dct(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|err| RenderError::new(format!("jpeg decode failed: {err}")))?;
    let mut rgba = decoded.to_rgba8();
    if rgba.dimensions() != (width, height) {
        log::debug!(
            "jpeg is {}x{}, dictionary says {width}x{height}",
            rgba.width(),
            rgba.height()
        );
        rgba = image::imageops::resize(&rgba, width, height, image::imageops::FilterType::Triangle);
    }
    Ok(rgba.into_raw())
}

fn bits_per_component(doc: &LoDocument, dict: &LoDictionary) -> Result<u32, RenderError> {
    let bpc = dict_i64(doc, dict, b"BitsPerComponent").unwrap_or(8);
    match bpc {
        1 | 2 | 4 | 8 | 16 => Ok(bpc as u32),
        other => Err(RenderError::new(format!("unsupported BitsPerComponent {other}"))),
    }
}

fn decode_samples(
    doc: &LoDocument,
    dict: &LoDictionary,
    cs: &ColorSpace,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RenderError> {
    let bpc = bits_per_component(doc, dict)?;
    let ncomp = cs.components().max(1);
    let decode = decode_ranges(doc, dict, cs, bpc);
    let max = ((1u64 << bpc) - 1) as f32;

    check_sample_len(data, width, height, ncomp, bpc)?;

    // Single-component images at <= 8 bits go through a lookup table.
    let lut: Option<Vec<[u8; 3]>> = (ncomp == 1 && bpc <= 8).then(|| {
        (0..=max as u32)
            .map(|s| {
                let [lo, hi] = decode.first().copied().unwrap_or([0.0, 1.0]);
                cs.to_rgb(&[lo + s as f32 * (hi - lo) / max]).to_rgb8()
            })
            .collect()
    });

    let mut out = Vec::with_capacity(width as usize * height as usize * 4);
    let mut reader = BitReader::new(data);
    let mut comps = vec![0.0f32; ncomp];
    for _ in 0..height {
        for _ in 0..width {
            let rgb = if let Some(lut) = &lut {
                let s = reader.read(bpc).unwrap_or(0) as usize;
                lut.get(s).copied().unwrap_or([0, 0, 0])
            } else {
                for (idx, slot) in comps.iter_mut().enumerate() {
                    let s = reader.read(bpc).unwrap_or(0) as f32;
                    let [lo, hi] = decode.get(idx).copied().unwrap_or([0.0, 1.0]);
                    *slot = lo + s * (hi - lo) / max;
                }
                cs.to_rgb(&comps).to_rgb8()
            };
            out.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        reader.align();
    }
    Ok(out)
}

/// Rows are byte aligned; fewer bytes than the dictionary promises is an
/// error rather than a partially blank image.
fn check_sample_len(data: &[u8], width: u32, height: u32, ncomp: usize, bpc: u32) -> Result<(), RenderError> {
    let row_bytes = (width as usize * ncomp * bpc as usize).div_ceil(8);
    let needed = row_bytes * height as usize;
    if data.len() < needed {
        return Err(RenderError::new(format!(
            "truncated image data: {} of {needed} bytes for {width}x{height}",
            data.len()
        )));
    }
    Ok(())
}

fn decode_ranges(doc: &LoDocument, dict: &LoDictionary, cs: &ColorSpace, bpc: u32) -> Vec<[f32; 2]> {
    let mut ranges = cs.default_decode(bpc);
    if let Some(values) = dict_f32_array(doc, dict, b"Decode") {
        for (slot, pair) in ranges.iter_mut().zip(values.chunks_exact(2)) {
            *slot = [pair[0], pair[1]];
        }
    }
    ranges
}

/// Alpha coverage of a 1-bit stencil: samples equal to the "paint" value
/// (0 unless `/Decode [1 0]`) are opaque.
fn stencil_coverage(
    doc: &LoDocument,
    dict: &LoDictionary,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RenderError> {
    check_sample_len(data, width, height, 1, 1)?;
    let inverted = dict_f32_array(doc, dict, b"Decode")
        .map(|d| d.first().copied().unwrap_or(0.0) > 0.5)
        .unwrap_or(false);
    let mut out = Vec::with_capacity(width as usize * height as usize);
    let mut reader = BitReader::new(data);
    for _ in 0..height {
        for _ in 0..width {
            let bit = reader.read(1).unwrap_or(1);
            let painted = (bit == 0) != inverted;
            out.push(if painted { 255 } else { 0 });
        }
        reader.align();
    }
    Ok(out)
}

fn gray_samples(
    doc: &LoDocument,
    dict: &LoDictionary,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RenderError> {
    let bpc = bits_per_component(doc, dict)?;
    check_sample_len(data, width, height, 1, bpc)?;
    let max = ((1u64 << bpc) - 1) as f32;
    let [lo, hi] = decode_ranges(doc, dict, &ColorSpace::DeviceGray, bpc)
        .first()
        .copied()
        .unwrap_or([0.0, 1.0]);
    let mut out = Vec::with_capacity(width as usize * height as usize);
    let mut reader = BitReader::new(data);
    for _ in 0..height {
        for _ in 0..width {
            let s = reader.read(bpc).unwrap_or(0) as f32;
            out.push(unit_to_u8(lo + s * (hi - lo) / max));
        }
        reader.align();
    }
    Ok(out)
}

/// Multiplies `alpha` (sampled nearest-neighbour when sizes differ) into
/// the straight-alpha `rgba` buffer.
fn apply_alpha(rgba: &mut [u8], width: u32, height: u32, alpha: &[u8], aw: u32, ah: u32) {
    for y in 0..height {
        let sy = (y as u64 * ah as u64 / height as u64) as usize;
        for x in 0..width {
            let sx = (x as u64 * aw as u64 / width as u64) as usize;
            let a = alpha.get(sy * aw as usize + sx).copied().unwrap_or(255);
            let idx = (y as usize * width as usize + x as usize) * 4 + 3;
            if let Some(slot) = rgba.get_mut(idx) {
                *slot = ((*slot as u16 * a as u16 + 127) / 255) as u8;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_color_key(
    doc: &LoDocument,
    dict: &LoDictionary,
    cs: &ColorSpace,
    data: &[u8],
    width: u32,
    height: u32,
    ranges: &[u32],
    rgba: &mut [u8],
) {
    // `data` already passed the length check in `decode_samples`.
    let Ok(bpc) = bits_per_component(doc, dict) else {
        return;
    };
    let ncomp = cs.components().max(1);
    if ranges.len() < ncomp * 2 {
        return;
    }
    let mut reader = BitReader::new(data);
    let mut pixel = 0usize;
    for _ in 0..height {
        for _ in 0..width {
            let mut keyed = true;
            for c in 0..ncomp {
                let s = reader.read(bpc).unwrap_or(0);
                if s < ranges[c * 2] || s > ranges[c * 2 + 1] {
                    keyed = false;
                }
            }
            if keyed {
                if let Some(slot) = rgba.get_mut(pixel * 4 + 3) {
                    *slot = 0;
                }
            }
            pixel += 1;
        }
        reader.align();
    }
}

fn rgba_to_pixmap(rgba: &[u8], width: u32, height: u32) -> Result<Pixmap, RenderError> {
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| RenderError::new(format!("cannot allocate {width}x{height} image")))?;
    for (src_px, dst_px) in rgba.chunks_exact(4).zip(pixmap.data_mut().chunks_exact_mut(4)) {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

/// Expands the abbreviated keys and filter names of an inline image
/// (`BI ... ID ... EI`) into a regular image stream.
pub(crate) fn normalize_inline_image(stream: &LoStream) -> LoStream {
    let mut dict = LoDictionary::new();
    for (key, value) in stream.dict.iter() {
        let full: &[u8] = match key.as_slice() {
            b"W" => b"Width",
            b"H" => b"Height",
            b"BPC" => b"BitsPerComponent",
            b"CS" => b"ColorSpace",
            b"D" => b"Decode",
            b"DP" => b"DecodeParms",
            b"F" => b"Filter",
            b"IM" => b"ImageMask",
            b"I" => b"Interpolate",
            other => other,
        };
        let value = if full == b"Filter" {
            expand_filter_names(value)
        } else {
            value.clone()
        };
        dict.set(full.to_vec(), value);
    }
    let mut out = LoStream::new(dict, stream.content.clone());
    out.allows_compression = false;
    out
}

fn expand_filter_names(value: &LoObject) -> LoObject {
    let expand = |name: &[u8]| full_filter_name(name).to_vec();
    match value {
        LoObject::Name(name) => LoObject::Name(expand(name)),
        LoObject::Array(items) => LoObject::Array(
            items
                .iter()
                .map(|item| match item {
                    LoObject::Name(name) => LoObject::Name(expand(name)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
