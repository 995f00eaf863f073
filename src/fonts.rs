//! PDF font resources: character codes, widths and glyph outlines.
//!
//! Glyph programs come from embedded TrueType/OpenType data when
//! `ttf-parser` can read it, otherwise from a substitute system font.
//! Type3 fonts hand back their glyph procedures for the interpreter to run
//! against the font's own `/Resources`.

use crate::cmap::CMap;
use crate::encoding::{BaseEncoding, glyph_name_to_unicode};
use crate::filters::decode_stream;
use crate::objects::{
    dict_get, dict_i64, dict_name, name_bytes_to_string, obj_to_f32, parse_matrix_object,
    resolve_dict, resolve_object,
};
use crate::system_fonts::{resolve_substitute_font, strip_pdf_subset_prefix};
use crate::types::Matrix;
use lopdf::{Dictionary as LoDictionary, Document as LoDocument, Object as LoObject, ObjectId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tiny_skia::{Path, PathBuilder};
use ttf_parser::{Face, GlyphId, OutlineBuilder, PlatformId};

const FLAG_FIXED_PITCH: i64 = 1;
const FLAG_SERIF: i64 = 1 << 1;
const FLAG_SYMBOLIC: i64 = 1 << 2;

const DEFAULT_SIMPLE_WIDTH: f32 = 500.0;
const DEFAULT_CID_WIDTH: f32 = 1000.0;

pub(crate) struct PdfFont {
    pub(crate) base_font: String,
    kind: FontKind,
    widths: HashMap<u32, f32>,
    widths_declared: bool,
    default_width: f32,
    to_unicode: Option<CMap>,
    program: Option<FontProgram>,
    glyph_cache: Mutex<HashMap<u32, Option<Arc<Path>>>>,
}

struct FontProgram {
    data: Arc<Vec<u8>>,
    embedded: bool,
}

enum FontKind {
    Simple {
        names: Vec<Option<String>>,
        symbolic: bool,
    },
    Composite {
        cmap: CMap,
        cid_to_gid: Option<Vec<u16>>,
    },
    Type3(Type3Font),
}

pub(crate) struct Type3Font {
    names: Vec<Option<String>>,
    pub(crate) matrix: Matrix,
    char_procs: HashMap<String, ObjectId>,
}

impl Type3Font {
    pub(crate) fn char_proc(&self, code: u32) -> Option<ObjectId> {
        let name = self.names.get(code as usize)?.as_ref()?;
        self.char_procs.get(name).copied()
    }
}

impl PdfFont {
    /// Builds a font from a font resource. Never fails: unusable entries
    /// degrade to defaults and a substitute glyph program.
    pub(crate) fn load(doc: &LoDocument, obj: &LoObject) -> PdfFont {
        let Some(dict) = resolve_dict(doc, obj) else {
            log::warn!("font resource is not a dictionary; using Helvetica");
            return PdfFont::fallback("Helvetica");
        };
        let subtype = dict_name(doc, dict, b"Subtype").unwrap_or_default();
        let base_font = dict_name(doc, dict, b"BaseFont")
            .map(|name| strip_pdf_subset_prefix(&name).to_string())
            .unwrap_or_else(|| "Helvetica".to_string());
        let to_unicode = dict_get(doc, dict, b"ToUnicode")
            .and_then(|o| o.as_stream().ok())
            .and_then(|s| decode_stream(s).ok())
            .map(|data| CMap::parse(&data));

        let font = match subtype.as_str() {
            "Type0" => load_composite(doc, dict, base_font, to_unicode),
            "Type3" => load_type3(doc, dict, base_font, to_unicode),
            _ => load_simple(doc, dict, base_font, to_unicode),
        };
        log::debug!(
            "loaded {subtype} font {} (program: {})",
            font.base_font,
            match &font.program {
                Some(p) if p.embedded => "embedded",
                Some(_) => "substitute",
                None => "none",
            }
        );
        font
    }

    pub(crate) fn fallback(name: &str) -> PdfFont {
        PdfFont {
            base_font: name.to_string(),
            kind: FontKind::Simple {
                names: standard_names(BaseEncoding::Standard),
                symbolic: false,
            },
            widths: HashMap::new(),
            widths_declared: false,
            default_width: DEFAULT_SIMPLE_WIDTH,
            to_unicode: None,
            program: substitute_program(name, 0),
            glyph_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Splits a string operand into `(code, byte_len)` pairs.
    pub(crate) fn codes(&self, bytes: &[u8]) -> Vec<(u32, usize)> {
        match &self.kind {
            FontKind::Composite { cmap, .. } => {
                let mut out = Vec::new();
                let mut pos = 0usize;
                while pos < bytes.len() {
                    let (code, len) = cmap.next_code(bytes, pos);
                    out.push((code, len));
                    pos += len;
                }
                out
            }
            _ => bytes.iter().map(|b| (*b as u32, 1)).collect(),
        }
    }

    pub(crate) fn type3(&self) -> Option<&Type3Font> {
        match &self.kind {
            FontKind::Type3(t3) => Some(t3),
            _ => None,
        }
    }

    /// Horizontal advance of `code` in text space units for a 1pt font.
    pub(crate) fn advance(&self, code: u32) -> f32 {
        if let FontKind::Type3(t3) = &self.kind {
            let width = self.widths.get(&code).copied().unwrap_or(0.0);
            return width * t3.matrix.a;
        }
        let key = match &self.kind {
            FontKind::Composite { cmap, .. } => cmap.cid(code),
            _ => code,
        };
        if let Some(width) = self.widths.get(&key) {
            return width / 1000.0;
        }
        if self.widths_declared || matches!(self.kind, FontKind::Composite { .. }) {
            return self.default_width / 1000.0;
        }
        self.program_advance(code)
            .unwrap_or(self.default_width / 1000.0)
    }

    /// Outline of `code` in text space units for a 1pt font, baseline at
    /// the origin.
    pub(crate) fn glyph_outline(&self, code: u32) -> Option<Arc<Path>> {
        if let Ok(cache) = self.glyph_cache.lock() {
            if let Some(entry) = cache.get(&code) {
                return entry.clone();
            }
        }
        let outline = self.build_outline(code).map(Arc::new);
        if let Ok(mut cache) = self.glyph_cache.lock() {
            cache.insert(code, outline.clone());
        }
        outline
    }

    fn build_outline(&self, code: u32) -> Option<Path> {
        let program = self.program.as_ref()?;
        let face = Face::parse(&program.data, 0).ok()?;
        let gid = self.glyph_id(&face, program.embedded, code)?;
        let scale = 1.0 / face.units_per_em().max(1) as f32;
        let mut builder = GlyphPathBuilder::new(scale);
        face.outline_glyph(gid, &mut builder)?;
        builder.finish()
    }

    fn program_advance(&self, code: u32) -> Option<f32> {
        let program = self.program.as_ref()?;
        let face = Face::parse(&program.data, 0).ok()?;
        let gid = self.glyph_id(&face, program.embedded, code)?;
        let advance = face.glyph_hor_advance(gid)? as f32;
        Some(advance / face.units_per_em().max(1) as f32)
    }

    fn unicode_for(&self, code: u32) -> Option<char> {
        if let Some(text) = self.to_unicode.as_ref().and_then(|c| c.unicode(code)) {
            if let Some(ch) = text.chars().next() {
                return Some(ch);
            }
        }
        if let FontKind::Simple { names, .. } = &self.kind {
            if let Some(Some(name)) = names.get(code as usize) {
                return glyph_name_to_unicode(name);
            }
        }
        None
    }

    fn glyph_id(&self, face: &Face<'_>, embedded: bool, code: u32) -> Option<GlyphId> {
        match &self.kind {
            FontKind::Type3(_) => None,
            FontKind::Composite { cmap, cid_to_gid } => {
                if embedded {
                    let cid = cmap.cid(code);
                    let gid = match cid_to_gid {
                        Some(table) => *table.get(cid as usize)?,
                        None => u16::try_from(cid).ok()?,
                    };
                    return Some(GlyphId(gid));
                }
                self.unicode_for(code).and_then(|ch| face.glyph_index(ch))
            }
            FontKind::Simple { names, symbolic } => {
                if !embedded {
                    let ch = self
                        .unicode_for(code)
                        .or_else(|| char::from_u32(code).filter(|c| !c.is_control()))?;
                    return face.glyph_index(ch);
                }
                let name = names.get(code as usize).and_then(|n| n.as_deref());
                if !*symbolic {
                    if let Some(name) = name {
                        if let Some(gid) = glyph_name_to_unicode(name).and_then(|ch| face.glyph_index(ch)) {
                            return Some(gid);
                        }
                        if let Some(gid) = face.glyph_index_by_name(name) {
                            return Some(gid);
                        }
                    }
                }
                symbolic_cmap_lookup(face, code).or_else(|| {
                    name.and_then(|n| face.glyph_index_by_name(n))
                })
            }
        }
    }
}

/// (3,0) symbol subtables index codes in the private use area; (1,0) uses
/// the raw byte.
fn symbolic_cmap_lookup(face: &Face<'_>, code: u32) -> Option<GlyphId> {
    let cmap = face.tables().cmap?;
    for subtable in cmap.subtables {
        if subtable.platform_id == PlatformId::Windows && subtable.encoding_id == 0 {
            for base in [0u32, 0xF000, 0xF100, 0xF200] {
                if let Some(gid) = subtable.glyph_index(base + code) {
                    return Some(gid);
                }
            }
        }
    }
    for subtable in cmap.subtables {
        if subtable.platform_id == PlatformId::Macintosh && subtable.encoding_id == 0 {
            if let Some(gid) = subtable.glyph_index(code) {
                return Some(gid);
            }
        }
    }
    None
}

fn font_flags(doc: &LoDocument, descriptor: Option<&LoDictionary>) -> i64 {
    descriptor
        .and_then(|d| dict_i64(doc, d, b"Flags"))
        .unwrap_or(0)
}

fn embedded_program(doc: &LoDocument, descriptor: Option<&LoDictionary>) -> Option<FontProgram> {
    let descriptor = descriptor?;
    for key in [b"FontFile2".as_slice(), b"FontFile3".as_slice(), b"FontFile".as_slice()] {
        let Some(stream) = dict_get(doc, descriptor, key).and_then(|o| o.as_stream().ok()) else {
            continue;
        };
        let Ok(data) = decode_stream(stream) else {
            log::warn!("embedded font stream could not be decoded");
            continue;
        };
        if data.is_empty() {
            continue;
        }
        if Face::parse(&data, 0).is_ok() {
            return Some(FontProgram {
                data: Arc::new(data),
                embedded: true,
            });
        }
        log::debug!(
            "embedded {} program is not sfnt; using a substitute",
            String::from_utf8_lossy(key)
        );
    }
    None
}

fn substitute_program(base_font: &str, flags: i64) -> Option<FontProgram> {
    resolve_substitute_font(
        base_font,
        flags & FLAG_SERIF != 0,
        flags & FLAG_FIXED_PITCH != 0,
    )
    .map(|data| FontProgram {
        data,
        embedded: false,
    })
}

fn descriptor<'a>(doc: &'a LoDocument, dict: &'a LoDictionary) -> Option<&'a LoDictionary> {
    dict.get(b"FontDescriptor")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
}

fn load_simple(
    doc: &LoDocument,
    dict: &LoDictionary,
    base_font: String,
    to_unicode: Option<CMap>,
) -> PdfFont {
    let descriptor = descriptor(doc, dict);
    let flags = font_flags(doc, descriptor);
    let builtin_symbol = matches!(base_font.as_str(), "Symbol" | "ZapfDingbats");
    let symbolic = flags & FLAG_SYMBOLIC != 0 || builtin_symbol;

    let encoding = dict_get(doc, dict, b"Encoding");
    let names = simple_font_names(doc, encoding, symbolic);
    let (widths, declared) = simple_font_widths(doc, dict);
    let default_width = descriptor
        .and_then(|d| dict_get(doc, d, b"MissingWidth"))
        .and_then(obj_to_f32)
        .map(|w| w.max(0.0))
        .unwrap_or(DEFAULT_SIMPLE_WIDTH);
    let program = embedded_program(doc, descriptor).or_else(|| substitute_program(&base_font, flags));

    PdfFont {
        base_font,
        kind: FontKind::Simple { names, symbolic },
        widths,
        widths_declared: declared,
        default_width,
        to_unicode,
        program,
        glyph_cache: Mutex::new(HashMap::new()),
    }
}

fn load_type3(
    doc: &LoDocument,
    dict: &LoDictionary,
    base_font: String,
    to_unicode: Option<CMap>,
) -> PdfFont {
    let names = simple_font_names(doc, dict_get(doc, dict, b"Encoding"), true);
    let (widths, declared) = simple_font_widths(doc, dict);
    let matrix = dict
        .get(b"FontMatrix")
        .ok()
        .and_then(|o| parse_matrix_object(doc, o))
        .unwrap_or_else(|| Matrix::scale(0.001, 0.001));
    let mut char_procs = HashMap::new();
    if let Some(procs) = dict.get(b"CharProcs").ok().and_then(|o| resolve_dict(doc, o)) {
        for (name, value) in procs.iter() {
            if let LoObject::Reference(id) = value {
                char_procs.insert(name_bytes_to_string(name), *id);
            }
        }
    }

    PdfFont {
        base_font,
        kind: FontKind::Type3(Type3Font {
            names,
            matrix,
            char_procs,
        }),
        widths,
        widths_declared: declared,
        default_width: 0.0,
        to_unicode,
        program: None,
        glyph_cache: Mutex::new(HashMap::new()),
    }
}

fn load_composite(
    doc: &LoDocument,
    dict: &LoDictionary,
    base_font: String,
    to_unicode: Option<CMap>,
) -> PdfFont {
    let cmap = match dict_get(doc, dict, b"Encoding") {
        Some(LoObject::Name(name)) => match name.as_slice() {
            b"Identity-H" => CMap::identity(false),
            b"Identity-V" => CMap::identity(true),
            other => {
                log::warn!(
                    "predefined CMap {} is not bundled; reading codes as Identity-H",
                    String::from_utf8_lossy(other)
                );
                CMap::identity(false)
            }
        },
        Some(LoObject::Stream(stream)) => match decode_stream(stream) {
            Ok(data) => CMap::parse(&data),
            Err(err) => {
                log::warn!("embedded CMap could not be decoded: {}", err.message);
                CMap::identity(false)
            }
        },
        _ => CMap::identity(false),
    };
    if cmap.vertical {
        log::debug!("vertical writing in {base_font} is laid out horizontally");
    }

    let descendant = dict_get(doc, dict, b"DescendantFonts")
        .and_then(|o| o.as_array().ok())
        .and_then(|arr| arr.first())
        .and_then(|o| resolve_dict(doc, o));

    let mut default_width = DEFAULT_CID_WIDTH;
    let mut widths = HashMap::new();
    let mut cid_to_gid = None;
    let mut descriptor_dict = None;
    if let Some(descendant) = descendant {
        if let Some(dw) = dict_get(doc, descendant, b"DW").and_then(obj_to_f32) {
            default_width = dw.max(0.0);
        }
        if let Some(w) = descendant.get(b"W").ok() {
            widths = parse_cid_font_widths(doc, w);
        }
        if let Some(LoObject::Stream(stream)) = dict_get(doc, descendant, b"CIDToGIDMap") {
            if let Ok(data) = decode_stream(stream) {
                cid_to_gid = Some(
                    data.chunks_exact(2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect(),
                );
            }
        }
        descriptor_dict = descriptor(doc, descendant);
    }
    let flags = font_flags(doc, descriptor_dict);
    let program = embedded_program(doc, descriptor_dict).or_else(|| {
        if to_unicode.as_ref().is_some_and(CMap::has_unicode) {
            substitute_program(&base_font, flags)
        } else {
            log::warn!("font {base_font} has no embedded program and no ToUnicode map");
            None
        }
    });

    PdfFont {
        base_font,
        kind: FontKind::Composite { cmap, cid_to_gid },
        widths,
        widths_declared: true,
        default_width,
        to_unicode,
        program,
        glyph_cache: Mutex::new(HashMap::new()),
    }
}

fn standard_names(base: BaseEncoding) -> Vec<Option<String>> {
    (0..=255u8)
        .map(|code| base.glyph_name(code).map(str::to_string))
        .collect()
}

/// Code to glyph-name table from `/Encoding`: a base encoding plus any
/// `Differences`. Symbolic fonts without a base encoding start empty.
fn simple_font_names(doc: &LoDocument, encoding: Option<&LoObject>, symbolic: bool) -> Vec<Option<String>> {
    let default_base = (!symbolic).then_some(BaseEncoding::Standard);
    match encoding {
        Some(LoObject::Name(name)) => {
            standard_names_or_empty(BaseEncoding::from_name(name).or(default_base))
        }
        Some(LoObject::Dictionary(enc)) => {
            let base = dict_name(doc, enc, b"BaseEncoding")
                .and_then(|n| BaseEncoding::from_name(n.as_bytes()))
                .or(default_base);
            let mut names = standard_names_or_empty(base);
            if let Some(diffs) = dict_get(doc, enc, b"Differences").and_then(|o| o.as_array().ok()) {
                apply_differences(doc, &mut names, diffs);
            }
            names
        }
        _ => standard_names_or_empty(default_base),
    }
}

fn standard_names_or_empty(base: Option<BaseEncoding>) -> Vec<Option<String>> {
    match base {
        Some(base) => standard_names(base),
        None => vec![None; 256],
    }
}

fn apply_differences(doc: &LoDocument, names: &mut [Option<String>], diffs: &[LoObject]) {
    let mut code = 0usize;
    for item in diffs {
        let Ok(item) = resolve_object(doc, item) else {
            continue;
        };
        match item {
            LoObject::Integer(start) => code = (*start).clamp(0, 255) as usize,
            LoObject::Name(name) => {
                if let Some(slot) = names.get_mut(code) {
                    *slot = Some(name_bytes_to_string(name));
                }
                code += 1;
            }
            _ => {}
        }
    }
}

fn simple_font_widths(doc: &LoDocument, dict: &LoDictionary) -> (HashMap<u32, f32>, bool) {
    let first_char = dict_i64(doc, dict, b"FirstChar").unwrap_or(0).max(0) as u32;
    let mut widths = HashMap::new();
    let Some(width_arr) = dict_get(doc, dict, b"Widths").and_then(|o| o.as_array().ok()) else {
        return (widths, false);
    };
    for (idx, width_obj) in width_arr.iter().enumerate() {
        let Some(width) = resolve_object(doc, width_obj).ok().and_then(obj_to_f32) else {
            continue;
        };
        widths.insert(first_char + idx as u32, width);
    }
    (widths, true)
}

/// `W` arrays mix `c [w1 w2 ...]` and `c_first c_last w` entries.
fn parse_cid_font_widths(doc: &LoDocument, obj: &LoObject) -> HashMap<u32, f32> {
    let mut out = HashMap::new();
    let Some(items) = resolve_object(doc, obj).ok().and_then(|o| o.as_array().ok()) else {
        return out;
    };
    let number = |obj: &LoObject| resolve_object(doc, obj).ok().and_then(obj_to_f32);

    let mut idx = 0usize;
    while idx + 1 < items.len() {
        let Some(start) = number(&items[idx]) else {
            idx += 1;
            continue;
        };
        let start = start.max(0.0) as u32;
        let next = match resolve_object(doc, &items[idx + 1]) {
            Ok(obj) => obj,
            Err(_) => {
                idx += 1;
                continue;
            }
        };
        if let Ok(list) = next.as_array() {
            for (offset, width_obj) in list.iter().enumerate() {
                if let Some(width) = number(width_obj) {
                    out.insert(start + offset as u32, width.max(0.0));
                }
            }
            idx += 2;
            continue;
        }
        let (Some(end), Some(width)) = (number(next), items.get(idx + 2).and_then(number)) else {
            idx += 3;
            continue;
        };
        let end = (end.max(0.0) as u32).min(start.saturating_add(0xFFFF));
        for cid in start..=end {
            out.insert(cid, width.max(0.0));
        }
        idx += 3;
    }
    out
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x * self.scale, y * self.scale);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x * self.scale, y * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let s = self.scale;
        self.builder.quad_to(x1 * s, y1 * s, x * s, y * s);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let s = self.scale;
        self.builder
            .cubic_to(x1 * s, y1 * s, x2 * s, y2 * s, x * s, y * s);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PdfBuilder, add_box_truetype_font, add_box_type3_font};
    use lopdf::{Stream as LoStream, dictionary};

    #[test]
    fn simple_font_applies_differences_and_widths() {
        let mut doc = LoDocument::with_version("1.7");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ABCDEF+Helvetica",
            "FirstChar" => 65,
            "LastChar" => 66,
            "Widths" => vec![722.into(), 667.into()],
            "Encoding" => dictionary! {
                "BaseEncoding" => "WinAnsiEncoding",
                "Differences" => vec![66.into(), LoObject::Name(b"Euro".to_vec())],
            },
        });
        let font = PdfFont::load(&doc, &LoObject::Reference(font_id));
        assert_eq!(font.base_font, "Helvetica");
        assert!((font.advance(65) - 0.722).abs() < 1e-6);
        assert!((font.advance(66) - 0.667).abs() < 1e-6);
        assert!((font.advance(67) - 0.5).abs() < 1e-6);
        assert_eq!(font.unicode_for(65), Some('A'));
        assert_eq!(font.unicode_for(66), Some('\u{20AC}'));
        assert_eq!(font.codes(b"AB"), vec![(65, 1), (66, 1)]);
    }

    #[test]
    fn type3_font_maps_codes_to_char_procs() {
        let mut builder = PdfBuilder::new();
        let font_id = add_box_type3_font(&mut builder);
        let font = PdfFont::load(&builder.doc, &LoObject::Reference(font_id));
        let t3 = font.type3().expect("type3");
        assert!(t3.char_proc(65).is_some());
        assert!(t3.char_proc(66).is_some());
        assert!(t3.char_proc(67).is_none());
        assert!((font.advance(65) - 0.6).abs() < 1e-6);
        assert!((font.advance(66) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn composite_font_reads_two_byte_codes_and_cid_widths() {
        let mut doc = LoDocument::with_version("1.7");
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "NoSuchFont",
            "DW" => 800,
            "W" => vec![
                3.into(), LoObject::Array(vec![250.into(), 300.into()]),
                10.into(), 12.into(), 444.into(),
            ],
        });
        let to_unicode = doc.add_object(LoStream::new(
            LoDictionary::new(),
            b"1 begincodespacerange <0000> <FFFF> endcodespacerange\n1 beginbfchar <0003> <0041> endbfchar".to_vec(),
        ));
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "NoSuchFont",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![LoObject::Reference(descendant)],
            "ToUnicode" => to_unicode,
        });
        let font = PdfFont::load(&doc, &LoObject::Reference(font_id));
        assert_eq!(font.codes(&[0x00, 0x03, 0x00, 0x0B]), vec![(3, 2), (11, 2)]);
        assert!((font.advance(3) - 0.25).abs() < 1e-6);
        assert!((font.advance(4) - 0.3).abs() < 1e-6);
        assert!((font.advance(11) - 0.444).abs() < 1e-6);
        assert!((font.advance(20) - 0.8).abs() < 1e-6);
        assert_eq!(font.unicode_for(3), Some('A'));
    }

    #[test]
    fn embedded_truetype_resolves_glyphs_through_the_unicode_cmap() {
        let mut builder = PdfBuilder::new();
        let font_id = add_box_truetype_font(&mut builder, false);
        let font = PdfFont::load(&builder.doc, &LoObject::Reference(font_id));

        // No /Widths, so advances come from hmtx.
        assert!((font.advance(65) - 0.6).abs() < 1e-6);
        assert!((font.advance(66) - 0.3).abs() < 1e-6);

        let a = font.glyph_outline(65).expect("A outline").bounds();
        assert!(a.left().abs() < 1e-6 && a.top().abs() < 1e-6);
        assert!((a.right() - 0.6).abs() < 1e-6 && (a.bottom() - 0.6).abs() < 1e-6);
        let b = font.glyph_outline(66).expect("B outline").bounds();
        assert!((b.width() - 0.3).abs() < 1e-6);
        assert!(font.glyph_outline(67).is_none());
    }

    #[test]
    fn symbolic_truetype_codes_use_the_symbol_cmap_range() {
        let mut builder = PdfBuilder::new();
        let font_id = add_box_truetype_font(&mut builder, true);
        let font = PdfFont::load(&builder.doc, &LoObject::Reference(font_id));

        let b = font.glyph_outline(66).expect("B outline").bounds();
        assert!((b.width() - 0.3).abs() < 1e-6);
        assert!((font.advance(65) - 0.6).abs() < 1e-6);
        assert!(font.glyph_outline(67).is_none());
    }

    #[test]
    fn symbolic_font_without_encoding_has_no_names() {
        let doc = LoDocument::with_version("1.7");
        let names = simple_font_names(&doc, None, true);
        assert!(names.iter().all(Option::is_none));
        let names = simple_font_names(&doc, None, false);
        assert_eq!(names[65].as_deref(), Some("A"));
    }

    #[test]
    fn non_dictionary_font_falls_back() {
        let doc = LoDocument::with_version("1.7");
        let font = PdfFont::load(&doc, &LoObject::Integer(3));
        assert_eq!(font.base_font, "Helvetica");
        assert!(font.type3().is_none());
    }
}
