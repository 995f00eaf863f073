//! Walks page content streams and lowers PDF operators into the display
//! list. Form XObjects, tiling pattern cells, Type3 glyph procedures and
//! annotation appearances are interpreted recursively.

use crate::colors::ColorSpace;
use crate::display::{Command, Ink, TilingCell};
use crate::document::PageHandle;
use crate::error::RenderError;
use crate::filters::decode_stream;
use crate::fonts::PdfFont;
use crate::geometry::{inherited_attribute, page_dict};
use crate::images::{decode_image, normalize_inline_image};
use crate::objects::{
    dict_bool, dict_f32, dict_get, dict_i64, dict_name, name_bytes_to_string, obj_to_f32, op_f32,
    op_f32_n, op_i64, op_name, op_numbers, parse_matrix_object, parse_rect_object, resolve_dict,
    resolve_object,
};
use crate::shading::Shading;
use crate::types::{Color, Matrix};
use lopdf::content::{Content, Operation};
use lopdf::{
    Dictionary as LoDictionary, Document as LoDocument, Object as LoObject, ObjectId,
    Stream as LoStream,
};
use std::collections::HashMap;
use std::sync::Arc;
use tiny_skia::{FillRule, Path, PathBuilder, PathSegment, Pixmap, Rect};

/// Forms, patterns and glyph procedures nested deeper than this are skipped.
const MAX_NESTING: usize = 32;
const ANNOT_HIDDEN: i64 = 1 << 1;
const ANNOT_NO_VIEW: i64 = 1 << 5;

/// Interprets the page's content and visible annotation appearances.
pub(crate) fn interpret_page(page: &PageHandle<'_>) -> Result<Vec<Command>, RenderError> {
    let doc = page.lo();
    let page_id = page.object_id();
    let dict = page_dict(doc, page_id)
        .ok_or_else(|| RenderError::new("page object is not a dictionary"))?;
    let resources =
        inherited_attribute(doc, page_id, b"Resources").and_then(|obj| resolve_dict(doc, obj));
    let content = page_content(doc, page_id)?;
    let ops = Content::decode(&content)?.operations;

    let mut interp = Interpreter::new(doc);
    let scope = Scope::root(resources);
    let mut out = Vec::new();
    interp.run(&ops, &scope, GraphicsState::default(), &mut out)?;
    interp.draw_annotations(dict, &scope, &mut out);
    log::trace!("page {}: {} display commands", page.number(), out.len());
    Ok(out)
}

/// Decoded `/Contents` streams, joined with a newline so a token at the end
/// of one stream cannot run into the next.
fn page_content(doc: &LoDocument, page_id: ObjectId) -> Result<Vec<u8>, RenderError> {
    let mut content = Vec::new();
    for id in doc.get_page_contents(page_id) {
        let stream = doc.get_object(id)?.as_stream()?;
        let data = decode_stream(stream).map_err(|err| {
            RenderError::new(format!(
                "content stream {} {} cannot be decoded: {}",
                id.0, id.1, err.message
            ))
        })?;
        if !content.is_empty() {
            content.push(b'\n');
        }
        content.extend_from_slice(&data);
    }
    Ok(content)
}

/// The resource dictionaries visible to one content stream, innermost last.
#[derive(Clone)]
struct Scope<'doc> {
    resources: Vec<&'doc LoDictionary>,
    /// Maps the stream's pattern space (its default space) to page space.
    pattern_base: Matrix,
}

impl<'doc> Scope<'doc> {
    fn root(resources: Option<&'doc LoDictionary>) -> Self {
        Scope {
            resources: resources.into_iter().collect(),
            pattern_base: Matrix::identity(),
        }
    }

    fn nested(&self, resources: Option<&'doc LoDictionary>, pattern_base: Matrix) -> Self {
        let mut scope = self.clone();
        scope.resources.extend(resources);
        scope.pattern_base = pattern_base;
        scope
    }

    /// Returns the entry unresolved so callers can key caches on its id.
    fn lookup(&self, doc: &'doc LoDocument, category: &[u8], name: &[u8]) -> Option<&'doc LoObject> {
        self.resources.iter().rev().find_map(|res| {
            let entries = res.get(category).ok().and_then(|o| resolve_dict(doc, o))?;
            entries.get(name).ok()
        })
    }
}

#[derive(Clone)]
struct FontRef<'doc> {
    font: Arc<PdfFont>,
    /// Type3 glyph procedures run against the font's own resources.
    resources: Option<&'doc LoDictionary>,
}

#[derive(Clone)]
struct GraphicsState<'doc> {
    ctm: Matrix,
    fill_space: ColorSpace,
    stroke_space: ColorSpace,
    fill_color: Color,
    stroke_color: Color,
    fill_alpha: f32,
    stroke_alpha: f32,
    font: Option<FontRef<'doc>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
    render_mode: u8,
    /// Set inside uncolored pattern cells and `d1` glyphs.
    ignore_color: bool,
}

impl Default for GraphicsState<'_> {
    fn default() -> Self {
        GraphicsState {
            ctm: Matrix::identity(),
            fill_space: ColorSpace::DeviceGray,
            stroke_space: ColorSpace::DeviceGray,
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
            ignore_color: false,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Fill,
    Stroke,
}

/// The path under construction plus any `W`/`W*` waiting for the next
/// painting operator.
struct PathState {
    builder: PathBuilder,
    current: Option<(f32, f32)>,
    pending_clip: Option<FillRule>,
}

impl PathState {
    fn new() -> Self {
        PathState {
            builder: PathBuilder::new(),
            current: None,
            pending_clip: None,
        }
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
        self.current = Some((x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        if self.current.is_none() {
            return;
        }
        self.builder.line_to(x, y);
        self.current = Some((x, y));
    }

    fn cubic_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        if self.current.is_none() {
            return;
        }
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
        self.current = Some((x, y));
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.builder.move_to(x, y);
        self.builder.line_to(x + w, y);
        self.builder.line_to(x + w, y + h);
        self.builder.line_to(x, y + h);
        self.builder.close();
        self.current = Some((x, y));
    }

    fn close(&mut self) {
        if self.current.is_some() {
            self.builder.close();
        }
    }

    fn take(&mut self) -> Option<Path> {
        self.current = None;
        std::mem::replace(&mut self.builder, PathBuilder::new()).finish()
    }
}

struct TextObject {
    tm: Matrix,
    tlm: Matrix,
    clip: PathBuilder,
    clip_used: bool,
}

impl TextObject {
    fn new() -> Self {
        TextObject {
            tm: Matrix::identity(),
            tlm: Matrix::identity(),
            clip: PathBuilder::new(),
            clip_used: false,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translation(tx, ty).concat(self.tlm);
        self.tm = self.tlm;
    }
}

/// Per content stream mutable state.
struct Frame<'doc> {
    state: GraphicsState<'doc>,
    stack: Vec<GraphicsState<'doc>>,
    path: PathState,
    text: TextObject,
}

struct Interpreter<'doc> {
    doc: &'doc LoDocument,
    fonts: HashMap<ObjectId, Arc<PdfFont>>,
    fallback_font: Option<Arc<PdfFont>>,
    images: HashMap<ObjectId, Arc<Pixmap>>,
    contents: HashMap<ObjectId, Arc<Vec<Operation>>>,
    tiles: HashMap<ObjectId, Arc<Vec<Command>>>,
    /// Streams currently being interpreted, for cycle detection.
    active: Vec<ObjectId>,
}

impl<'doc> Interpreter<'doc> {
    fn new(doc: &'doc LoDocument) -> Self {
        Interpreter {
            doc,
            fonts: HashMap::new(),
            fallback_font: None,
            images: HashMap::new(),
            contents: HashMap::new(),
            tiles: HashMap::new(),
            active: Vec::new(),
        }
    }

    /// Runs `ops` to completion. States saved with `q` and never restored
    /// are popped at the end so nothing leaks into the caller.
    fn run(
        &mut self,
        ops: &[Operation],
        scope: &Scope<'doc>,
        state: GraphicsState<'doc>,
        out: &mut Vec<Command>,
    ) -> Result<(), RenderError> {
        let mut frame = Frame {
            state,
            stack: Vec::new(),
            path: PathState::new(),
            text: TextObject::new(),
        };
        let mut result = Ok(());
        for op in ops {
            if let Err(err) = self.apply(op, scope, &mut frame, out) {
                result = Err(err);
                break;
            }
        }
        for _ in frame.stack.drain(..) {
            out.push(Command::RestoreState);
        }
        result
    }

    fn apply(
        &mut self,
        op: &Operation,
        scope: &Scope<'doc>,
        frame: &mut Frame<'doc>,
        out: &mut Vec<Command>,
    ) -> Result<(), RenderError> {
        match op.operator.as_str() {
            "q" => {
                frame.stack.push(frame.state.clone());
                out.push(Command::SaveState);
            }
            "Q" => {
                if let Some(prev) = frame.stack.pop() {
                    frame.state = prev;
                    out.push(Command::RestoreState);
                }
            }
            "cm" => {
                if let Some([a, b, c, d, e, f]) = op_f32_n::<6>(op) {
                    let m = Matrix::from_operands(a, b, c, d, e, f);
                    frame.state.ctm = m.concat(frame.state.ctm);
                    out.push(Command::ConcatMatrix(m));
                }
            }
            "w" => {
                if let Some(width) = op_f32(op, 0) {
                    out.push(Command::SetLineWidth(width.max(0.0)));
                }
            }
            "J" => {
                if let Some(cap) = op_i64(op, 0) {
                    out.push(Command::SetLineCap(cap.clamp(0, 2) as u8));
                }
            }
            "j" => {
                if let Some(join) = op_i64(op, 0) {
                    out.push(Command::SetLineJoin(join.clamp(0, 2) as u8));
                }
            }
            "M" => {
                if let Some(limit) = op_f32(op, 0) {
                    out.push(Command::SetMiterLimit(limit.max(1.0)));
                }
            }
            "d" => {
                if let (Some(LoObject::Array(items)), Some(phase)) =
                    (op.operands.first(), op.operands.get(1).and_then(obj_to_f32))
                {
                    out.push(dash_command(items, phase));
                }
            }
            "gs" => {
                if let Some(name) = op_name(op, 0) {
                    self.apply_ext_gstate(name.as_bytes(), scope, frame, out);
                }
            }
            "ri" | "i" | "d0" | "BX" | "EX" | "MP" | "DP" | "BMC" | "BDC" | "EMC" => {}
            "d1" => frame.state.ignore_color = true,

            "g" | "G" | "rg" | "RG" | "k" | "K" => {
                let target = if op.operator.chars().all(|c| c.is_ascii_lowercase()) {
                    Target::Fill
                } else {
                    Target::Stroke
                };
                let space = match op.operator.as_str() {
                    "g" | "G" => ColorSpace::DeviceGray,
                    "rg" | "RG" => ColorSpace::DeviceRgb,
                    _ => ColorSpace::DeviceCmyk,
                };
                let comps = op_numbers(op);
                if comps.len() >= space.components() {
                    self.set_solid(target, space, &comps, frame, out);
                }
            }
            "cs" | "CS" => {
                let target = if op.operator == "cs" { Target::Fill } else { Target::Stroke };
                if let Some(name) = op_name(op, 0) {
                    match self.named_color_space(name.as_bytes(), scope) {
                        Some(space) => {
                            if matches!(space, ColorSpace::Pattern { .. }) {
                                match target {
                                    Target::Fill => frame.state.fill_space = space,
                                    Target::Stroke => frame.state.stroke_space = space,
                                }
                            } else {
                                let comps = space.initial_components();
                                self.set_solid(target, space, &comps, frame, out);
                            }
                        }
                        None => log::warn!("unknown color space /{name}; keeping the current one"),
                    }
                }
            }
            "sc" | "scn" | "SC" | "SCN" => {
                let target = if op.operator.starts_with('s') { Target::Fill } else { Target::Stroke };
                self.set_components(target, op, scope, frame, out)?;
            }

            "m" => {
                if let Some([x, y]) = op_f32_n::<2>(op) {
                    frame.path.move_to(x, y);
                }
            }
            "l" => {
                if let Some([x, y]) = op_f32_n::<2>(op) {
                    frame.path.line_to(x, y);
                }
            }
            "c" => {
                if let Some([x1, y1, x2, y2, x, y]) = op_f32_n::<6>(op) {
                    frame.path.cubic_to(x1, y1, x2, y2, x, y);
                }
            }
            "v" => {
                if let (Some([x2, y2, x, y]), Some((x1, y1))) = (op_f32_n::<4>(op), frame.path.current) {
                    frame.path.cubic_to(x1, y1, x2, y2, x, y);
                }
            }
            "y" => {
                if let Some([x1, y1, x, y]) = op_f32_n::<4>(op) {
                    frame.path.cubic_to(x1, y1, x, y, x, y);
                }
            }
            "h" => frame.path.close(),
            "re" => {
                if let Some([x, y, w, h]) = op_f32_n::<4>(op) {
                    frame.path.rect(x, y, w, h);
                }
            }
            "W" => frame.path.pending_clip = Some(FillRule::Winding),
            "W*" => frame.path.pending_clip = Some(FillRule::EvenOdd),
            "S" => paint_path(frame, out, false, None, true),
            "s" => paint_path(frame, out, true, None, true),
            "f" | "F" => paint_path(frame, out, false, Some(FillRule::Winding), false),
            "f*" => paint_path(frame, out, false, Some(FillRule::EvenOdd), false),
            "B" => paint_path(frame, out, false, Some(FillRule::Winding), true),
            "B*" => paint_path(frame, out, false, Some(FillRule::EvenOdd), true),
            "b" => paint_path(frame, out, true, Some(FillRule::Winding), true),
            "b*" => paint_path(frame, out, true, Some(FillRule::EvenOdd), true),
            "n" => paint_path(frame, out, false, None, false),
            "sh" => {
                if let Some(name) = op_name(op, 0) {
                    match scope.lookup(self.doc, b"Shading", name.as_bytes()) {
                        Some(obj) => {
                            if let Some(shading) = Shading::parse(self.doc, obj) {
                                out.push(Command::PaintShading(Arc::new(shading)));
                            }
                        }
                        None => log::warn!("shading /{name} not found in resources"),
                    }
                }
            }

            "BT" => frame.text = TextObject::new(),
            "ET" => {
                let text = std::mem::replace(&mut frame.text, TextObject::new());
                if text.clip_used {
                    match text.clip.finish() {
                        Some(path) => out.push(Command::ClipPath {
                            path,
                            rule: FillRule::Winding,
                        }),
                        None => out.push(Command::ClipEmpty),
                    }
                }
            }
            "Tc" => {
                if let Some(v) = op_f32(op, 0) {
                    frame.state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = op_f32(op, 0) {
                    frame.state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = op_f32(op, 0) {
                    frame.state.h_scale = v / 100.0;
                }
            }
            "TL" => {
                if let Some(v) = op_f32(op, 0) {
                    frame.state.leading = v;
                }
            }
            "Ts" => {
                if let Some(v) = op_f32(op, 0) {
                    frame.state.rise = v;
                }
            }
            "Tr" => {
                if let Some(v) = op_i64(op, 0) {
                    frame.state.render_mode = v.clamp(0, 7) as u8;
                }
            }
            "Tf" => {
                if let (Some(name), Some(size)) = (op_name(op, 0), op_f32(op, 1)) {
                    frame.state.font = Some(self.font_resource(name.as_bytes(), scope));
                    frame.state.font_size = size;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = op_f32_n::<2>(op) {
                    frame.text.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = op_f32_n::<2>(op) {
                    frame.state.leading = -ty;
                    frame.text.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some([a, b, c, d, e, f]) = op_f32_n::<6>(op) {
                    frame.text.tlm = Matrix::from_operands(a, b, c, d, e, f);
                    frame.text.tm = frame.text.tlm;
                }
            }
            "T*" => {
                let leading = frame.state.leading;
                frame.text.move_line(0.0, -leading);
            }
            "Tj" => {
                if let Some(LoObject::String(bytes, _)) = op.operands.first() {
                    self.show_text(bytes, scope, frame, out)?;
                }
            }
            "'" => {
                let leading = frame.state.leading;
                frame.text.move_line(0.0, -leading);
                if let Some(LoObject::String(bytes, _)) = op.operands.first() {
                    self.show_text(bytes, scope, frame, out)?;
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (op_f32(op, 0), op_f32(op, 1)) {
                    frame.state.word_spacing = aw;
                    frame.state.char_spacing = ac;
                }
                let leading = frame.state.leading;
                frame.text.move_line(0.0, -leading);
                if let Some(LoObject::String(bytes, _)) = op.operands.get(2) {
                    self.show_text(bytes, scope, frame, out)?;
                }
            }
            "TJ" => {
                if let Some(LoObject::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            LoObject::String(bytes, _) => self.show_text(bytes, scope, frame, out)?,
                            other => {
                                if let Some(adjust) = obj_to_f32(other) {
                                    let tx = -(adjust / 1000.0)
                                        * frame.state.font_size
                                        * frame.state.h_scale;
                                    frame.text.tm = Matrix::translation(tx, 0.0).concat(frame.text.tm);
                                }
                            }
                        }
                    }
                }
            }

            "Do" => {
                if let Some(name) = op_name(op, 0) {
                    self.draw_xobject(name.as_bytes(), scope, &frame.state, out)?;
                }
            }
            "BI" | "EI" => {
                let inline = op.operands.iter().find_map(|o| match o {
                    LoObject::Stream(stream) => Some(stream),
                    _ => None,
                });
                if let Some(stream) = inline {
                    let stream = normalize_inline_image(stream);
                    let space = self.image_color_space(&stream.dict, scope);
                    let pixmap = decode_image(self.doc, &stream, space.as_ref(), frame.state.fill_color)?;
                    out.push(Command::DrawImage(Arc::new(pixmap)));
                }
            }
            other => log::trace!("ignoring operator {other}"),
        }
        Ok(())
    }

    fn set_solid(
        &mut self,
        target: Target,
        space: ColorSpace,
        comps: &[f32],
        frame: &mut Frame<'doc>,
        out: &mut Vec<Command>,
    ) {
        if frame.state.ignore_color {
            return;
        }
        let color = space.to_rgb(comps);
        match target {
            Target::Fill => {
                frame.state.fill_space = space;
                frame.state.fill_color = color;
                out.push(Command::SetFillInk(Ink::Solid(color)));
            }
            Target::Stroke => {
                frame.state.stroke_space = space;
                frame.state.stroke_color = color;
                out.push(Command::SetStrokeInk(Ink::Solid(color)));
            }
        }
    }

    fn set_components(
        &mut self,
        target: Target,
        op: &Operation,
        scope: &Scope<'doc>,
        frame: &mut Frame<'doc>,
        out: &mut Vec<Command>,
    ) -> Result<(), RenderError> {
        if frame.state.ignore_color {
            return Ok(());
        }
        let space = match target {
            Target::Fill => frame.state.fill_space.clone(),
            Target::Stroke => frame.state.stroke_space.clone(),
        };
        let comps = op_numbers(op);
        let ColorSpace::Pattern { underlying } = &space else {
            if comps.len() >= space.components() {
                self.set_solid(target, space, &comps, frame, out);
            }
            return Ok(());
        };
        let Some(name) = op.operands.last().and_then(|o| o.as_name().ok()) else {
            return Ok(());
        };
        let Some(ink) = self.pattern_ink(name, underlying.as_deref(), &comps, scope)? else {
            return Ok(());
        };
        match target {
            Target::Fill => out.push(Command::SetFillInk(ink)),
            Target::Stroke => out.push(Command::SetStrokeInk(ink)),
        }
        Ok(())
    }

    fn named_color_space(&self, name: &[u8], scope: &Scope<'doc>) -> Option<ColorSpace> {
        ColorSpace::from_name(name).or_else(|| {
            let obj = scope.lookup(self.doc, b"ColorSpace", name)?;
            ColorSpace::parse(self.doc, obj)
        })
    }

    fn image_color_space(&self, dict: &LoDictionary, scope: &Scope<'doc>) -> Option<ColorSpace> {
        let obj = dict.get(b"ColorSpace").ok()?;
        match resolve_object(self.doc, obj).ok()? {
            LoObject::Name(name) => self.named_color_space(name, scope),
            other => ColorSpace::parse(self.doc, other),
        }
    }

    fn pattern_ink(
        &mut self,
        name: &[u8],
        underlying: Option<&ColorSpace>,
        comps: &[f32],
        scope: &Scope<'doc>,
    ) -> Result<Option<Ink>, RenderError> {
        let doc = self.doc;
        let Some(obj) = scope.lookup(doc, b"Pattern", name) else {
            log::warn!("pattern /{} not found in resources", name_bytes_to_string(name));
            return Ok(None);
        };
        let id = obj.as_reference().ok();
        let resolved = resolve_object(doc, obj)?;
        let Some(dict) = resolve_dict(doc, resolved) else {
            return Ok(None);
        };
        let matrix = dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| parse_matrix_object(doc, o))
            .unwrap_or_default()
            .concat(scope.pattern_base);

        match dict_i64(doc, dict, b"PatternType") {
            Some(2) => {
                let shading = dict_get(doc, dict, b"Shading").and_then(|o| Shading::parse(doc, o));
                Ok(shading.map(|shading| Ink::Shading {
                    shading: Arc::new(shading),
                    matrix,
                }))
            }
            Some(1) => {
                let LoObject::Stream(stream) = resolved else {
                    return Ok(None);
                };
                let uncolored = dict_i64(doc, dict, b"PaintType") == Some(2);
                let tint = uncolored.then(|| match underlying {
                    Some(space) if comps.len() >= space.components() => space.to_rgb(comps),
                    _ => Color::BLACK,
                });
                self.tiling_cell(stream, id, tint, matrix, scope)
                    .map(|cell| cell.map(|cell| Ink::Tiling(Arc::new(cell))))
            }
            other => {
                log::warn!("pattern type {other:?} is not supported");
                Ok(None)
            }
        }
    }

    /// Interprets one tile of a tiling pattern in its own pattern space.
    /// Uncolored tiles are painted entirely in `tint`.
    fn tiling_cell(
        &mut self,
        stream: &'doc LoStream,
        id: Option<ObjectId>,
        tint: Option<Color>,
        matrix: Matrix,
        scope: &Scope<'doc>,
    ) -> Result<Option<TilingCell>, RenderError> {
        let doc = self.doc;
        let dict = &stream.dict;
        let Some(bbox) = dict.get(b"BBox").ok().and_then(|o| parse_rect_object(doc, o)) else {
            log::warn!("tiling pattern without BBox");
            return Ok(None);
        };
        let (Some(x_step), Some(y_step)) = (dict_f32(doc, dict, b"XStep"), dict_f32(doc, dict, b"YStep")) else {
            log::warn!("tiling pattern without XStep/YStep");
            return Ok(None);
        };
        if x_step == 0.0 || y_step == 0.0 {
            return Ok(None);
        }

        let cached = match (id, tint) {
            (Some(id), None) => self.tiles.get(&id).cloned(),
            _ => None,
        };
        let commands = match cached {
            Some(commands) => commands,
            None => {
                if !self.enter(id) {
                    return Ok(None);
                }
                let result = self.tile_commands(stream, id, tint, scope);
                self.leave();
                let commands = Arc::new(result?);
                if let (Some(id), None) = (id, tint) {
                    self.tiles.insert(id, commands.clone());
                }
                commands
            }
        };
        Ok(Some(TilingCell {
            commands,
            bbox,
            x_step: x_step.abs(),
            y_step: y_step.abs(),
            matrix,
        }))
    }

    fn tile_commands(
        &mut self,
        stream: &'doc LoStream,
        id: Option<ObjectId>,
        tint: Option<Color>,
        scope: &Scope<'doc>,
    ) -> Result<Vec<Command>, RenderError> {
        let ops = self.content_ops(stream, id)?;
        let resources = dict_get(self.doc, &stream.dict, b"Resources").and_then(|o| resolve_dict(self.doc, o));
        let scope = scope.nested(resources, Matrix::identity());
        let mut state = GraphicsState::default();
        let mut commands = Vec::new();
        if let Some(color) = tint {
            state.fill_color = color;
            state.stroke_color = color;
            state.ignore_color = true;
            commands.push(Command::SetFillInk(Ink::Solid(color)));
            commands.push(Command::SetStrokeInk(Ink::Solid(color)));
        }
        self.run(&ops, &scope, state, &mut commands)?;
        Ok(commands)
    }

    fn apply_ext_gstate(
        &mut self,
        name: &[u8],
        scope: &Scope<'doc>,
        frame: &mut Frame<'doc>,
        out: &mut Vec<Command>,
    ) {
        let doc = self.doc;
        let Some(dict) = scope
            .lookup(doc, b"ExtGState", name)
            .and_then(|o| resolve_dict(doc, o))
        else {
            log::debug!("graphics state /{} not found", name_bytes_to_string(name));
            return;
        };
        if let Some(width) = dict_f32(doc, dict, b"LW") {
            out.push(Command::SetLineWidth(width.max(0.0)));
        }
        if let Some(cap) = dict_i64(doc, dict, b"LC") {
            out.push(Command::SetLineCap(cap.clamp(0, 2) as u8));
        }
        if let Some(join) = dict_i64(doc, dict, b"LJ") {
            out.push(Command::SetLineJoin(join.clamp(0, 2) as u8));
        }
        if let Some(limit) = dict_f32(doc, dict, b"ML") {
            out.push(Command::SetMiterLimit(limit.max(1.0)));
        }
        if let Some(items) = dict_get(doc, dict, b"D").and_then(|o| o.as_array().ok()) {
            if let (Some(LoObject::Array(pattern)), Some(phase)) =
                (items.first(), items.get(1).and_then(obj_to_f32))
            {
                out.push(dash_command(pattern, phase));
            }
        }
        let fill = dict_f32(doc, dict, b"ca");
        let stroke = dict_f32(doc, dict, b"CA");
        if fill.is_some() || stroke.is_some() {
            if let Some(v) = fill {
                frame.state.fill_alpha = v.clamp(0.0, 1.0);
            }
            if let Some(v) = stroke {
                frame.state.stroke_alpha = v.clamp(0.0, 1.0);
            }
            out.push(Command::SetOpacity {
                fill: frame.state.fill_alpha,
                stroke: frame.state.stroke_alpha,
            });
        }
        if let Some(items) = dict_get(doc, dict, b"Font").and_then(|o| o.as_array().ok()) {
            if let (Some(font), Some(size)) = (items.first(), items.get(1).and_then(obj_to_f32)) {
                frame.state.font = Some(self.load_font(font));
                frame.state.font_size = size;
            }
        }
        if dict_name(doc, dict, b"SMask").as_deref() != Some("None") && dict.has(b"SMask") {
            log::debug!("soft masks in graphics states are not applied");
        }
        if dict_bool(doc, dict, b"AIS") == Some(true) {
            log::debug!("alpha-is-shape is not applied");
        }
    }

    fn font_resource(&mut self, name: &[u8], scope: &Scope<'doc>) -> FontRef<'doc> {
        match scope.lookup(self.doc, b"Font", name) {
            Some(obj) => self.load_font(obj),
            None => {
                log::warn!(
                    "font /{} not found in resources; using Helvetica",
                    name_bytes_to_string(name)
                );
                let font = self
                    .fallback_font
                    .get_or_insert_with(|| Arc::new(PdfFont::fallback("Helvetica")))
                    .clone();
                FontRef { font, resources: None }
            }
        }
    }

    fn load_font(&mut self, obj: &'doc LoObject) -> FontRef<'doc> {
        let doc = self.doc;
        let resources = resolve_dict(doc, obj)
            .and_then(|dict| dict_get(doc, dict, b"Resources"))
            .and_then(|o| resolve_dict(doc, o));
        let font = match obj.as_reference() {
            Ok(id) => self
                .fonts
                .entry(id)
                .or_insert_with(|| Arc::new(PdfFont::load(doc, obj)))
                .clone(),
            Err(_) => Arc::new(PdfFont::load(doc, obj)),
        };
        FontRef { font, resources }
    }

    fn show_text(
        &mut self,
        bytes: &[u8],
        scope: &Scope<'doc>,
        frame: &mut Frame<'doc>,
        out: &mut Vec<Command>,
    ) -> Result<(), RenderError> {
        let Some(font_ref) = frame.state.font.clone() else {
            log::debug!("text shown before any font was selected");
            return Ok(());
        };
        let font = font_ref.font.as_ref();
        let size = frame.state.font_size;
        let h_scale = frame.state.h_scale;
        let mode = frame.state.render_mode;
        let char_spacing = frame.state.char_spacing;
        let word_spacing = frame.state.word_spacing;
        let glyph_space = Matrix::from_operands(size * h_scale, 0.0, 0.0, size, 0.0, frame.state.rise);

        let mut run = PathBuilder::new();
        let mut painted = false;
        for (code, len) in font.codes(bytes) {
            let glyph_to_user = glyph_space.concat(frame.text.tm);
            if let Some(type3) = font.type3() {
                if mode != 3 && mode != 7 {
                    if let Some(proc_id) = type3.char_proc(code) {
                        self.type3_glyph(
                            proc_id,
                            type3.matrix.concat(glyph_to_user),
                            font_ref.resources,
                            scope,
                            &frame.state,
                            out,
                        )?;
                    }
                }
            } else if mode != 3 {
                let placed = font
                    .glyph_outline(code)
                    .and_then(|outline| outline.as_ref().clone().transform(glyph_to_user.to_transform()));
                if let Some(path) = placed {
                    if mode != 7 {
                        append_path(&mut run, &path);
                        painted = true;
                    }
                    if mode >= 4 {
                        append_path(&mut frame.text.clip, &path);
                        frame.text.clip_used = true;
                    }
                }
            }

            let mut advance = font.advance(code) * size + char_spacing;
            if len == 1 && code == 32 {
                advance += word_spacing;
            }
            frame.text.tm = Matrix::translation(advance * h_scale, 0.0).concat(frame.text.tm);
        }
        if mode >= 4 {
            frame.text.clip_used = true;
        }

        if !painted {
            return Ok(());
        }
        if let Some(path) = run.finish() {
            match mode % 4 {
                0 => out.push(Command::FillPath {
                    path,
                    rule: FillRule::Winding,
                }),
                1 => out.push(Command::StrokePath { path }),
                2 => out.push(Command::FillStrokePath {
                    path,
                    rule: FillRule::Winding,
                }),
                _ => {}
            }
        }
        Ok(())
    }

    fn type3_glyph(
        &mut self,
        proc_id: ObjectId,
        glyph_matrix: Matrix,
        resources: Option<&'doc LoDictionary>,
        scope: &Scope<'doc>,
        state: &GraphicsState<'doc>,
        out: &mut Vec<Command>,
    ) -> Result<(), RenderError> {
        let doc = self.doc;
        let stream = doc.get_object(proc_id)?.as_stream()?;
        let ops = self.content_ops(stream, Some(proc_id))?;
        if !self.enter(Some(proc_id)) {
            return Ok(());
        }
        let mut glyph_state = state.clone();
        glyph_state.ctm = glyph_matrix.concat(state.ctm);
        let scope = scope.nested(resources, glyph_state.ctm);
        out.push(Command::SaveState);
        out.push(Command::ConcatMatrix(glyph_matrix));
        let result = self.run(&ops, &scope, glyph_state, out);
        out.push(Command::RestoreState);
        self.leave();
        result
    }

    fn draw_xobject(
        &mut self,
        name: &[u8],
        scope: &Scope<'doc>,
        state: &GraphicsState<'doc>,
        out: &mut Vec<Command>,
    ) -> Result<(), RenderError> {
        let doc = self.doc;
        let label = name_bytes_to_string(name);
        let obj = scope
            .lookup(doc, b"XObject", name)
            .ok_or_else(|| RenderError::new(format!("XObject /{label} not found in resources")))?;
        let id = obj.as_reference().ok();
        let stream = resolve_object(doc, obj)?
            .as_stream()
            .map_err(|_| RenderError::new(format!("XObject /{label} is not a stream")))?;
        match dict_name(doc, &stream.dict, b"Subtype").as_deref() {
            Some("Image") => self.draw_image(stream, id, scope, state, out),
            Some("Form") => self.draw_form(stream, id, Matrix::identity(), scope, state, out),
            other => {
                log::debug!("ignoring XObject /{label} with subtype {other:?}");
                Ok(())
            }
        }
    }

    fn draw_image(
        &mut self,
        stream: &'doc LoStream,
        id: Option<ObjectId>,
        scope: &Scope<'doc>,
        state: &GraphicsState<'doc>,
        out: &mut Vec<Command>,
    ) -> Result<(), RenderError> {
        // Stencil masks take the current fill color, so only colored images are cached.
        let is_mask = dict_bool(self.doc, &stream.dict, b"ImageMask").unwrap_or(false);
        let cache_key = id.filter(|_| !is_mask);
        if let Some(pixmap) = cache_key.and_then(|id| self.images.get(&id)) {
            out.push(Command::DrawImage(pixmap.clone()));
            return Ok(());
        }
        let space = self.image_color_space(&stream.dict, scope);
        let pixmap = Arc::new(decode_image(self.doc, stream, space.as_ref(), state.fill_color)?);
        if let Some(id) = cache_key {
            self.images.insert(id, pixmap.clone());
        }
        out.push(Command::DrawImage(pixmap));
        Ok(())
    }

    /// Draws a form XObject. `outer` is applied after the form's own
    /// `/Matrix`.
    fn draw_form(
        &mut self,
        stream: &'doc LoStream,
        id: Option<ObjectId>,
        outer: Matrix,
        scope: &Scope<'doc>,
        state: &GraphicsState<'doc>,
        out: &mut Vec<Command>,
    ) -> Result<(), RenderError> {
        let doc = self.doc;
        let ops = self.content_ops(stream, id)?;
        if !self.enter(id) {
            return Ok(());
        }
        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| parse_matrix_object(doc, o))
            .unwrap_or_default()
            .concat(outer);
        let resources = dict_get(doc, &stream.dict, b"Resources").and_then(|o| resolve_dict(doc, o));
        let mut form_state = state.clone();
        form_state.ctm = matrix.concat(state.ctm);
        let scope = scope.nested(resources, form_state.ctm);

        out.push(Command::SaveState);
        out.push(Command::ConcatMatrix(matrix));
        if let Some(path) = stream
            .dict
            .get(b"BBox")
            .ok()
            .and_then(|o| parse_rect_object(doc, o))
            .and_then(|[x0, y0, x1, y1]| Rect::from_ltrb(x0, y0, x1, y1))
            .map(PathBuilder::from_rect)
        {
            out.push(Command::ClipPath {
                path,
                rule: FillRule::Winding,
            });
        }
        let result = self.run(&ops, &scope, form_state, out);
        out.push(Command::RestoreState);
        self.leave();
        result
    }

    /// Draws the normal appearance of every visible annotation, fitting the
    /// appearance BBox onto the annotation `/Rect`. Broken appearances are
    /// logged and skipped.
    fn draw_annotations(&mut self, page: &'doc LoDictionary, scope: &Scope<'doc>, out: &mut Vec<Command>) {
        let doc = self.doc;
        let Some(annots) = dict_get(doc, page, b"Annots").and_then(|o| o.as_array().ok()) else {
            return;
        };
        for annot in annots {
            let Some(dict) = resolve_dict(doc, annot) else {
                continue;
            };
            let flags = dict_i64(doc, dict, b"F").unwrap_or(0);
            if flags & (ANNOT_HIDDEN | ANNOT_NO_VIEW) != 0 {
                continue;
            }
            let Some(rect) = dict.get(b"Rect").ok().and_then(|o| parse_rect_object(doc, o)) else {
                continue;
            };
            let Some((stream, id)) = appearance_stream(doc, dict) else {
                continue;
            };
            let Some(bbox) = stream.dict.get(b"BBox").ok().and_then(|o| parse_rect_object(doc, o)) else {
                continue;
            };
            let form_matrix = stream
                .dict
                .get(b"Matrix")
                .ok()
                .and_then(|o| parse_matrix_object(doc, o))
                .unwrap_or_default();
            let (bx0, by0, bx1, by1) = form_matrix.transform_rect(bbox[0], bbox[1], bbox[2], bbox[3]);
            if bx1 - bx0 <= 0.0 || by1 - by0 <= 0.0 {
                continue;
            }
            let sx = (rect[2] - rect[0]) / (bx1 - bx0);
            let sy = (rect[3] - rect[1]) / (by1 - by0);
            let fit = Matrix::from_operands(sx, 0.0, 0.0, sy, rect[0] - bx0 * sx, rect[1] - by0 * sy);
            if let Err(err) = self.draw_form(stream, id, fit, scope, &GraphicsState::default(), out) {
                log::warn!("annotation appearance skipped: {}", err.message);
            }
        }
    }

    /// Decoded operators of a content stream, cached by object id.
    fn content_ops(&mut self, stream: &LoStream, id: Option<ObjectId>) -> Result<Arc<Vec<Operation>>, RenderError> {
        if let Some(ops) = id.and_then(|id| self.contents.get(&id)) {
            return Ok(ops.clone());
        }
        let data = decode_stream(stream)?;
        let ops = Arc::new(Content::decode(&data)?.operations);
        if let Some(id) = id {
            self.contents.insert(id, ops.clone());
        }
        Ok(ops)
    }

    /// Marks `id` as being interpreted. Returns false (after logging) when
    /// it already is or nesting is too deep.
    fn enter(&mut self, id: Option<ObjectId>) -> bool {
        if self.active.len() >= MAX_NESTING {
            log::warn!("content nested more than {MAX_NESTING} levels deep; skipped");
            return false;
        }
        if let Some(id) = id {
            if self.active.contains(&id) {
                log::warn!("object {} {} draws itself; skipped", id.0, id.1);
                return false;
            }
        }
        // Inline streams still count toward the depth limit.
        self.active.push(id.unwrap_or((0, 0)));
        true
    }

    fn leave(&mut self) {
        self.active.pop();
    }
}

fn paint_path(frame: &mut Frame<'_>, out: &mut Vec<Command>, close: bool, fill: Option<FillRule>, stroke: bool) {
    if close {
        frame.path.close();
    }
    let clip = frame.path.pending_clip.take();
    let Some(path) = frame.path.take() else {
        if clip.is_some() {
            out.push(Command::ClipEmpty);
        }
        return;
    };
    match (fill, stroke) {
        (Some(rule), true) => out.push(Command::FillStrokePath {
            path: path.clone(),
            rule,
        }),
        (Some(rule), false) => out.push(Command::FillPath {
            path: path.clone(),
            rule,
        }),
        (None, true) => out.push(Command::StrokePath { path: path.clone() }),
        (None, false) => {}
    }
    if let Some(rule) = clip {
        out.push(Command::ClipPath { path, rule });
    }
}

fn dash_command(items: &[LoObject], phase: f32) -> Command {
    let pattern: Vec<f32> = items.iter().filter_map(obj_to_f32).map(f32::abs).collect();
    // All-zero dash arrays draw solid lines.
    let pattern = if pattern.iter().all(|v| *v == 0.0) { Vec::new() } else { pattern };
    Command::SetDash { pattern, phase }
}

fn append_path(builder: &mut PathBuilder, path: &Path) {
    for segment in path.segments() {
        match segment {
            PathSegment::MoveTo(p) => builder.move_to(p.x, p.y),
            PathSegment::LineTo(p) => builder.line_to(p.x, p.y),
            PathSegment::QuadTo(p1, p) => builder.quad_to(p1.x, p1.y, p.x, p.y),
            PathSegment::CubicTo(p1, p2, p) => builder.cubic_to(p1.x, p1.y, p2.x, p2.y, p.x, p.y),
            PathSegment::Close => builder.close(),
        }
    }
}

/// The `/AP /N` stream, picking the `/AS` state when `/N` is a state
/// dictionary.
fn appearance_stream<'a>(doc: &'a LoDocument, annot: &'a LoDictionary) -> Option<(&'a LoStream, Option<ObjectId>)> {
    let ap = dict_get(doc, annot, b"AP").and_then(|o| resolve_dict(doc, o))?;
    let normal = ap.get(b"N").ok()?;
    let entry = match resolve_object(doc, normal).ok()? {
        LoObject::Stream(_) => normal,
        LoObject::Dictionary(states) => {
            let state = dict_get(doc, annot, b"AS")?.as_name().ok()?;
            states.get(state).ok()?
        }
        _ => return None,
    };
    let stream = resolve_object(doc, entry).ok()?.as_stream().ok()?;
    Some((stream, entry.as_reference().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfDocument;
    use crate::testing::{
        PdfBuilder, add_box_truetype_font, add_box_type3_font, media_box, single_page_pdf,
    };
    use lopdf::dictionary;

    fn commands_for(pdf: &[u8]) -> Vec<Command> {
        let doc = PdfDocument::open(pdf).expect("open");
        let page = doc.page(1).expect("page");
        interpret_page(&page).expect("interpret")
    }

    fn count(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
        commands.iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn unbalanced_saves_are_restored_and_extra_restores_ignored() {
        let cmds = commands_for(&single_page_pdf(b"q q 1 0 0 rg Q Q Q 0 0 10 10 re f", 100, 100));
        let saves = count(&cmds, |c| matches!(c, Command::SaveState));
        let restores = count(&cmds, |c| matches!(c, Command::RestoreState));
        assert_eq!(saves, 2);
        assert_eq!(restores, 2);

        let cmds = commands_for(&single_page_pdf(b"q 0 0 10 10 re f", 100, 100));
        assert!(matches!(cmds.last(), Some(Command::RestoreState)));
    }

    #[test]
    fn clip_is_emitted_after_the_painting_operator() {
        let cmds = commands_for(&single_page_pdf(b"10 10 50 50 re W n 0 0 100 100 re f", 100, 100));
        assert!(matches!(cmds[0], Command::ClipPath { rule: FillRule::Winding, .. }));
        assert!(matches!(cmds[1], Command::FillPath { .. }));
    }

    #[test]
    fn device_colors_become_solid_inks() {
        let cmds = commands_for(&single_page_pdf(b"0 0 1 rg 0 1 0 0 K 0.5 G", 100, 100));
        assert!(matches!(cmds[0], Command::SetFillInk(Ink::Solid(c)) if c == Color::rgb(0.0, 0.0, 1.0)));
        assert!(matches!(cmds[1], Command::SetStrokeInk(Ink::Solid(c)) if c == Color::rgb(1.0, 0.0, 1.0)));
        assert!(matches!(cmds[2], Command::SetStrokeInk(Ink::Solid(c)) if c == Color::gray(0.5)));
    }

    #[test]
    fn missing_xobject_is_a_render_error() {
        let pdf = single_page_pdf(b"/Im9 Do", 100, 100);
        let doc = PdfDocument::open(&pdf).expect("open");
        let page = doc.page(1).expect("page");
        let err = interpret_page(&page).err().expect("error");
        assert!(err.message.contains("Im9"));
    }

    fn replace_contents(builder: &mut PdfBuilder, page_id: ObjectId, contents: LoObject) {
        builder
            .doc
            .get_object_mut(page_id)
            .and_then(|obj| obj.as_dict_mut())
            .expect("page dict")
            .set("Contents", contents);
    }

    #[test]
    fn content_arrays_keep_operators_of_adjacent_streams_apart() {
        let mut builder = PdfBuilder::new();
        let first = builder.add_stream(LoDictionary::new(), b"1 0 0 rg 0 0 100 100 re f");
        let second = builder.add_stream(LoDictionary::new(), b"q 0 0 1 rg 0 0 50 50 re f Q");
        let page_id = builder.add_simple_page(b"", 100, 100);
        replace_contents(
            &mut builder,
            page_id,
            LoObject::Array(vec![LoObject::Reference(first), LoObject::Reference(second)]),
        );
        let cmds = commands_for(&builder.finish());

        assert_eq!(count(&cmds, |c| matches!(c, Command::FillPath { .. })), 2);
        assert!(matches!(cmds[0], Command::SetFillInk(Ink::Solid(c)) if c == Color::rgb(1.0, 0.0, 0.0)));
        assert!(matches!(cmds[1], Command::FillPath { .. }));
        assert!(matches!(cmds[2], Command::SaveState));
    }

    #[test]
    fn undecodable_content_stream_is_a_render_error() {
        let mut builder = PdfBuilder::new();
        let broken = builder.add_stream(
            dictionary! { "Filter" => "FlateDecode" },
            b"\x07garbage",
        );
        let page_id = builder.add_simple_page(b"", 100, 100);
        replace_contents(&mut builder, page_id, LoObject::Reference(broken));
        let doc = PdfDocument::open(&builder.finish()).expect("open");
        let page = doc.page(1).expect("page");
        let err = interpret_page(&page).err().expect("error");
        assert!(err.message.contains("cannot be decoded"), "{}", err.message);
    }

    #[test]
    fn self_referencing_form_is_cut_off() {
        let mut builder = PdfBuilder::new();
        let form_id = builder.doc.new_object_id();
        let form = LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 50.into(), 50.into()],
                "Resources" => dictionary! { "XObject" => dictionary! { "Fx" => form_id } },
            },
            b"0 0 5 5 re f /Fx Do".to_vec(),
        );
        builder.doc.objects.insert(form_id, LoObject::Stream(form));
        let mut page = media_box(100, 100);
        page.set(
            "Resources",
            dictionary! { "XObject" => dictionary! { "Fx" => form_id } },
        );
        builder.add_page(b"/Fx Do", page);
        let cmds = commands_for(&builder.finish());
        assert_eq!(count(&cmds, |c| matches!(c, Command::FillPath { .. })), 1);
    }

    #[test]
    fn type3_text_runs_glyph_procedures_and_advances() {
        let mut builder = PdfBuilder::new();
        let font = add_box_type3_font(&mut builder);
        let mut page = media_box(200, 100);
        page.set("Resources", dictionary! { "Font" => dictionary! { "T3" => font } });
        builder.add_page(b"BT /T3 10 Tf 10 10 Td (AB) Tj ET", page);
        let cmds = commands_for(&builder.finish());

        let glyph_matrices: Vec<Matrix> = cmds
            .iter()
            .filter_map(|c| match c {
                Command::ConcatMatrix(m) => Some(*m),
                _ => None,
            })
            .collect();
        assert_eq!(glyph_matrices.len(), 2);
        assert!((glyph_matrices[0].e - 10.0).abs() < 1e-4);
        // The second glyph starts after the first one's 600/1000 advance.
        assert!((glyph_matrices[1].e - 16.0).abs() < 1e-4);
        assert_eq!(count(&cmds, |c| matches!(c, Command::FillPath { .. })), 2);
    }

    #[test]
    fn truetype_text_fills_outlines_at_hmtx_advances() {
        let mut builder = PdfBuilder::new();
        let font = add_box_truetype_font(&mut builder, false);
        let mut page = media_box(200, 100);
        page.set("Resources", dictionary! { "Font" => dictionary! { "F1" => font } });
        builder.add_page(b"BT /F1 100 Tf 10 20 Td (AB) Tj (A) Tj ET", page);
        let cmds = commands_for(&builder.finish());

        let runs: Vec<Rect> = cmds
            .iter()
            .filter_map(|c| match c {
                Command::FillPath { path, .. } => Some(path.bounds()),
                _ => None,
            })
            .collect();
        assert_eq!(runs.len(), 2);
        // A spans 10..70, B follows at 70..100, then the second run's A.
        let (ab, a) = (runs[0], runs[1]);
        assert!((ab.left() - 10.0).abs() < 1e-3 && (ab.right() - 100.0).abs() < 1e-3);
        assert!((ab.top() - 20.0).abs() < 1e-3 && (ab.bottom() - 80.0).abs() < 1e-3);
        assert!((a.left() - 100.0).abs() < 1e-3 && (a.right() - 160.0).abs() < 1e-3);
    }

    #[test]
    fn hidden_annotations_are_not_drawn() {
        let mut builder = PdfBuilder::new();
        let appearance = builder.add_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
            },
            b"0 0 10 10 re f",
        );
        let visible = builder.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Square",
            "Rect" => vec![20.into(), 20.into(), 40.into(), 40.into()],
            "AP" => dictionary! { "N" => appearance },
        });
        let hidden = builder.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Square",
            "F" => 2,
            "Rect" => vec![50.into(), 50.into(), 60.into(), 60.into()],
            "AP" => dictionary! { "N" => appearance },
        });
        let mut page = media_box(100, 100);
        page.set("Annots", vec![LoObject::Reference(visible), LoObject::Reference(hidden)]);
        builder.add_page(b"", page);
        let cmds = commands_for(&builder.finish());

        assert_eq!(count(&cmds, |c| matches!(c, Command::FillPath { .. })), 1);
        let fit = cmds.iter().find_map(|c| match c {
            Command::ConcatMatrix(m) => Some(*m),
            _ => None,
        });
        assert_eq!(fit, Some(Matrix::from_operands(2.0, 0.0, 0.0, 2.0, 20.0, 20.0)));
    }
}
