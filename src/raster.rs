//! Composites a display list onto a tiny-skia pixmap.

use crate::display::{Command, Ink, TilingCell};
use crate::document::PageHandle;
use crate::error::RenderError;
use crate::geometry::Viewport;
use crate::interpret::interpret_page;
use crate::shading::{Shading, ShadingGeometry, ShadingStop};
use crate::surface::PixelSurface;
use crate::types::Color;
use std::sync::Arc;
use tiny_skia::{
    FillRule, FilterQuality, GradientStop, LineCap, LineJoin, LinearGradient, Mask, Paint, Path,
    PathBuilder, Pattern, Pixmap, PixmapPaint, Point, RadialGradient, Rect, Shader, SpreadMode,
    Stroke, StrokeDash, Transform,
};

/// Tiling patterns nested inside tiling patterns stop here.
const MAX_TILE_DEPTH: usize = 4;
const MAX_TILE_PX: f32 = 4096.0;
/// Width of the transparent edge placed after a non-extended gradient end.
const GRADIENT_EDGE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Painted under the page content.
    pub background: Color,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
        }
    }
}

/// Renders one page. The partially drawn surface is dropped on failure.
pub fn render_page(
    page: &PageHandle<'_>,
    viewport: &Viewport,
    options: &RenderOptions,
) -> Result<PixelSurface, RenderError> {
    render_page_counted(page, viewport, options).map(|(surface, _)| surface)
}

/// Like [`render_page`], also returning the display list length.
pub(crate) fn render_page_counted(
    page: &PageHandle<'_>,
    viewport: &Viewport,
    options: &RenderOptions,
) -> Result<(PixelSurface, usize), RenderError> {
    let commands = interpret_page(page)?;
    let pixmap = render_display_list(&commands, viewport, options)?;
    Ok((PixelSurface::from_pixmap(pixmap), commands.len()))
}

pub(crate) fn render_display_list(
    commands: &[Command],
    viewport: &Viewport,
    options: &RenderOptions,
) -> Result<Pixmap, RenderError> {
    let (width, height) = viewport.pixel_size();
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        RenderError::new(format!("cannot allocate a {width}x{height} pixel surface"))
    })?;
    pixmap.fill(to_sk_color(options.background, 1.0));
    let mut canvas = Canvas::new(&mut pixmap, viewport.transform.to_transform(), 0);
    canvas.run(commands);
    Ok(pixmap)
}

#[derive(Clone)]
struct RasterState {
    /// Current user space to device pixels.
    transform: Transform,
    fill: Ink,
    stroke: Ink,
    line_width: f32,
    line_cap: u8,
    line_join: u8,
    miter_limit: f32,
    dash_pattern: Vec<f32>,
    dash_phase: f32,
    fill_opacity: f32,
    stroke_opacity: f32,
    clip_mask: Option<Mask>,
}

impl RasterState {
    fn new(transform: Transform) -> Self {
        Self {
            transform,
            fill: Ink::Solid(Color::BLACK),
            stroke: Ink::Solid(Color::BLACK),
            line_width: 1.0,
            line_cap: 0,
            line_join: 0,
            miter_limit: 10.0,
            dash_pattern: Vec::new(),
            dash_phase: 0.0,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            clip_mask: None,
        }
    }
}

struct Canvas<'a> {
    pixmap: &'a mut Pixmap,
    /// Display list space (page or pattern space) to device pixels.
    base: Transform,
    state: RasterState,
    stack: Vec<RasterState>,
    depth: usize,
}

impl<'a> Canvas<'a> {
    fn new(pixmap: &'a mut Pixmap, base: Transform, depth: usize) -> Self {
        Self {
            pixmap,
            base,
            state: RasterState::new(base),
            stack: Vec::new(),
            depth,
        }
    }

    fn run(&mut self, commands: &[Command]) {
        for cmd in commands {
            match cmd {
                Command::SaveState => self.stack.push(self.state.clone()),
                Command::RestoreState => {
                    if let Some(restored) = self.stack.pop() {
                        self.state = restored;
                    }
                }
                Command::ConcatMatrix(m) => {
                    self.state.transform = self.state.transform.pre_concat(m.to_transform());
                }
                Command::SetFillInk(ink) => self.state.fill = ink.clone(),
                Command::SetStrokeInk(ink) => self.state.stroke = ink.clone(),
                Command::SetLineWidth(width) => self.state.line_width = width.max(0.0),
                Command::SetLineCap(cap) => self.state.line_cap = *cap,
                Command::SetLineJoin(join) => self.state.line_join = *join,
                Command::SetMiterLimit(limit) => self.state.miter_limit = limit.max(1.0),
                Command::SetDash { pattern, phase } => {
                    self.state.dash_pattern = pattern.clone();
                    self.state.dash_phase = *phase;
                }
                Command::SetOpacity { fill, stroke } => {
                    self.state.fill_opacity = fill.clamp(0.0, 1.0);
                    self.state.stroke_opacity = stroke.clamp(0.0, 1.0);
                }
                Command::ClipPath { path, rule } => self.clip(path, *rule),
                Command::ClipEmpty => {
                    self.state.clip_mask = Mask::new(self.pixmap.width(), self.pixmap.height());
                }
                Command::FillPath { path, rule } => self.fill(path, *rule),
                Command::StrokePath { path } => self.stroke(path),
                Command::FillStrokePath { path, rule } => {
                    self.fill(path, *rule);
                    self.stroke(path);
                }
                Command::DrawImage(image) => self.draw_image(image),
                Command::PaintShading(shading) => self.paint_shading(shading),
            }
        }
    }

    fn clip(&mut self, path: &Path, rule: FillRule) {
        apply_clip_path(
            &mut self.state.clip_mask,
            path,
            rule,
            self.state.transform,
            self.pixmap.width(),
            self.pixmap.height(),
        );
    }

    fn fill(&mut self, path: &Path, rule: FillRule) {
        let ts = self.state.transform;
        let pixmap = &mut *self.pixmap;
        let mask = self.state.clip_mask.as_ref();
        with_ink_paint(&self.state.fill, self.state.fill_opacity, ts, self.base, self.depth, |paint| {
            pixmap.fill_path(path, paint, rule, ts, mask);
        });
    }

    fn stroke(&mut self, path: &Path) {
        let ts = self.state.transform;
        let stroke = build_stroke(&self.state);
        let pixmap = &mut *self.pixmap;
        let mask = self.state.clip_mask.as_ref();
        with_ink_paint(&self.state.stroke, self.state.stroke_opacity, ts, self.base, self.depth, |paint| {
            pixmap.stroke_path(path, paint, &stroke, ts, mask);
        });
    }

    fn draw_image(&mut self, image: &Arc<Pixmap>) {
        let image: &Pixmap = image;
        // Image rows run top to bottom across the unit square.
        let image_to_user = Transform::from_row(
            1.0 / image.width() as f32,
            0.0,
            0.0,
            -1.0 / image.height() as f32,
            0.0,
            1.0,
        );
        let mut paint = PixmapPaint::default();
        paint.opacity = self.state.fill_opacity;
        paint.quality = FilterQuality::Bilinear;
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &paint,
            self.state.transform.pre_concat(image_to_user),
            self.state.clip_mask.as_ref(),
        );
    }

    fn paint_shading(&mut self, shading: &Shading) {
        let Some(shader) = build_shading_shader(shading, self.state.fill_opacity, self.state.transform) else {
            return;
        };
        let Some(device_rect) =
            Rect::from_xywh(0.0, 0.0, self.pixmap.width() as f32, self.pixmap.height() as f32)
        else {
            return;
        };
        let mut clip = self.state.clip_mask.clone();
        if let Some(rect) = shading
            .bbox
            .and_then(|[x0, y0, x1, y1]| Rect::from_ltrb(x0, y0, x1, y1))
        {
            apply_clip_path(
                &mut clip,
                &PathBuilder::from_rect(rect),
                FillRule::Winding,
                self.state.transform,
                self.pixmap.width(),
                self.pixmap.height(),
            );
        }
        let mut paint = Paint::default();
        paint.shader = shader;
        paint.anti_alias = true;
        self.pixmap.fill_path(
            &PathBuilder::from_rect(device_rect),
            &paint,
            FillRule::Winding,
            Transform::identity(),
            clip.as_ref(),
        );
    }
}

/// Builds the paint(s) for `ink` and hands each to `draw`. `path_ts` is the
/// transform the path will be drawn with; tiny-skia applies it to shaders
/// too, so shader transforms are expressed relative to it.
fn with_ink_paint(
    ink: &Ink,
    opacity: f32,
    path_ts: Transform,
    base: Transform,
    depth: usize,
    mut draw: impl FnMut(&Paint<'_>),
) {
    match ink {
        Ink::Solid(color) => draw(&fill_paint(*color, opacity)),
        Ink::Shading { shading, matrix } => {
            let device = base.pre_concat(matrix.to_transform());
            let Some(shader_ts) = path_ts.invert().map(|inv| inv.pre_concat(device)) else {
                return;
            };
            if let Some(background) = shading.background {
                draw(&fill_paint(background, opacity));
            }
            if let Some(shader) = build_shading_shader(shading, opacity, shader_ts) {
                let mut paint = Paint::default();
                paint.shader = shader;
                paint.anti_alias = true;
                draw(&paint);
            }
        }
        Ink::Tiling(cell) => {
            let device = base.pre_concat(cell.matrix.to_transform());
            let Some((tile, tile_ts)) = render_tile(cell, device, depth) else {
                return;
            };
            let Some(shader_ts) = path_ts.invert().map(|inv| inv.pre_concat(tile_ts)) else {
                return;
            };
            let mut paint = Paint::default();
            paint.shader = Pattern::new(
                tile.as_ref(),
                SpreadMode::Repeat,
                FilterQuality::Bilinear,
                opacity,
                shader_ts,
            );
            paint.anti_alias = true;
            draw(&paint);
        }
    }
}

/// Renders one pattern cell at roughly device resolution. Returns the tile
/// and the transform from tile pixels to device pixels.
fn render_tile(cell: &TilingCell, device: Transform, depth: usize) -> Option<(Pixmap, Transform)> {
    if depth >= MAX_TILE_DEPTH {
        log::warn!("tiling patterns nested too deeply; skipped");
        return None;
    }
    if !cell.commands.iter().any(Command::is_painting) {
        return None;
    }
    let x_scale = (device.sx * device.sx + device.ky * device.ky).sqrt();
    let y_scale = (device.kx * device.kx + device.sy * device.sy).sqrt();
    let mut width = (cell.x_step * x_scale).ceil().max(1.0);
    let mut height = (cell.y_step * y_scale).ceil().max(1.0);
    let largest = width.max(height);
    if largest > MAX_TILE_PX {
        width = (width * MAX_TILE_PX / largest).ceil().max(1.0);
        height = (height * MAX_TILE_PX / largest).ceil().max(1.0);
    }
    if !(width.is_finite() && height.is_finite()) {
        return None;
    }
    let mut tile = Pixmap::new(width as u32, height as u32)?;
    let kx = width / cell.x_step;
    let ky = height / cell.y_step;
    let tile_from_pattern =
        Transform::from_row(kx, 0.0, 0.0, ky, -cell.bbox[0] * kx, -cell.bbox[1] * ky);
    let tile_to_device = device.pre_concat(tile_from_pattern.invert()?);

    let mut canvas = Canvas::new(&mut tile, tile_from_pattern, depth + 1);
    let [x0, y0, x1, y1] = cell.bbox;
    if let Some(rect) = Rect::from_ltrb(x0, y0, x1, y1) {
        canvas.clip(&PathBuilder::from_rect(rect), FillRule::Winding);
    }
    canvas.run(&cell.commands);
    Some((tile, tile_to_device))
}

fn apply_clip_path(
    clip_mask: &mut Option<Mask>,
    path: &Path,
    fill_rule: FillRule,
    transform: Transform,
    width: u32,
    height: u32,
) {
    if let Some(mask) = clip_mask.as_mut() {
        mask.intersect_path(path, fill_rule, true, transform);
        return;
    }
    let Some(mut mask) = Mask::new(width, height) else {
        return;
    };
    mask.fill_path(path, fill_rule, true, transform);
    *clip_mask = Some(mask);
}

/// `ts` maps shading space to the shader's target space.
///
/// tiny-skia pads both gradient ends, so the geometry is enlarged and a
/// transparent stop placed just past each end that must not extend.
fn build_shading_shader(shading: &Shading, opacity: f32, ts: Transform) -> Option<Shader<'static>> {
    match shading.geometry {
        ShadingGeometry::Axial { x0, y0, x1, y1 } => {
            let (dx, dy) = (x1 - x0, y1 - y0);
            if dx == 0.0 && dy == 0.0 {
                return None;
            }
            // Axis tripled: t = 0 sits at 1/3 and t = 1 at 2/3.
            let start = Point::from_xy(x0 - dx, y0 - dy);
            let end = Point::from_xy(x1 + dx, y1 + dy);
            let points = shading
                .stops
                .iter()
                .map(|stop| ((stop.offset + 1.0) / 3.0, stop.color));
            let stops = bounded_stops(points, 1.0 / 3.0, 2.0 / 3.0, shading.extend, opacity);
            LinearGradient::new(start, end, stops, SpreadMode::Pad, ts)
        }
        ShadingGeometry::Radial {
            x0,
            y0,
            r0,
            x1,
            y1,
            r1,
        } => {
            let reversed = r0 > r1;
            let (c0, r0, c1, r1, extend) = if reversed {
                ((x1, y1), r1, (x0, y0), r0, [shading.extend[1], shading.extend[0]])
            } else {
                ((x0, y0), r0, (x1, y1), r1, shading.extend)
            };
            if r1 <= 0.0 {
                return None;
            }
            // tiny-skia's start circle has radius zero; move it to where the
            // circle family shrinks to a point.
            let (focal, s0) = if r1 - r0 > 1e-6 {
                let t = -r0 / (r1 - r0);
                ((c0.0 + t * (c1.0 - c0.0), c0.1 + t * (c1.1 - c0.1)), r0 / r1)
            } else {
                (c0, 0.0)
            };
            // Geometry doubled so a non-extended outer edge can sit at 1/2.
            let end = Point::from_xy(focal.0 + 2.0 * (c1.0 - focal.0), focal.1 + 2.0 * (c1.1 - focal.1));
            let map = |offset: f32| (s0 + offset * (1.0 - s0)) / 2.0;
            let stops: Vec<ShadingStop> = if reversed {
                shading
                    .stops
                    .iter()
                    .rev()
                    .map(|stop| ShadingStop {
                        offset: 1.0 - stop.offset,
                        color: stop.color,
                    })
                    .collect()
            } else {
                shading.stops.clone()
            };
            let points = stops.iter().map(|stop| (map(stop.offset), stop.color));
            let stops = bounded_stops(points, s0 / 2.0, 0.5, extend, opacity);
            RadialGradient::new(
                Point::from_xy(focal.0, focal.1),
                end,
                2.0 * r1,
                stops,
                SpreadMode::Pad,
                ts,
            )
        }
    }
}

fn bounded_stops(
    points: impl Iterator<Item = (f32, Color)>,
    low: f32,
    high: f32,
    extend: [bool; 2],
    opacity: f32,
) -> Vec<GradientStop> {
    let mut out = Vec::new();
    if !extend[0] && low > 0.0 {
        out.push(GradientStop::new((low - GRADIENT_EDGE).max(0.0), tiny_skia::Color::TRANSPARENT));
    }
    for (offset, color) in points {
        out.push(GradientStop::new(offset.clamp(0.0, 1.0), to_sk_color(color, opacity)));
    }
    if !extend[1] {
        out.push(GradientStop::new((high + GRADIENT_EDGE).min(1.0), tiny_skia::Color::TRANSPARENT));
    }
    out
}

fn build_stroke(state: &RasterState) -> Stroke {
    let mut stroke = Stroke::default();
    stroke.width = state.line_width.max(0.0);
    stroke.miter_limit = state.miter_limit.max(1.0);
    stroke.line_cap = match state.line_cap {
        1 => LineCap::Round,
        2 => LineCap::Square,
        _ => LineCap::Butt,
    };
    stroke.line_join = match state.line_join {
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => LineJoin::Miter,
    };

    if !state.dash_pattern.is_empty() {
        let mut pattern = state.dash_pattern.clone();
        if pattern.len() % 2 == 1 {
            let copy = pattern.clone();
            pattern.extend(copy);
        }
        if let Some(dash) = StrokeDash::new(pattern, state.dash_phase) {
            stroke.dash = Some(dash);
        }
    }

    stroke
}

fn fill_paint(color: Color, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color, opacity));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color, opacity: f32) -> tiny_skia::Color {
    let r = color.r.clamp(0.0, 1.0);
    let g = color.g.clamp(0.0, 1.0);
    let b = color.b.clamp(0.0, 1.0);
    let a = opacity.clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba(r, g, b, a)
        .unwrap_or_else(|| tiny_skia::Color::from_rgba8(0, 0, 0, 255))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::viewport_for_box;
    use crate::types::Matrix;

    fn render(commands: &[Command]) -> image::RgbaImage {
        let viewport = viewport_for_box([0.0, 0.0, 100.0, 100.0], 1.0, 0);
        let pixmap =
            render_display_list(commands, &viewport, &RenderOptions::default()).expect("render");
        PixelSurface::from_pixmap(pixmap).to_rgba8()
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Path {
        PathBuilder::from_rect(Rect::from_xywh(x, y, w, h).expect("rect"))
    }

    fn red() -> Command {
        Command::SetFillInk(Ink::Solid(Color::rgb(1.0, 0.0, 0.0)))
    }

    #[test]
    fn fills_land_in_device_space_with_y_flipped() {
        let img = render(&[
            red(),
            Command::FillPath {
                path: rect(10.0, 10.0, 20.0, 20.0),
                rule: FillRule::Winding,
            },
        ]);
        // User y 10..30 is device rows 70..90.
        assert_eq!(img.get_pixel(20, 80).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(20, 20).0, [255, 255, 255, 255]);
    }

    #[test]
    fn even_odd_leaves_the_inner_square_unpainted() {
        let mut pb = PathBuilder::new();
        pb.push_rect(Rect::from_xywh(10.0, 10.0, 80.0, 80.0).expect("outer"));
        pb.push_rect(Rect::from_xywh(30.0, 30.0, 40.0, 40.0).expect("inner"));
        let path = pb.finish().expect("path");

        let winding = render(&[Command::FillPath {
            path: path.clone(),
            rule: FillRule::Winding,
        }]);
        let even_odd = render(&[Command::FillPath {
            path,
            rule: FillRule::EvenOdd,
        }]);
        assert_eq!(winding.get_pixel(50, 50).0, [0, 0, 0, 255]);
        assert_eq!(even_odd.get_pixel(50, 50).0, [255, 255, 255, 255]);
        assert_eq!(even_odd.get_pixel(20, 50).0, [0, 0, 0, 255]);
    }

    #[test]
    fn clips_intersect_and_restore_with_state() {
        let img = render(&[
            Command::SaveState,
            Command::ClipPath {
                path: rect(0.0, 0.0, 50.0, 100.0),
                rule: FillRule::Winding,
            },
            Command::ClipPath {
                path: rect(0.0, 50.0, 100.0, 50.0),
                rule: FillRule::Winding,
            },
            red(),
            Command::FillPath {
                path: rect(0.0, 0.0, 100.0, 100.0),
                rule: FillRule::Winding,
            },
            Command::RestoreState,
            Command::FillPath {
                path: rect(90.0, 0.0, 10.0, 10.0),
                rule: FillRule::Winding,
            },
        ]);
        assert_eq!(img.get_pixel(25, 25).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(75, 25).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(25, 75).0, [255, 255, 255, 255]);
        // The fill color was restored to black along with the clip.
        assert_eq!(img.get_pixel(95, 95).0, [0, 0, 0, 255]);
    }

    #[test]
    fn empty_clip_hides_everything() {
        let img = render(&[
            Command::ClipEmpty,
            Command::FillPath {
                path: rect(0.0, 0.0, 100.0, 100.0),
                rule: FillRule::Winding,
            },
        ]);
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn images_keep_their_top_row_at_the_top() {
        let mut src = Pixmap::new(1, 2).expect("src");
        src.pixels_mut()[0] = tiny_skia::ColorU8::from_rgba(255, 0, 0, 255).premultiply();
        src.pixels_mut()[1] = tiny_skia::ColorU8::from_rgba(0, 0, 255, 255).premultiply();
        let img = render(&[
            Command::ConcatMatrix(Matrix::from_operands(20.0, 0.0, 0.0, 20.0, 10.0, 70.0)),
            Command::DrawImage(Arc::new(src)),
        ]);
        // The image covers device rows 10..30.
        let top = img.get_pixel(20, 13).0;
        let bottom = img.get_pixel(20, 27).0;
        assert!(top[0] > top[2], "top sample {top:?}");
        assert!(bottom[2] > bottom[0], "bottom sample {bottom:?}");
    }

    #[test]
    fn non_extended_axial_shading_stops_at_its_ends() {
        let shading = Shading {
            geometry: ShadingGeometry::Axial {
                x0: 25.0,
                y0: 0.0,
                x1: 75.0,
                y1: 0.0,
            },
            stops: vec![
                ShadingStop {
                    offset: 0.0,
                    color: Color::rgb(1.0, 0.0, 0.0),
                },
                ShadingStop {
                    offset: 1.0,
                    color: Color::rgb(0.0, 0.0, 1.0),
                },
            ],
            extend: [false, false],
            background: None,
            bbox: None,
        };
        let img = render(&[Command::PaintShading(Arc::new(shading.clone()))]);
        assert_eq!(img.get_pixel(10, 50).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(90, 50).0, [255, 255, 255, 255]);
        let left = img.get_pixel(27, 50).0;
        let right = img.get_pixel(73, 50).0;
        assert!(left[0] > 200 && left[2] < 60, "left {left:?}");
        assert!(right[2] > 200 && right[0] < 60, "right {right:?}");

        let extended = Shading {
            extend: [true, true],
            ..shading
        };
        let img = render(&[Command::PaintShading(Arc::new(extended))]);
        let far_left = img.get_pixel(5, 50).0;
        let far_right = img.get_pixel(95, 50).0;
        assert!(far_left[0] > 250 && far_left[2] < 5, "far left {far_left:?}");
        assert!(far_right[2] > 250 && far_right[0] < 5, "far right {far_right:?}");
    }

    #[test]
    fn tiling_ink_repeats_the_cell() {
        let cell = TilingCell {
            commands: Arc::new(vec![Command::FillPath {
                path: rect(0.0, 0.0, 5.0, 5.0),
                rule: FillRule::Winding,
            }]),
            bbox: [0.0, 0.0, 10.0, 10.0],
            x_step: 10.0,
            y_step: 10.0,
            matrix: Matrix::identity(),
        };
        let img = render(&[
            Command::SetFillInk(Ink::Tiling(Arc::new(cell))),
            Command::FillPath {
                path: rect(0.0, 0.0, 100.0, 100.0),
                rule: FillRule::Winding,
            },
        ]);
        let dark = |x, y| img.get_pixel(x, y).0[0] < 30;
        // Cells cover user x 0..5, 10..15, ... and y likewise.
        assert!(dark(2, 97));
        assert!(dark(42, 57));
        assert!(!dark(7, 97));
        assert!(!dark(42, 52));
    }
}
