//! The display list produced by content interpretation and consumed by the
//! rasterizer. Paths are in the user space current at the point of use;
//! `ConcatMatrix` commands carry the CTM changes.

use crate::shading::Shading;
use crate::types::{Color, Matrix};
use std::sync::Arc;
use tiny_skia::{FillRule, Path, Pixmap};

#[derive(Clone)]
pub(crate) enum Command {
    SaveState,
    RestoreState,
    ConcatMatrix(Matrix),
    SetFillInk(Ink),
    SetStrokeInk(Ink),
    SetLineWidth(f32),
    SetLineCap(u8),
    SetLineJoin(u8),
    SetMiterLimit(f32),
    SetDash {
        pattern: Vec<f32>,
        phase: f32,
    },
    // ca/CA, clamped to 0..1.
    SetOpacity {
        fill: f32,
        stroke: f32,
    },
    ClipPath {
        path: Path,
        rule: FillRule,
    },
    // A clip whose path encloses nothing.
    ClipEmpty,
    FillPath {
        path: Path,
        rule: FillRule,
    },
    StrokePath {
        path: Path,
    },
    FillStrokePath {
        path: Path,
        rule: FillRule,
    },
    // Drawn into the unit square of user space, top row at y = 1.
    DrawImage(Arc<Pixmap>),
    // `sh`: paints the shading over the current clip.
    PaintShading(Arc<Shading>),
}

/// What a fill or stroke paints with.
#[derive(Clone)]
pub(crate) enum Ink {
    Solid(Color),
    /// `matrix` maps shading space to page user space.
    Shading {
        shading: Arc<Shading>,
        matrix: Matrix,
    },
    Tiling(Arc<TilingCell>),
}

/// One pre-interpreted tile of a tiling pattern.
pub(crate) struct TilingCell {
    pub(crate) commands: Arc<Vec<Command>>,
    pub(crate) bbox: [f32; 4],
    pub(crate) x_step: f32,
    pub(crate) y_step: f32,
    /// Pattern space to page user space.
    pub(crate) matrix: Matrix,
}

impl Command {
    pub(crate) fn is_painting(&self) -> bool {
        matches!(
            self,
            Command::FillPath { .. }
                | Command::StrokePath { .. }
                | Command::FillStrokePath { .. }
                | Command::DrawImage(_)
                | Command::PaintShading(_)
        )
    }
}
