use image::{Rgb, RgbImage, Rgba, RgbaImage};
use tiny_skia::Pixmap;

/// One rendered page: RGBA8 pixels sized exactly to the viewport.
///
/// Pixels are kept premultiplied while drawing and exported straight.
pub struct PixelSurface {
    pixmap: Pixmap,
}

impl PixelSurface {
    pub(crate) fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight-alpha RGBA at `(x, y)`; `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        let width = self.width();
        let pixels = self.pixmap.pixels();
        RgbaImage::from_fn(width, self.height(), |x, y| {
            let c = pixels[(y * width + x) as usize].demultiply();
            Rgba([c.red(), c.green(), c.blue(), c.alpha()])
        })
    }

    /// Opaque RGB with any transparency composited over white.
    pub fn to_rgb8_over_white(&self) -> RgbImage {
        let width = self.width();
        let pixels = self.pixmap.pixels();
        RgbImage::from_fn(width, self.height(), |x, y| {
            let p = pixels[(y * width + x) as usize];
            let cover = 255 - p.alpha();
            Rgb([
                p.red().saturating_add(cover),
                p.green().saturating_add(cover),
                p.blue().saturating_add(cover),
            ])
        })
    }
}

impl std::fmt::Debug for PixelSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
